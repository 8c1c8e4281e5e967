//! Typed cross-resource references (`"<ResourceType>/<id>"`).
//!
//! Responsibilities:
//! - Parse a reference string into a known [`ResourceType`] and an id
//! - Produce display text for a reference, preferring the inline `display` cache and
//!   otherwise dereferencing through a caller-supplied lookup
//!
//! Notes:
//! - The lookup is opaque: it may hit a cache, a store or the network. Its latency,
//!   timeouts and retries belong to the caller
//! - Malformed references and failed lookups never error out of [`display_of`]; they
//!   become placeholder strings so a single bad record cannot blank a list view

use crate::ResourceType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

/// Prefix of the placeholder rendered for structurally invalid references.
pub const MALFORMED_REFERENCE_PLACEHOLDER: &str = "Invalid reference";

/// A typed pointer from one resource to another, with an optional cached display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reference {
    pub reference: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Reference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            display: None,
        }
    }

    /// Builds a reference to `resource_type` / `id`.
    pub fn to(resource_type: ResourceType, id: impl AsRef<str>) -> Self {
        Self::new(format!("{resource_type}/{}", id.as_ref()))
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Parse the reference string. See [`parse`].
    pub fn parse(&self) -> Result<ParsedReference, ReferenceError> {
        parse(self)
    }

    /// The cached display, if present and not blank.
    pub fn cached_display(&self) -> Option<&str> {
        self.display.as_deref().filter(|d| !d.trim().is_empty())
    }
}

/// The two components of a well-formed reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParsedReference {
    pub resource_type: ResourceType,
    pub id: String,
}

impl fmt::Display for ParsedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

/// A reference string that does not have the `"<ResourceType>/<id>"` shape.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("malformed reference '{reference}': {reason}")]
    Malformed {
        reference: String,
        reason: &'static str,
    },
}

/// Failure reported by a reference lookup.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("referenced resource not found")]
    NotFound,

    #[error("reference lookup failed: {0}")]
    Failed(String),
}

/// Parse a reference into its resource type and id.
///
/// The string is split on its first `/`. Both halves must be non-empty, the id must not
/// contain a further `/` or whitespace, and the left half must be a known resource type.
///
/// # Errors
///
/// Returns [`ReferenceError::Malformed`] describing the first rule that failed.
pub fn parse(reference: &Reference) -> Result<ParsedReference, ReferenceError> {
    let raw = reference.reference.trim();
    let malformed = |reason| ReferenceError::Malformed {
        reference: reference.reference.clone(),
        reason,
    };

    let (type_segment, id) = raw.split_once('/').ok_or_else(|| malformed("missing '/'"))?;

    if type_segment.is_empty() {
        return Err(malformed("empty resource type"));
    }
    if id.is_empty() {
        return Err(malformed("empty id"));
    }
    if id.contains('/') {
        return Err(malformed("more than one '/' separator"));
    }
    if id.chars().any(char::is_whitespace) {
        return Err(malformed("id contains whitespace"));
    }

    let resource_type =
        ResourceType::from_tag(type_segment).ok_or_else(|| malformed("unknown resource type"))?;

    Ok(ParsedReference {
        resource_type,
        id: id.to_string(),
    })
}

/// Display text for a reference.
///
/// 1. A non-blank cached `display` is returned verbatim, without dereferencing.
/// 2. A malformed reference yields [`malformed_placeholder`].
/// 3. Otherwise `resolve_fn` is asked for the display; a lookup failure or a blank result
///    yields [`unknown_placeholder`] (e.g. `"Unknown Patient"`).
pub fn display_of<F>(reference: &Reference, resolve_fn: F) -> String
where
    F: FnOnce(&ParsedReference) -> Result<String, LookupError>,
{
    if let Some(display) = reference.cached_display() {
        return display.to_string();
    }

    let parsed = match parse(reference) {
        Ok(parsed) => parsed,
        Err(_) => return malformed_placeholder(&reference.reference),
    };

    match resolve_fn(&parsed) {
        Ok(display) if !display.trim().is_empty() => display,
        _ => unknown_placeholder(parsed.resource_type),
    }
}

/// Asynchronous form of [`display_of`] for lookups that suspend.
pub async fn display_of_async<F, Fut>(reference: &Reference, resolve_fn: F) -> String
where
    F: FnOnce(ParsedReference) -> Fut,
    Fut: Future<Output = Result<String, LookupError>>,
{
    if let Some(display) = reference.cached_display() {
        return display.to_string();
    }

    let parsed = match parse(reference) {
        Ok(parsed) => parsed,
        Err(_) => return malformed_placeholder(&reference.reference),
    };
    let resource_type = parsed.resource_type;

    match resolve_fn(parsed).await {
        Ok(display) if !display.trim().is_empty() => display,
        _ => unknown_placeholder(resource_type),
    }
}

/// Placeholder for a well-formed reference whose target could not be resolved.
pub fn unknown_placeholder(resource_type: ResourceType) -> String {
    format!("Unknown {resource_type}")
}

/// Placeholder for a structurally invalid reference, quoting the raw value.
pub fn malformed_placeholder(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        MALFORMED_REFERENCE_PLACEHOLDER.to_string()
    } else {
        format!("{MALFORMED_REFERENCE_PLACEHOLDER}: {raw}")
    }
}

//! FHIR-aligned data shapes and resolution helpers for the clinaccess access layer.
//!
//! This crate provides:
//! - the closed set of resource types the access layer understands
//! - `Coding` / `CodeableConcept` terminology resolution and code-system identity
//! - `"<ResourceType>/<id>"` reference parsing and display resolution
//! - coded field values and the resource envelope consumed by access decisions
//!
//! Everything here is pure and synchronous (apart from the optional async reference
//! lookup), so it can be called from any thread, once per rendered row or field.
//!
//! This crate is NOT a FHIR server: no persistence, REST transport or terminology-server
//! calls.

pub mod coded_value;
pub mod reference;
pub mod resource;
pub mod resource_type;
pub mod terminology;

// Re-export facades
pub use coded_value::{CodedValue, Quantity};
pub use reference::{
    display_of, display_of_async, LookupError, ParsedReference, Reference, ReferenceError,
};
pub use resource::ClinicalResource;
pub use resource_type::ResourceType;
pub use terminology::{
    resolve, resolve_display, system_of, CodeSystem, CodeSystemRegistry, CodeableConcept, Coding,
    RenderedCoding, Resolution,
};

/// Errors returned by the `fhir` crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;

/// Deserialize strictly-typed YAML, reporting the path of the first mismatching field.
///
/// `context` names the document kind in the error message (e.g. `"Resource"`).
///
/// # Errors
///
/// Returns [`FhirError::Translation`] of the form
/// `"<context> schema mismatch at <path>: <cause>"`.
pub fn parse_yaml<T>(yaml_text: &str, context: &str) -> FhirResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

    serde_path_to_error::deserialize::<_, T>(deserializer).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() || path == "." {
            "<root>"
        } else {
            path.as_str()
        };
        FhirError::Translation(format!("{context} schema mismatch at {path}: {source}"))
    })
}

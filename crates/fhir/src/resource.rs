//! Clinical resource envelopes as seen by the access layer.
//!
//! The access layer never needs a full FHIR resource body. It needs the resource type,
//! who owns the instance (organization and, optionally, an individual), the assigned
//! practitioner when there is one, a label to show when something references it, and
//! the coded fields the screens render.
//!
//! Resource envelopes are supplied from outside (mock data, an API, a store). This
//! module only parses, validates and renders them.

use crate::coded_value::CodedValue;
use crate::reference::Reference;
use crate::{parse_yaml, FhirError, FhirResult, ResourceType};
use clinaccess_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Public domain-level types
// ============================================================================

/// A clinical resource instance with its ownership metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct ClinicalResource {
    pub resource_type: ResourceType,
    pub id: NonEmptyText,

    /// The organization (tenant) the instance belongs to. `None` for global reference data.
    pub organization_id: Option<NonEmptyText>,

    /// The individual the record is about (typically a patient id).
    pub owner_id: Option<NonEmptyText>,

    /// Stable id of the practitioner the record is assigned to.
    pub practitioner_id: Option<NonEmptyText>,

    /// Human-readable label used when another resource references this one.
    pub label: Option<String>,

    /// Coded fields keyed by element name (e.g. `code`, `valueQuantity`).
    pub fields: BTreeMap<String, CodedValue>,
}

impl ClinicalResource {
    pub fn new(resource_type: ResourceType, id: impl AsRef<str>) -> FhirResult<Self> {
        let id = NonEmptyText::new(id)
            .map_err(|_| FhirError::InvalidInput("resource id cannot be empty".into()))?;
        Ok(Self {
            resource_type,
            id,
            organization_id: None,
            owner_id: None,
            practitioner_id: None,
            label: None,
            fields: BTreeMap::new(),
        })
    }

    pub fn with_organization(mut self, organization_id: impl AsRef<str>) -> Self {
        self.organization_id = NonEmptyText::from_optional(Some(organization_id));
        self
    }

    pub fn with_owner(mut self, owner_id: impl AsRef<str>) -> Self {
        self.owner_id = NonEmptyText::from_optional(Some(owner_id));
        self
    }

    pub fn with_practitioner(mut self, practitioner_id: impl AsRef<str>) -> Self {
        self.practitioner_id = NonEmptyText::from_optional(Some(practitioner_id));
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: CodedValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// The individual this record belongs to.
    ///
    /// A `Patient` resource belongs to the patient it describes, so its own id is used
    /// when no explicit owner is recorded.
    pub fn owning_individual(&self) -> Option<&NonEmptyText> {
        match (&self.owner_id, self.resource_type) {
            (Some(owner), _) => Some(owner),
            (None, ResourceType::Patient) => Some(&self.id),
            (None, _) => None,
        }
    }

    /// A reference pointing at this resource, carrying its label as cached display.
    pub fn reference(&self) -> Reference {
        let reference = Reference::to(self.resource_type, &self.id);
        match self.label.as_deref().filter(|l| !l.trim().is_empty()) {
            Some(label) => reference.with_display(label),
            None => reference,
        }
    }

    /// Label shown when this resource is referenced: the label, else `Type/id`.
    pub fn display_label(&self) -> String {
        self.label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/{}", self.resource_type, self.id))
    }

    /// Parse a single resource envelope from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Translation`] naming the failing path when the YAML does not
    /// match the wire schema (unknown keys, wrong types, unknown resource type, empty id).
    pub fn parse(yaml_text: &str) -> FhirResult<Self> {
        let wire: ResourceWire = parse_yaml(yaml_text, "Resource")?;
        Ok(wire.into())
    }

    /// Parse a YAML sequence of resource envelopes.
    pub fn parse_many(yaml_text: &str) -> FhirResult<Vec<Self>> {
        let wires: Vec<ResourceWire> = parse_yaml(yaml_text, "Resource list")?;
        Ok(wires.into_iter().map(Self::from).collect())
    }

    /// Render the envelope as YAML.
    pub fn render(&self) -> FhirResult<String> {
        serde_yaml::to_string(&ResourceWire::from(self))
            .map_err(|e| FhirError::Translation(format!("Failed to serialise resource: {e}")))
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct ResourceWire {
    resource_type: ResourceType,

    id: NonEmptyText,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    organization_id: Option<NonEmptyText>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner_id: Option<NonEmptyText>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    practitioner_id: Option<NonEmptyText>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    fields: BTreeMap<String, CodedValue>,
}

impl From<ResourceWire> for ClinicalResource {
    fn from(wire: ResourceWire) -> Self {
        Self {
            resource_type: wire.resource_type,
            id: wire.id,
            organization_id: wire.organization_id,
            owner_id: wire.owner_id,
            practitioner_id: wire.practitioner_id,
            label: wire.label,
            fields: wire.fields,
        }
    }
}

impl From<&ClinicalResource> for ResourceWire {
    fn from(resource: &ClinicalResource) -> Self {
        Self {
            resource_type: resource.resource_type,
            id: resource.id.clone(),
            organization_id: resource.organization_id.clone(),
            owner_id: resource.owner_id.clone(),
            practitioner_id: resource.practitioner_id.clone(),
            label: resource.label.clone(),
            fields: resource.fields.clone(),
        }
    }
}

//! The closed set of resource-type tags understood by the access layer.
//!
//! Reference strings (`"Patient/P001"`), capability tables and resource
//! envelopes all name resource types by their FHIR tag. Anything outside this
//! set is rejected at parse time rather than carried as free text.

use crate::FhirError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A known FHIR resource type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Patient,
    Practitioner,
    PractitionerRole,
    Organization,
    Appointment,
    Encounter,
    Observation,
    Condition,
    Procedure,
    MedicationRequest,
    Medication,
    AllergyIntolerance,
    Immunization,
    DiagnosticReport,
    Claim,
    Coverage,
    CodeSystem,
    ValueSet,
}

impl ResourceType {
    /// Every known resource type, in declaration order.
    pub const ALL: [ResourceType; 18] = [
        ResourceType::Patient,
        ResourceType::Practitioner,
        ResourceType::PractitionerRole,
        ResourceType::Organization,
        ResourceType::Appointment,
        ResourceType::Encounter,
        ResourceType::Observation,
        ResourceType::Condition,
        ResourceType::Procedure,
        ResourceType::MedicationRequest,
        ResourceType::Medication,
        ResourceType::AllergyIntolerance,
        ResourceType::Immunization,
        ResourceType::DiagnosticReport,
        ResourceType::Claim,
        ResourceType::Coverage,
        ResourceType::CodeSystem,
        ResourceType::ValueSet,
    ];

    /// The FHIR tag for this resource type (e.g. `"MedicationRequest"`).
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Patient => "Patient",
            ResourceType::Practitioner => "Practitioner",
            ResourceType::PractitionerRole => "PractitionerRole",
            ResourceType::Organization => "Organization",
            ResourceType::Appointment => "Appointment",
            ResourceType::Encounter => "Encounter",
            ResourceType::Observation => "Observation",
            ResourceType::Condition => "Condition",
            ResourceType::Procedure => "Procedure",
            ResourceType::MedicationRequest => "MedicationRequest",
            ResourceType::Medication => "Medication",
            ResourceType::AllergyIntolerance => "AllergyIntolerance",
            ResourceType::Immunization => "Immunization",
            ResourceType::DiagnosticReport => "DiagnosticReport",
            ResourceType::Claim => "Claim",
            ResourceType::Coverage => "Coverage",
            ResourceType::CodeSystem => "CodeSystem",
            ResourceType::ValueSet => "ValueSet",
        }
    }

    /// Looks up a resource type by its exact FHIR tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = FhirError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s.trim())
            .ok_or_else(|| FhirError::InvalidInput(format!("Unknown resource type: {s}")))
    }
}

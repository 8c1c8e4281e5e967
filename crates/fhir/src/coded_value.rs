//! Coded field values as a closed set of concrete shapes.
//!
//! FHIR choice elements (`value[x]`) are modelled as [`CodedValue`], a tagged variant
//! over the shapes clinical screens actually render. Each variant has one display rule.

use crate::reference::{display_of, LookupError, ParsedReference, Reference};
use crate::terminology::{resolve_display, CodeableConcept};
use crate::FhirError;
use serde::{Deserialize, Serialize};

/// A measured amount, optionally coded in UCUM.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Quantity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    /// `<`, `<=`, `>=` or `>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparator: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Quantity {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value: Some(value),
            unit: Some(unit.into()),
            ..Self::default()
        }
    }

    /// Display as `[comparator]value unit`, preferring the human unit over the unit code.
    pub fn display(&self) -> String {
        let unit = [self.unit.as_deref(), self.code.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|u| !u.is_empty());
        let comparator = self.comparator.as_deref().map(str::trim).unwrap_or("");

        match (self.value, unit) {
            (Some(value), Some(unit)) => format!("{comparator}{value} {unit}"),
            (Some(value), None) => format!("{comparator}{value}"),
            (None, Some(unit)) => unit.to_string(),
            (None, None) => String::new(),
        }
    }
}

/// A coded field value.
///
/// On the wire this is a mapping with exactly one of `quantity`, `concept`, `reference`
/// or `text`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CodedValueWire", into = "CodedValueWire")]
pub enum CodedValue {
    Quantity(Quantity),
    Concept(CodeableConcept),
    Reference(Reference),
    Text(String),
}

impl CodedValue {
    /// Display text for this value. References are dereferenced through `resolve_fn`.
    pub fn display_with<F>(&self, resolve_fn: F) -> String
    where
        F: FnOnce(&ParsedReference) -> Result<String, LookupError>,
    {
        match self {
            CodedValue::Quantity(quantity) => quantity.display(),
            CodedValue::Concept(concept) => resolve_display(concept),
            CodedValue::Reference(reference) => display_of(reference, resolve_fn),
            CodedValue::Text(text) => text.trim().to_string(),
        }
    }

    /// Display text without dereferencing: unresolved references fall back to placeholders.
    pub fn display(&self) -> String {
        self.display_with(|_| Err(LookupError::NotFound))
    }

    /// The concept carried by this value, if it is one.
    pub fn as_concept(&self) -> Option<&CodeableConcept> {
        match self {
            CodedValue::Concept(concept) => Some(concept),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            CodedValue::Reference(reference) => Some(reference),
            _ => None,
        }
    }
}

/// Wire representation of a coded value: one populated key.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct CodedValueWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quantity: Option<Quantity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    concept: Option<CodeableConcept>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    reference: Option<Reference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl TryFrom<CodedValueWire> for CodedValue {
    type Error = FhirError;

    fn try_from(wire: CodedValueWire) -> Result<Self, Self::Error> {
        let mut values = [
            wire.quantity.map(CodedValue::Quantity),
            wire.concept.map(CodedValue::Concept),
            wire.reference.map(CodedValue::Reference),
            wire.text.map(CodedValue::Text),
        ]
        .into_iter()
        .flatten();

        match (values.next(), values.next()) {
            (Some(value), None) => Ok(value),
            (None, _) => Err(FhirError::InvalidInput(
                "coded value must set one of quantity, concept, reference or text".into(),
            )),
            (Some(_), Some(_)) => Err(FhirError::InvalidInput(
                "coded value must set only one of quantity, concept, reference or text".into(),
            )),
        }
    }
}

impl From<CodedValue> for CodedValueWire {
    fn from(value: CodedValue) -> Self {
        match value {
            CodedValue::Quantity(quantity) => Self {
                quantity: Some(quantity),
                ..Self::default()
            },
            CodedValue::Concept(concept) => Self {
                concept: Some(concept),
                ..Self::default()
            },
            CodedValue::Reference(reference) => Self {
                reference: Some(reference),
                ..Self::default()
            },
            CodedValue::Text(text) => Self {
                text: Some(text),
                ..Self::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminology::Coding;

    #[test]
    fn quantity_display_variants() {
        assert_eq!(Quantity::new(120.0, "mmHg").display(), "120 mmHg");
        assert_eq!(Quantity::new(37.5, "Cel").display(), "37.5 Cel");

        let coded_only = Quantity {
            value: Some(5.0),
            comparator: Some("<".into()),
            system: Some("http://unitsofmeasure.org".into()),
            code: Some("mg/dL".into()),
            ..Quantity::default()
        };
        assert_eq!(coded_only.display(), "<5 mg/dL");

        let unitless = Quantity {
            value: Some(3.0),
            ..Quantity::default()
        };
        assert_eq!(unitless.display(), "3");
        assert_eq!(Quantity::default().display(), "");
    }

    #[test]
    fn each_variant_has_a_display() {
        let concept = CodedValue::Concept(CodeableConcept::from_coding(Coding::new(
            "http://loinc.org",
            "8480-6",
            "Systolic BP",
        )));
        assert_eq!(concept.display(), "Systolic BP");

        let text = CodedValue::Text("  Take with food ".into());
        assert_eq!(text.display(), "Take with food");

        let reference = CodedValue::Reference(Reference::new("Practitioner/D7"));
        assert_eq!(reference.display(), "Unknown Practitioner");
        assert_eq!(
            reference.display_with(|_| Ok("Dr. Adams".into())),
            "Dr. Adams"
        );
    }

    #[test]
    fn parses_tagged_yaml() {
        let yaml = r#"quantity:
  value: 120
  unit: mmHg
"#;
        let value: CodedValue = serde_yaml::from_str(yaml).expect("parse value");
        assert_eq!(value, CodedValue::Quantity(Quantity::new(120.0, "mmHg")));
        assert!(value.as_concept().is_none());

        let reference: CodedValue =
            serde_yaml::from_str("reference:\n  reference: Patient/P001\n").expect("parse ref");
        assert_eq!(
            reference.as_reference().map(|r| r.reference.as_str()),
            Some("Patient/P001")
        );
    }

    #[test]
    fn rejects_ambiguous_or_empty_values() {
        let both = "text: note\nconcept:\n  text: note\n";
        let err = serde_yaml::from_str::<CodedValue>(both).expect_err("two shapes");
        assert!(err.to_string().contains("only one"));

        let err = serde_yaml::from_str::<CodedValue>("{}").expect_err("no shape");
        assert!(err.to_string().contains("must set one"));
    }
}

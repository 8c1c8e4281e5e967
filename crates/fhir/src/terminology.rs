//! Terminology resolution for coded clinical data.
//!
//! This module normalises FHIR `Coding` / `CodeableConcept` values into display text and
//! identifies which code system a coding belongs to.
//!
//! Responsibilities:
//! - Define the `Coding` and `CodeableConcept` data shapes (FHIR JSON/YAML field names)
//! - Resolve the preferred display text of a concept, falling back to free text
//! - Map code-system URIs (canonical, aliased or OID form) to a closed [`CodeSystem`] set
//! - Render codings for display and compare them by system identity and code
//!
//! Notes:
//! - Every operation here is pure: no I/O, no logging, no shared state
//! - Malformed or empty concepts resolve to [`UNRESOLVED_DISPLAY`], never an error

use serde::{Deserialize, Serialize};
use std::fmt;

/// Display text returned when a concept carries no usable display or text.
pub const UNRESOLVED_DISPLAY: &str = "";

/// URI prefixes classified as [`CodeSystem::Local`] when no configuration is supplied.
pub const DEFAULT_LOCAL_SYSTEM_PREFIXES: &[&str] = &["urn:local:"];

/// Normalised URI (see [`normalise_uri`]) to code system identity.
const KNOWN_SYSTEMS: &[(&str, CodeSystem)] = &[
    ("snomed.info/sct", CodeSystem::SnomedCt),
    ("urn:oid:2.16.840.1.113883.6.96", CodeSystem::SnomedCt),
    ("loinc.org", CodeSystem::Loinc),
    ("urn:oid:2.16.840.1.113883.6.1", CodeSystem::Loinc),
    ("nlm.nih.gov/research/umls/rxnorm", CodeSystem::RxNorm),
    ("urn:oid:2.16.840.1.113883.6.88", CodeSystem::RxNorm),
    ("unitsofmeasure.org", CodeSystem::Ucum),
    ("urn:oid:2.16.840.1.113883.6.8", CodeSystem::Ucum),
    ("hl7.org/fhir/sid/icd-10-cm", CodeSystem::Icd10Cm),
    ("urn:oid:2.16.840.1.113883.6.90", CodeSystem::Icd10Cm),
    ("ama-assn.org/go/cpt", CodeSystem::Cpt),
    ("urn:oid:2.16.840.1.113883.6.12", CodeSystem::Cpt),
];

// ============================================================================
// Data shapes
// ============================================================================

/// A single term from a specific terminology.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    /// Convenience constructor for a system/code/display triple.
    pub fn new(
        system: impl Into<String>,
        code: impl Into<String>,
        display: impl Into<String>,
    ) -> Self {
        Self {
            system: Some(system.into()),
            version: None,
            code: Some(code.into()),
            display: Some(display.into()),
        }
    }

    /// The display text, if present and not blank.
    pub fn usable_display(&self) -> Option<&str> {
        non_blank(self.display.as_deref())
    }

    /// The code, if present and not blank.
    pub fn usable_code(&self) -> Option<&str> {
        non_blank(self.code.as_deref())
    }
}

/// A value expressed as zero or more codings plus optional free text.
///
/// When `coding` is non-empty the first usable entry is the preferred display source;
/// `text` is only authoritative when no coding yields display text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            coding: Vec::new(),
            text: Some(text.into()),
        }
    }

    pub fn from_coding(coding: Coding) -> Self {
        Self {
            coding: vec![coding],
            text: None,
        }
    }
}

/// Outcome of resolving a concept's display source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// The first coding with a usable display.
    Coding(&'a Coding),
    /// No coding had a display; the concept's free text was used.
    Text(&'a str),
    /// Neither codings nor text carried anything displayable.
    Unresolved,
}

impl<'a> Resolution<'a> {
    /// The resolved display string, or [`UNRESOLVED_DISPLAY`].
    pub fn display(&self) -> &'a str {
        match *self {
            Resolution::Coding(coding) => coding.usable_display().unwrap_or(UNRESOLVED_DISPLAY),
            Resolution::Text(text) => text,
            Resolution::Unresolved => UNRESOLVED_DISPLAY,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Resolution::Unresolved)
    }
}

/// Identity of a code system, as far as rendering decisions are concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSystem {
    SnomedCt,
    Loinc,
    RxNorm,
    Ucum,
    Icd10Cm,
    Cpt,
    /// An organisation-local code system (configured URI prefix).
    Local,
    /// Anything else. Rendered, but flagged.
    Unknown,
}

impl CodeSystem {
    /// Human-readable name of the system.
    pub fn label(self) -> &'static str {
        match self {
            CodeSystem::SnomedCt => "SNOMED CT",
            CodeSystem::Loinc => "LOINC",
            CodeSystem::RxNorm => "RxNorm",
            CodeSystem::Ucum => "UCUM",
            CodeSystem::Icd10Cm => "ICD-10-CM",
            CodeSystem::Cpt => "CPT",
            CodeSystem::Local => "Local",
            CodeSystem::Unknown => "Unknown",
        }
    }

    /// Whether the code is shown alongside the display text.
    pub fn shows_code(self) -> bool {
        !matches!(self, CodeSystem::Local | CodeSystem::Unknown)
    }
}

impl fmt::Display for CodeSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A coding prepared for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedCoding {
    pub text: String,
    pub system: CodeSystem,
    /// Set when the coding's system is not recognised.
    pub flagged: bool,
}

impl fmt::Display for RenderedCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.flagged {
            write!(f, "{} [unrecognised code system]", self.text)
        } else {
            f.write_str(&self.text)
        }
    }
}

// ============================================================================
// Code system registry
// ============================================================================

/// Maps code-system URIs to [`CodeSystem`] identities.
///
/// Standard terminologies are built in. Local systems are recognised by URI prefix,
/// which is the only configurable part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeSystemRegistry {
    local_prefixes: Vec<String>,
}

impl Default for CodeSystemRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_SYSTEM_PREFIXES.iter().copied())
    }
}

impl CodeSystemRegistry {
    /// Creates a registry treating URIs under any of `local_prefixes` as local systems.
    ///
    /// Blank prefixes are ignored.
    pub fn new<I, S>(local_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let local_prefixes = local_prefixes
            .into_iter()
            .map(|p| normalise_uri(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        Self { local_prefixes }
    }

    /// Identify a code system from its URI.
    pub fn system_of_uri(&self, uri: &str) -> CodeSystem {
        let normalised = normalise_uri(uri);
        if normalised.is_empty() {
            return CodeSystem::Unknown;
        }

        if let Some((_, system)) = KNOWN_SYSTEMS.iter().find(|(known, _)| *known == normalised) {
            return *system;
        }

        // SNOMED CT edition URIs: http://snomed.info/sct/<module-id>
        if normalised.starts_with("snomed.info/sct/") {
            return CodeSystem::SnomedCt;
        }

        if self
            .local_prefixes
            .iter()
            .any(|prefix| is_under_prefix(&normalised, prefix))
        {
            return CodeSystem::Local;
        }

        CodeSystem::Unknown
    }

    /// Identify the code system of a coding. A coding without a system is `Unknown`.
    pub fn system_of(&self, coding: &Coding) -> CodeSystem {
        coding
            .system
            .as_deref()
            .map_or(CodeSystem::Unknown, |uri| self.system_of_uri(uri))
    }

    /// Codings of `concept` that belong to `system`, in their original order.
    pub fn codings_in<'a>(
        &'a self,
        concept: &'a CodeableConcept,
        system: CodeSystem,
    ) -> impl Iterator<Item = &'a Coding> + 'a {
        concept
            .coding
            .iter()
            .filter(move |coding| self.system_of(coding) == system)
    }

    /// Resolve display text using only codings from `system`, then the concept text.
    pub fn resolve_display_in(&self, concept: &CodeableConcept, system: CodeSystem) -> String {
        self.codings_in(concept, system)
            .find_map(Coding::usable_display)
            .or_else(|| non_blank(concept.text.as_deref()))
            .unwrap_or(UNRESOLVED_DISPLAY)
            .to_string()
    }

    /// Prepare a coding for display.
    ///
    /// Standard terminologies render as `display (code)`. Local and unknown systems render
    /// the display, or the code when there is no display. Unknown systems are flagged.
    pub fn render_coding(&self, coding: &Coding) -> RenderedCoding {
        let system = self.system_of(coding);
        let display = coding.usable_display();
        let code = coding.usable_code();

        let text = match (display, code) {
            (Some(display), Some(code)) if system.shows_code() => format!("{display} ({code})"),
            (Some(display), _) => display.to_string(),
            (None, Some(code)) => code.to_string(),
            (None, None) => UNRESOLVED_DISPLAY.to_string(),
        };

        RenderedCoding {
            text,
            system,
            flagged: system == CodeSystem::Unknown,
        }
    }

    /// Whether two codings denote the same concept: same system identity and same code.
    ///
    /// Standard systems compare by identity, so `http://loinc.org` and its OID are the
    /// same system. Local and unknown systems compare by normalised URI.
    pub fn same_concept(&self, a: &Coding, b: &Coding) -> bool {
        let (Some(code_a), Some(code_b)) = (a.usable_code(), b.usable_code()) else {
            return false;
        };
        if code_a != code_b {
            return false;
        }

        let system_a = self.system_of(a);
        let system_b = self.system_of(b);
        if system_a != system_b {
            return false;
        }
        if system_a.shows_code() {
            return true;
        }

        match (a.system.as_deref(), b.system.as_deref()) {
            (Some(uri_a), Some(uri_b)) => normalise_uri(uri_a) == normalise_uri(uri_b),
            _ => false,
        }
    }
}

// ============================================================================
// Free functions (default registry)
// ============================================================================

/// Resolve a concept's display source without allocating.
pub fn resolve(concept: &CodeableConcept) -> Resolution<'_> {
    if let Some(coding) = concept.coding.iter().find(|c| c.usable_display().is_some()) {
        return Resolution::Coding(coding);
    }
    match non_blank(concept.text.as_deref()) {
        Some(text) => Resolution::Text(text),
        None => Resolution::Unresolved,
    }
}

/// The display string of a concept: first coding display, then text, then
/// [`UNRESOLVED_DISPLAY`].
pub fn resolve_display(concept: &CodeableConcept) -> String {
    resolve(concept).display().to_string()
}

/// Identify the code system of a coding using the default local prefixes.
pub fn system_of(coding: &Coding) -> CodeSystem {
    CodeSystemRegistry::default().system_of(coding)
}

/// Normalise a system URI for comparison: trimmed, lower-cased, without `http(s)://`,
/// a leading `www.` or a trailing `/`.
fn normalise_uri(uri: &str) -> String {
    let lowered = uri.trim().to_ascii_lowercase();
    let without_scheme = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    let without_www = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);
    without_www.trim_end_matches('/').to_string()
}

/// Whether `uri` sits under `prefix` on a segment boundary, so `example.org` covers
/// `example.org/codes` but not `example.org.vendor.example`.
fn is_under_prefix(uri: &str, prefix: &str) -> bool {
    let is_separator = |c: char| matches!(c, ':' | '/' | '#');
    match uri.strip_prefix(prefix) {
        Some(rest) => {
            rest.is_empty() || prefix.ends_with(is_separator) || rest.starts_with(is_separator)
        }
        None => false,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOINC: &str = "http://loinc.org";
    const SNOMED: &str = "http://snomed.info/sct";

    #[test]
    fn resolves_first_coding_display() {
        let concept = CodeableConcept {
            coding: vec![Coding::new(LOINC, "8480-6", "Systolic BP")],
            text: Some("BP".into()),
        };
        assert_eq!(resolve_display(&concept), "Systolic BP");
    }

    #[test]
    fn falls_back_to_text_without_codings() {
        let concept = CodeableConcept::from_text("Unlisted allergy");
        assert_eq!(resolve_display(&concept), "Unlisted allergy");
        assert_eq!(resolve(&concept), Resolution::Text("Unlisted allergy"));
    }

    #[test]
    fn skips_codings_without_usable_display() {
        let concept = CodeableConcept {
            coding: vec![
                Coding {
                    system: Some("urn:local:allergy".into()),
                    code: Some("A-17".into()),
                    display: Some("   ".into()),
                    version: None,
                },
                Coding::new(SNOMED, "91936005", "Allergy to penicillin"),
            ],
            text: Some("Penicillin".into()),
        };
        assert_eq!(resolve_display(&concept), "Allergy to penicillin");
    }

    #[test]
    fn text_used_when_no_coding_has_display() {
        let concept = CodeableConcept {
            coding: vec![Coding {
                system: Some(LOINC.into()),
                code: Some("8480-6".into()),
                ..Coding::default()
            }],
            text: Some("BP".into()),
        };
        assert_eq!(resolve_display(&concept), "BP");
    }

    #[test]
    fn empty_concept_resolves_to_sentinel() {
        let concept = CodeableConcept {
            coding: vec![Coding::default()],
            text: Some("  ".into()),
        };
        assert_eq!(resolve(&concept), Resolution::Unresolved);
        assert!(!resolve(&concept).is_resolved());
        assert_eq!(resolve_display(&concept), UNRESOLVED_DISPLAY);
        assert_eq!(resolve_display(&CodeableConcept::default()), UNRESOLVED_DISPLAY);
    }

    #[test]
    fn resolution_is_idempotent() {
        let concept = CodeableConcept {
            coding: vec![Coding::new(SNOMED, "38341003", "Hypertension")],
            text: None,
        };
        assert_eq!(resolve_display(&concept), resolve_display(&concept));
    }

    #[test]
    fn identifies_standard_systems_and_aliases() {
        let registry = CodeSystemRegistry::default();
        assert_eq!(registry.system_of_uri(SNOMED), CodeSystem::SnomedCt);
        assert_eq!(
            registry.system_of_uri("http://snomed.info/sct/900000000000207008"),
            CodeSystem::SnomedCt
        );
        assert_eq!(registry.system_of_uri("https://loinc.org/"), CodeSystem::Loinc);
        assert_eq!(
            registry.system_of_uri("http://www.nlm.nih.gov/research/umls/rxnorm"),
            CodeSystem::RxNorm
        );
        assert_eq!(
            registry.system_of_uri("urn:oid:2.16.840.1.113883.6.8"),
            CodeSystem::Ucum
        );
        assert_eq!(
            registry.system_of_uri("http://hl7.org/fhir/sid/icd-10-cm"),
            CodeSystem::Icd10Cm
        );
        assert_eq!(
            registry.system_of_uri("http://www.ama-assn.org/go/cpt"),
            CodeSystem::Cpt
        );
    }

    #[test]
    fn local_and_unknown_systems() {
        let registry = CodeSystemRegistry::new(["https://codes.example-clinic.org/"]);
        assert_eq!(
            registry.system_of_uri("http://codes.example-clinic.org/allergies"),
            CodeSystem::Local
        );
        assert_eq!(
            registry.system_of_uri("urn:local:allergy"),
            CodeSystem::Unknown
        );
        assert_eq!(registry.system_of_uri(""), CodeSystem::Unknown);
        assert_eq!(system_of(&Coding::default()), CodeSystem::Unknown);
        assert_eq!(
            system_of(&Coding::new("urn:local:allergy", "A-17", "Latex")),
            CodeSystem::Local
        );
    }

    #[test]
    fn local_prefixes_match_on_segment_boundaries() {
        let registry = CodeSystemRegistry::new(["https://codes.example-clinic.org/", "urn:local:"]);
        let lookalike = registry.render_coding(&Coding::new(
            "http://codes.example-clinic.org.vendor.example/x",
            "A-17",
            "Latex",
        ));
        assert_eq!(lookalike.system, CodeSystem::Unknown);
        assert!(lookalike.flagged);

        assert_eq!(
            registry.system_of_uri("https://codes.example-clinic.org"),
            CodeSystem::Local
        );
        assert_eq!(
            registry.system_of_uri("urn:localhost:allergy"),
            CodeSystem::Unknown
        );
        assert_eq!(
            registry.system_of_uri("urn:local:allergy"),
            CodeSystem::Local
        );
    }

    #[test]
    fn renders_code_for_standard_systems() {
        let registry = CodeSystemRegistry::default();
        let rendered = registry.render_coding(&Coding::new(LOINC, "8480-6", "Systolic BP"));
        assert_eq!(rendered.text, "Systolic BP (8480-6)");
        assert!(!rendered.flagged);
        assert_eq!(rendered.to_string(), "Systolic BP (8480-6)");
    }

    #[test]
    fn flags_unknown_systems_without_dropping_them() {
        let registry = CodeSystemRegistry::default();
        let rendered =
            registry.render_coding(&Coding::new("http://vendor.example/codes", "X1", "Widget"));
        assert_eq!(rendered.system, CodeSystem::Unknown);
        assert!(rendered.flagged);
        assert_eq!(rendered.text, "Widget");
        assert_eq!(rendered.to_string(), "Widget [unrecognised code system]");

        let code_only = registry.render_coding(&Coding {
            code: Some("X2".into()),
            ..Coding::default()
        });
        assert_eq!(code_only.text, "X2");
        assert!(code_only.flagged);
    }

    #[test]
    fn resolves_display_for_a_specific_system() {
        let registry = CodeSystemRegistry::default();
        let concept = CodeableConcept {
            coding: vec![
                Coding::new("urn:local:dx", "HTN", "High blood pressure"),
                Coding::new(SNOMED, "38341003", "Hypertensive disorder"),
            ],
            text: Some("Hypertension".into()),
        };

        assert_eq!(resolve_display(&concept), "High blood pressure");
        assert_eq!(
            registry.resolve_display_in(&concept, CodeSystem::SnomedCt),
            "Hypertensive disorder"
        );
        assert_eq!(
            registry.resolve_display_in(&concept, CodeSystem::Loinc),
            "Hypertension"
        );
        assert_eq!(registry.codings_in(&concept, CodeSystem::Local).count(), 1);
    }

    #[test]
    fn compares_codings_by_system_identity() {
        let registry = CodeSystemRegistry::default();
        let by_uri = Coding::new(LOINC, "8480-6", "Systolic BP");
        let by_oid = Coding::new("urn:oid:2.16.840.1.113883.6.1", "8480-6", "SBP");
        let other_code = Coding::new(LOINC, "8462-4", "Diastolic BP");
        let snomed = Coding::new(SNOMED, "8480-6", "Not the same");

        assert!(registry.same_concept(&by_uri, &by_oid));
        assert!(!registry.same_concept(&by_uri, &other_code));
        assert!(!registry.same_concept(&by_uri, &snomed));

        let local_a = Coding::new("urn:local:dx", "HTN", "a");
        let local_b = Coding::new("urn:local:other", "HTN", "b");
        assert!(!registry.same_concept(&local_a, &local_b));
        assert!(registry.same_concept(&local_a, &Coding::new("urn:local:dx/", "HTN", "c")));
    }

    #[test]
    fn parses_fhir_shaped_yaml() {
        let yaml = r#"coding:
  - system: http://loinc.org
    code: "8480-6"
    display: Systolic BP
text: BP
"#;
        let concept: CodeableConcept = serde_yaml::from_str(yaml).expect("parse concept");
        assert_eq!(concept.coding.len(), 1);
        assert_eq!(resolve_display(&concept), "Systolic BP");
    }
}

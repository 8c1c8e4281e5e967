//! Organizations and the tenancy registry.
//!
//! Organizations are immutable reference data as far as the access layer is concerned.
//! The registry is an in-memory lookup the presentation layer uses to show an actor's
//! organization; access decisions only ever compare organization ids.

use crate::error::{AccessError, AccessResult};
use crate::identity::Actor;
use clinaccess_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Kind of organization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationType {
    Hospital,
    Clinic,
    Pharmacy,
    Laboratory,
    Insurer,
    Other,
}

/// Contact details for an organization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Aggregate membership counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberCounts {
    #[serde(default)]
    pub patients: u32,
    #[serde(default)]
    pub practitioners: u32,
    #[serde(default)]
    pub admins: u32,
}

/// A tenant organization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Organization {
    pub id: NonEmptyText,
    pub name: NonEmptyText,
    #[serde(rename = "type")]
    pub organization_type: OrganizationType,
    #[serde(default)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub counts: MemberCounts,
}

/// In-memory organization lookup keyed by organization id.
#[derive(Clone, Debug, Default)]
pub struct TenancyRegistry {
    organizations: BTreeMap<NonEmptyText, Organization>,
}

impl TenancyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of organizations.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::DuplicateOrganization`] if two entries share an id.
    pub fn from_organizations(
        organizations: impl IntoIterator<Item = Organization>,
    ) -> AccessResult<Self> {
        let mut registry = Self::new();
        for organization in organizations {
            registry.insert(organization)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, organization: Organization) -> AccessResult<()> {
        if self.organizations.contains_key(&organization.id) {
            return Err(AccessError::DuplicateOrganization(
                organization.id.into_inner(),
            ));
        }
        self.organizations
            .insert(organization.id.clone(), organization);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Organization> {
        self.organizations.get(id)
    }

    pub fn len(&self) -> usize {
        self.organizations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.organizations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Organization> {
        self.organizations.values()
    }

    /// The organization the actor belongs to, if it is registered.
    pub fn organization_of(&self, actor: &Actor) -> Option<&Organization> {
        actor
            .organization_id()
            .and_then(|id| self.get(id.as_str()))
    }

    /// Display name for the actor's organization: the registered name, else the name
    /// carried by the identity context.
    pub fn organization_name_of<'a>(&'a self, actor: &'a Actor) -> Option<&'a str> {
        self.organization_of(actor)
            .map(|org| org.name.as_str())
            .or_else(|| actor.organization_name())
    }

    /// Parse a YAML sequence of organizations.
    pub fn from_yaml_str(yaml_text: &str) -> AccessResult<Self> {
        let organizations: Vec<Organization> = fhir::parse_yaml(yaml_text, "Organization list")?;
        Self::from_organizations(organizations)
    }

    /// Load a YAML sequence of organizations from a file.
    pub fn load(path: &Path) -> AccessResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| AccessError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_yaml_str(&text)?;
        tracing::info!(
            path = %path.display(),
            organizations = registry.len(),
            "loaded tenancy registry"
        );
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;

    const ORGANIZATIONS: &str = r#"- id: org-1
  name: St Mary's Hospital
  type: hospital
  contact:
    email: admin@stmarys.example
    phone: "+44 20 7946 0000"
  counts:
    patients: 1200
    practitioners: 85
    admins: 4
- id: org-2
  name: Riverside Clinic
  type: clinic
"#;

    #[test]
    fn parses_organizations() {
        let registry = TenancyRegistry::from_yaml_str(ORGANIZATIONS).expect("parse registry");
        assert_eq!(registry.len(), 2);

        let org = registry.get("org-1").expect("org-1 registered");
        assert_eq!(org.organization_type, OrganizationType::Hospital);
        assert_eq!(org.counts.practitioners, 85);
        assert_eq!(org.contact.email.as_deref(), Some("admin@stmarys.example"));

        let clinic = registry.get("org-2").expect("org-2 registered");
        assert_eq!(clinic.counts, MemberCounts::default());
        assert!(registry.get("org-3").is_none());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let yaml = "- {id: org-1, name: A, type: clinic}\n- {id: org-1, name: B, type: clinic}\n";
        let err = TenancyRegistry::from_yaml_str(yaml).expect_err("duplicate");
        assert!(matches!(err, AccessError::DuplicateOrganization(id) if id == "org-1"));
    }

    #[test]
    fn resolves_actor_organization() {
        let registry = TenancyRegistry::from_yaml_str(ORGANIZATIONS).expect("parse registry");
        let actor = Actor::new("D1", "Dr. Adams", Role::Practitioner, Some("org-2"))
            .expect("actor")
            .with_organization_name("Old name");
        assert_eq!(registry.organization_name_of(&actor), Some("Riverside Clinic"));

        let unregistered = Actor::new("D2", "Dr. Lee", Role::Practitioner, Some("org-9"))
            .expect("actor")
            .with_organization_name("Hillside");
        assert!(registry.organization_of(&unregistered).is_none());
        assert_eq!(registry.organization_name_of(&unregistered), Some("Hillside"));

        let patient = Actor::new("P1", "Pat", Role::Patient, None).expect("actor");
        assert_eq!(registry.organization_name_of(&patient), None);
    }
}

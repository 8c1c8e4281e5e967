//! Identity context: who is acting, in which role, for which organization.
//!
//! Authentication is out of scope. An [`Actor`] is built from an already-established
//! identity and treated as validated. Role switches never mutate an actor in place;
//! [`Session::switch_role`] issues a fresh session as if the user had re-authenticated.

use crate::error::{AccessError, AccessResult};
use chrono::{DateTime, Utc};
use clinaccess_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// An actor's role.
///
/// Roles are totally ordered (`Patient < Practitioner < OrgAdmin < SuperAdmin`). The order
/// describes the default capability hierarchy; capabilities themselves are explicit
/// per-role sets (see [`CapabilityTable`](crate::permissions::CapabilityTable)).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Practitioner,
    OrgAdmin,
    SuperAdmin,
}

impl Role {
    /// All roles, lowest first.
    pub const ALL: [Role; 4] = [
        Role::Patient,
        Role::Practitioner,
        Role::OrgAdmin,
        Role::SuperAdmin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Practitioner => "practitioner",
            Role::OrgAdmin => "org_admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// Whether actors in this role must carry an organization id.
    pub fn requires_organization(self) -> bool {
        matches!(self, Role::Practitioner | Role::OrgAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match normalised.as_str() {
            "patient" => Ok(Role::Patient),
            "practitioner" => Ok(Role::Practitioner),
            "orgadmin" => Ok(Role::OrgAdmin),
            "superadmin" => Ok(Role::SuperAdmin),
            _ => Err(AccessError::InvalidInput(format!("Unknown role: {s}"))),
        }
    }
}

/// The current actor's identity, role and organization membership.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    id: NonEmptyText,
    display_name: NonEmptyText,
    role: Role,
    organization_id: Option<NonEmptyText>,
    organization_name: Option<String>,
    active: bool,
}

impl Actor {
    /// Create an active actor.
    ///
    /// # Errors
    ///
    /// - [`AccessError::InvalidIdentity`] if `id` or `display_name` is blank
    /// - [`AccessError::MissingOrganization`] if the role requires an organization and
    ///   `organization_id` is absent or blank
    pub fn new(
        id: impl AsRef<str>,
        display_name: impl AsRef<str>,
        role: Role,
        organization_id: Option<&str>,
    ) -> AccessResult<Self> {
        let id = NonEmptyText::new(id)
            .map_err(|_| AccessError::InvalidIdentity("actor id cannot be empty".into()))?;
        let display_name = NonEmptyText::new(display_name)
            .map_err(|_| AccessError::InvalidIdentity("display name cannot be empty".into()))?;
        let organization_id = NonEmptyText::from_optional(organization_id);

        if role.requires_organization() && organization_id.is_none() {
            return Err(AccessError::MissingOrganization { role });
        }

        Ok(Self {
            id,
            display_name,
            role,
            organization_id,
            organization_name: None,
            active: true,
        })
    }

    pub fn with_organization_name(mut self, name: impl Into<String>) -> Self {
        self.organization_name = Some(name.into());
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn id(&self) -> &NonEmptyText {
        &self.id
    }

    pub fn display_name(&self) -> &NonEmptyText {
        &self.display_name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn organization_id(&self) -> Option<&NonEmptyText> {
        self.organization_id.as_ref()
    }

    pub fn organization_name(&self) -> Option<&str> {
        self.organization_name.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Parse an identity context from YAML.
    ///
    /// ```yaml
    /// id: P001
    /// displayName: Jane Doe
    /// role: patient
    /// organizationId: org-1      # optional
    /// organizationName: St Mary  # optional
    /// active: true               # optional, defaults to true
    /// ```
    pub fn parse(yaml_text: &str) -> AccessResult<Self> {
        let wire: ActorWire = fhir::parse_yaml(yaml_text, "Actor")?;
        let actor = Actor::new(
            &wire.id,
            &wire.display_name,
            wire.role,
            wire.organization_id.as_deref(),
        )?
        .with_active(wire.active);

        Ok(match wire.organization_name {
            Some(name) => actor.with_organization_name(name),
            None => actor,
        })
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct ActorWire {
    id: String,
    display_name: String,
    role: Role,
    #[serde(default)]
    organization_id: Option<String>,
    #[serde(default)]
    organization_name: Option<String>,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

/// A session binding an [`Actor`] to a session id and start time.
///
/// Sessions are immutable. Switching role or re-authenticating yields a new session.
#[derive(Clone, Debug)]
pub struct Session {
    id: Uuid,
    actor: Actor,
    started_at: DateTime<Utc>,
}

impl Session {
    pub fn start(actor: Actor) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Issue a new session for the same person acting in `role`.
    ///
    /// `organization_id` replaces the current organization when given; otherwise the
    /// current one is kept. The organization name is only kept when the organization is.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::MissingOrganization`] if the new role requires an
    /// organization and none is available.
    pub fn switch_role(&self, role: Role, organization_id: Option<&str>) -> AccessResult<Session> {
        let current = &self.actor;
        let organization_id =
            organization_id.or_else(|| current.organization_id().map(NonEmptyText::as_str));

        let mut actor = Actor::new(current.id(), current.display_name(), role, organization_id)?
            .with_active(current.is_active());

        if actor.organization_id == current.organization_id {
            actor.organization_name = current.organization_name.clone();
        }

        Ok(Session::start(actor))
    }

    /// Issue a new session for a freshly authenticated actor.
    pub fn reauthenticate(&self, actor: Actor) -> Session {
        Session::start(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_totally_ordered() {
        assert!(Role::Patient < Role::Practitioner);
        assert!(Role::Practitioner < Role::OrgAdmin);
        assert!(Role::OrgAdmin < Role::SuperAdmin);
        let mut shuffled = vec![Role::SuperAdmin, Role::Patient, Role::OrgAdmin, Role::Practitioner];
        shuffled.sort();
        assert_eq!(shuffled, Role::ALL.to_vec());
    }

    #[test]
    fn parses_role_spellings() {
        assert_eq!("patient".parse::<Role>().expect("role"), Role::Patient);
        assert_eq!("Org-Admin".parse::<Role>().expect("role"), Role::OrgAdmin);
        assert_eq!("orgadmin".parse::<Role>().expect("role"), Role::OrgAdmin);
        assert_eq!("super_admin".parse::<Role>().expect("role"), Role::SuperAdmin);
        assert!(matches!(
            "billing".parse::<Role>(),
            Err(AccessError::InvalidInput(msg)) if msg.contains("billing")
        ));
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().expect("round trip"), role);
        }
    }

    #[test]
    fn practitioner_requires_organization() {
        let err = Actor::new("D1", "Dr. Adams", Role::Practitioner, None)
            .expect_err("practitioner without org");
        assert!(matches!(
            err,
            AccessError::MissingOrganization {
                role: Role::Practitioner
            }
        ));

        let err = Actor::new("A1", "Admin", Role::OrgAdmin, Some("  ")).expect_err("blank org");
        assert!(matches!(err, AccessError::MissingOrganization { .. }));

        Actor::new("P001", "Jane Doe", Role::Patient, None).expect("patient without org");
        Actor::new("root", "Root", Role::SuperAdmin, None).expect("super admin without org");
    }

    #[test]
    fn rejects_blank_identity() {
        let err = Actor::new(" ", "Jane", Role::Patient, None).expect_err("blank id");
        assert!(matches!(err, AccessError::InvalidIdentity(_)));
    }

    #[test]
    fn parses_actor_yaml() {
        let yaml = r#"id: D1
displayName: Dr. Adams
role: practitioner
organizationId: org-1
organizationName: St Mary
"#;
        let actor = Actor::parse(yaml).expect("parse actor");
        assert_eq!(actor.role(), Role::Practitioner);
        assert_eq!(actor.organization_id().map(NonEmptyText::as_str), Some("org-1"));
        assert_eq!(actor.organization_name(), Some("St Mary"));
        assert!(actor.is_active());

        let inactive = Actor::parse("id: P1\ndisplayName: Pat\nrole: patient\nactive: false\n")
            .expect("parse inactive");
        assert!(!inactive.is_active());
    }

    #[test]
    fn actor_yaml_is_strict() {
        let err = Actor::parse("id: P1\ndisplayName: Pat\nrole: patient\nrank: 3\n")
            .expect_err("unknown key");
        assert!(matches!(err, AccessError::Fhir(fhir::FhirError::Translation(msg)) if msg.contains("rank")));

        let err = Actor::parse("id: D1\ndisplayName: Dr\nrole: practitioner\n")
            .expect_err("missing organization");
        assert!(matches!(err, AccessError::MissingOrganization { .. }));
    }

    #[test]
    fn role_switch_issues_new_session() {
        let actor = Actor::new("U1", "Sam", Role::Practitioner, Some("org-1"))
            .expect("actor")
            .with_organization_name("St Mary");
        let session = Session::start(actor.clone());

        let switched = session
            .switch_role(Role::OrgAdmin, None)
            .expect("switch to org admin");
        assert_ne!(switched.id(), session.id());
        assert_eq!(switched.actor().role(), Role::OrgAdmin);
        assert_eq!(switched.actor().organization_name(), Some("St Mary"));
        assert_eq!(session.actor(), &actor);

        let moved = session
            .switch_role(Role::Practitioner, Some("org-2"))
            .expect("switch organization");
        assert_eq!(
            moved.actor().organization_id().map(NonEmptyText::as_str),
            Some("org-2")
        );
        assert_eq!(moved.actor().organization_name(), None);
    }

    #[test]
    fn role_switch_validates_organization() {
        let patient = Actor::new("P001", "Jane", Role::Patient, None).expect("actor");
        let session = Session::start(patient);
        let err = session
            .switch_role(Role::Practitioner, None)
            .expect_err("no organization to carry over");
        assert!(matches!(err, AccessError::MissingOrganization { .. }));

        let fresh = Actor::new("root", "Root", Role::SuperAdmin, None).expect("actor");
        let reauthenticated = session.reauthenticate(fresh.clone());
        assert_eq!(reauthenticated.actor(), &fresh);
    }
}

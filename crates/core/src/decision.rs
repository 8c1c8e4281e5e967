//! Access decision engine.
//!
//! [`AccessEngine::decide`] combines the capability table, the actor/resource
//! relationship and the per-role scoping rule into a single [`AccessDecision`].
//!
//! The engine is pure and total: identical inputs always give identical output, nothing
//! is logged or mutated, and every unexpected input fails closed. It holds only immutable
//! configuration, so one engine can be shared across threads and called once per
//! rendered row.

use crate::config::CoreConfig;
use crate::identity::{Actor, Role};
use crate::permissions::{CapabilityTable, Operation};
use crate::scoping::{classify, Relationship};
use fhir::{ClinicalResource, ResourceType};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

/// Why an operation was denied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The role never has this capability.
    RoleInsufficient,
    /// The role has the capability, but not for this resource instance.
    OutOfScope,
    /// The actor's identity is deactivated.
    InactiveActor,
    /// The request named an unknown resource type or operation, or a resource whose own
    /// type disagrees with the requested one.
    Misconfigured,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DenialReason::RoleInsufficient => "role lacks this capability",
            DenialReason::OutOfScope => "resource is outside the actor's scope",
            DenialReason::InactiveActor => "actor is inactive",
            DenialReason::Misconfigured => "unknown resource type or operation",
        })
    }
}

/// Which fields of an allowed resource may be shown.
///
/// Field-level redaction rules are not defined, so allowed decisions always carry
/// [`VisibleFields::All`]; denied decisions carry an empty set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VisibleFields {
    All,
    Only(BTreeSet<String>),
}

impl VisibleFields {
    pub fn permits(&self, field: &str) -> bool {
        match self {
            VisibleFields::All => true,
            VisibleFields::Only(fields) => fields.contains(field),
        }
    }
}

impl Serialize for VisibleFields {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            VisibleFields::All => serializer.serialize_str("all"),
            VisibleFields::Only(fields) => serializer.collect_seq(fields),
        }
    }
}

/// The engine's sole output. Never persisted; recomputed per request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    allowed: bool,
    reason: Option<DenialReason>,
    visible_fields: VisibleFields,
}

impl AccessDecision {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            visible_fields: VisibleFields::All,
        }
    }

    pub fn denied(reason: DenialReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            visible_fields: VisibleFields::Only(BTreeSet::new()),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn reason(&self) -> Option<DenialReason> {
        self.reason
    }

    pub fn visible_fields(&self) -> &VisibleFields {
        &self.visible_fields
    }
}

/// How practitioners are scoped within their organization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PractitionerScoping {
    /// Any resource of the practitioner's organization.
    #[default]
    Organization,
    /// Resources assigned to a practitioner are limited to that practitioner, matched
    /// by stable practitioner id. Unassigned resources fall back to organization scope.
    AssignedPractitioner,
}

/// Evaluates access decisions against a fixed capability table and scoping policy.
#[derive(Clone, Debug, Default)]
pub struct AccessEngine {
    capabilities: CapabilityTable,
    practitioner_scoping: PractitionerScoping,
}

impl AccessEngine {
    pub fn new(capabilities: CapabilityTable, practitioner_scoping: PractitionerScoping) -> Self {
        Self {
            capabilities,
            practitioner_scoping,
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(
            config.capabilities().clone(),
            config.practitioner_scoping(),
        )
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    pub fn practitioner_scoping(&self) -> PractitionerScoping {
        self.practitioner_scoping
    }

    /// Decide whether `actor` may perform `operation` on `resource`.
    ///
    /// 1. inactive actors are denied (`InactiveActor`)
    /// 2. a resource whose type is not `resource_type` is denied (`Misconfigured`)
    /// 3. the role must hold the capability (`RoleInsufficient`)
    /// 4. the actor/resource relationship must satisfy the role's scope (`OutOfScope`)
    pub fn decide(
        &self,
        actor: &Actor,
        resource_type: ResourceType,
        operation: Operation,
        resource: &ClinicalResource,
    ) -> AccessDecision {
        if !actor.is_active() {
            return AccessDecision::denied(DenialReason::InactiveActor);
        }
        if resource.resource_type != resource_type {
            return AccessDecision::denied(DenialReason::Misconfigured);
        }
        if !self
            .capabilities
            .allows(actor.role(), resource_type, operation)
        {
            return AccessDecision::denied(DenialReason::RoleInsufficient);
        }

        let relationship = classify(actor, resource);
        if !self.scope_permits(actor, operation, resource, relationship) {
            return AccessDecision::denied(DenialReason::OutOfScope);
        }

        AccessDecision::allowed()
    }

    /// [`decide`](Self::decide) with the resource type and operation given as tags.
    ///
    /// Unknown tags fail closed with [`DenialReason::Misconfigured`].
    pub fn decide_raw(
        &self,
        actor: &Actor,
        resource_type: &str,
        operation: &str,
        resource: &ClinicalResource,
    ) -> AccessDecision {
        let Some(resource_type) = ResourceType::from_tag(resource_type.trim()) else {
            return AccessDecision::denied(DenialReason::Misconfigured);
        };
        let Ok(operation) = operation.parse::<Operation>() else {
            return AccessDecision::denied(DenialReason::Misconfigured);
        };
        self.decide(actor, resource_type, operation, resource)
    }

    /// The resources on which `actor` may perform `operation`, in input order.
    pub fn filter_permitted<'a, I>(
        &self,
        actor: &Actor,
        operation: Operation,
        resources: I,
    ) -> Vec<&'a ClinicalResource>
    where
        I: IntoIterator<Item = &'a ClinicalResource>,
    {
        resources
            .into_iter()
            .filter(|resource| {
                self.decide(actor, resource.resource_type, operation, resource)
                    .is_allowed()
            })
            .collect()
    }

    fn scope_permits(
        &self,
        actor: &Actor,
        operation: Operation,
        resource: &ClinicalResource,
        relationship: Relationship,
    ) -> bool {
        // Global reference data with no owning individual is readable by everyone.
        let reference_read = !operation.is_mutation() && resource.owning_individual().is_none();

        match (actor.role(), relationship) {
            (Role::SuperAdmin, _) => true,
            (Role::Patient, Relationship::SelfOwned) => true,
            // Only patients classify as self; staff reach records through their organization.
            (_, Relationship::SelfOwned) => false,
            (_, Relationship::Unowned) => reference_read,
            (_, Relationship::CrossOrganization) => false,
            (Role::Patient, Relationship::SameOrganization) => false,
            (Role::Practitioner, Relationship::SameOrganization) => {
                self.assignment_permits(actor, resource)
            }
            (Role::OrgAdmin, Relationship::SameOrganization) => true,
        }
    }

    fn assignment_permits(&self, actor: &Actor, resource: &ClinicalResource) -> bool {
        match (self.practitioner_scoping, resource.practitioner_id.as_ref()) {
            (PractitionerScoping::AssignedPractitioner, Some(assigned)) => assigned == actor.id(),
            _ => true,
        }
    }
}

//! Tenancy & ownership scoping.
//!
//! Classifies how an actor relates to a resource instance. `SuperAdmin` bypasses tenancy
//! entirely and only `Patient` actors can be the owner of a record. Deciding which
//! relationships a role may act on is the decision engine's job.

use crate::identity::{Actor, Role};
use fhir::ClinicalResource;
use serde::Serialize;
use std::fmt;

/// How an actor relates to a resource instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// A patient's own record (owning individual id equals the patient actor's id).
    SelfOwned,
    /// The resource belongs to the actor's organization.
    SameOrganization,
    /// The resource belongs to another organization.
    CrossOrganization,
    /// The resource carries no organization id (global or reference data).
    Unowned,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relationship::SelfOwned => "self",
            Relationship::SameOrganization => "same-organization",
            Relationship::CrossOrganization => "cross-organization",
            Relationship::Unowned => "unowned",
        })
    }
}

/// Classify the relationship between `actor` and `resource`.
///
/// Rules, first match wins:
/// 1. `SuperAdmin` actors are always `SameOrganization`
/// 2. a `Patient` actor is the resource's owning individual: `SelfOwned`
/// 3. the resource has no organization: `Unowned`
/// 4. the organizations match: `SameOrganization`
/// 5. otherwise (including an actor with no organization): `CrossOrganization`
pub fn classify(actor: &Actor, resource: &ClinicalResource) -> Relationship {
    if actor.role() == Role::SuperAdmin {
        return Relationship::SameOrganization;
    }

    if actor.role() == Role::Patient && resource.owning_individual() == Some(actor.id()) {
        return Relationship::SelfOwned;
    }

    let Some(resource_org) = resource.organization_id.as_ref() else {
        return Relationship::Unowned;
    };

    match actor.organization_id() {
        Some(actor_org) if actor_org == resource_org => Relationship::SameOrganization,
        _ => Relationship::CrossOrganization,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhir::ResourceType;

    fn appointment(owner: &str, org: &str) -> ClinicalResource {
        ClinicalResource::new(ResourceType::Appointment, "A1")
            .expect("valid id")
            .with_owner(owner)
            .with_organization(org)
    }

    #[test]
    fn patient_owned_record_is_self() {
        let patient = Actor::new("P001", "Jane", Role::Patient, Some("org-1")).expect("actor");
        assert_eq!(
            classify(&patient, &appointment("P001", "org-2")),
            Relationship::SelfOwned
        );
        assert_eq!(
            classify(&patient, &appointment("P002", "org-1")),
            Relationship::SameOrganization
        );
    }

    #[test]
    fn patient_resource_is_owned_by_its_subject() {
        let patient = Actor::new("P001", "Jane", Role::Patient, None).expect("actor");
        let record = ClinicalResource::new(ResourceType::Patient, "P001")
            .expect("valid id")
            .with_organization("org-1");
        assert_eq!(classify(&patient, &record), Relationship::SelfOwned);
    }

    #[test]
    fn organization_membership() {
        let practitioner =
            Actor::new("D1", "Dr. Adams", Role::Practitioner, Some("org-1")).expect("actor");
        assert_eq!(
            classify(&practitioner, &appointment("P002", "org-1")),
            Relationship::SameOrganization
        );
        assert_eq!(
            classify(&practitioner, &appointment("P002", "org-2")),
            Relationship::CrossOrganization
        );

        let orphan = Actor::new("P5", "Pat", Role::Patient, None).expect("actor");
        assert_eq!(
            classify(&orphan, &appointment("P002", "org-1")),
            Relationship::CrossOrganization
        );
    }

    #[test]
    fn staff_ids_never_make_a_record_their_own() {
        let practitioner =
            Actor::new("D1", "Dr. Adams", Role::Practitioner, Some("org-1")).expect("actor");
        assert_eq!(
            classify(&practitioner, &appointment("D1", "org-2")),
            Relationship::CrossOrganization
        );
        assert_eq!(
            classify(&practitioner, &appointment("D1", "org-1")),
            Relationship::SameOrganization
        );
    }

    #[test]
    fn resources_without_organization_are_unowned() {
        let practitioner =
            Actor::new("D1", "Dr. Adams", Role::Practitioner, Some("org-1")).expect("actor");
        let code_system = ClinicalResource::new(ResourceType::CodeSystem, "loinc").expect("id");
        assert_eq!(classify(&practitioner, &code_system), Relationship::Unowned);
    }

    #[test]
    fn super_admin_bypasses_scoping() {
        let root = Actor::new("root", "Root", Role::SuperAdmin, None).expect("actor");
        assert_eq!(
            classify(&root, &appointment("P002", "org-9")),
            Relationship::SameOrganization
        );
        let code_system = ClinicalResource::new(ResourceType::CodeSystem, "loinc").expect("id");
        assert_eq!(classify(&root, &code_system), Relationship::SameOrganization);
    }
}

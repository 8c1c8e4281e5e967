//! Role & permission model.
//!
//! A [`CapabilityTable`] is an allow-list mapping each role to the `(resource type,
//! operation)` pairs it may ever perform, independent of tenancy. Anything not listed is
//! denied. `SuperAdmin` is a wildcard and satisfies every entry.
//!
//! Tables are explicit per-role sets rather than a numeric rank, so a role can be given
//! an orthogonal set of capabilities. [`CapabilityTable::check_monotonic`] reports where a
//! table departs from the `Patient < Practitioner < OrgAdmin < SuperAdmin` hierarchy.

use crate::error::{AccessError, AccessResult};
use crate::identity::Role;
use fhir::ResourceType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// An operation the UI may perform on a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    View,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::View,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::View => "view",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    /// Whether the operation changes data.
    pub fn is_mutation(self) -> bool {
        !matches!(self, Operation::View)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "view" | "read" => Ok(Operation::View),
            "create" => Ok(Operation::Create),
            "update" | "edit" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            _ => Err(AccessError::InvalidInput(format!("Unknown operation: {s}"))),
        }
    }
}

/// A single `(resource type, operation)` entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub resource_type: ResourceType,
    pub operation: Operation,
}

impl Capability {
    pub fn new(resource_type: ResourceType, operation: Operation) -> Self {
        Self {
            resource_type,
            operation,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.operation, self.resource_type)
    }
}

/// A capability held by a lower role but missing from a higher one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonotonicViolation {
    pub lower: Role,
    pub higher: Role,
    pub capability: Capability,
}

impl fmt::Display for MonotonicViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} has {} but {} does not",
            self.lower, self.capability, self.higher
        )
    }
}

/// Configured grants for one role, before inheritance is resolved.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleGrants {
    /// Roles whose effective capabilities are included in this one.
    #[serde(default)]
    pub inherits: Vec<Role>,
    #[serde(default)]
    pub view: Vec<ResourceType>,
    #[serde(default)]
    pub create: Vec<ResourceType>,
    #[serde(default)]
    pub update: Vec<ResourceType>,
    #[serde(default)]
    pub delete: Vec<ResourceType>,
}

impl RoleGrants {
    fn own_capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        [
            (Operation::View, &self.view),
            (Operation::Create, &self.create),
            (Operation::Update, &self.update),
            (Operation::Delete, &self.delete),
        ]
        .into_iter()
        .flat_map(|(operation, types)| {
            types
                .iter()
                .map(move |resource_type| Capability::new(*resource_type, operation))
        })
    }
}

/// Allow-list of capabilities per role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapabilityTable {
    grants: BTreeMap<Role, BTreeSet<Capability>>,
}

impl CapabilityTable {
    /// A table with no grants. Only `SuperAdmin` can do anything.
    pub fn empty() -> Self {
        Self {
            grants: BTreeMap::new(),
        }
    }

    /// Resolve configured per-role grants, following `inherits` links.
    ///
    /// Roles absent from `config` get no capabilities. Grants listed for `SuperAdmin` are
    /// accepted but have no effect.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::InheritanceCycle`] if `inherits` links form a cycle.
    pub fn from_role_grants(config: &BTreeMap<Role, RoleGrants>) -> AccessResult<Self> {
        fn resolve(
            role: Role,
            config: &BTreeMap<Role, RoleGrants>,
            resolved: &mut BTreeMap<Role, BTreeSet<Capability>>,
            visiting: &mut Vec<Role>,
        ) -> AccessResult<BTreeSet<Capability>> {
            if let Some(done) = resolved.get(&role) {
                return Ok(done.clone());
            }
            if visiting.contains(&role) {
                return Err(AccessError::InheritanceCycle(role));
            }

            let Some(grants) = config.get(&role) else {
                return Ok(BTreeSet::new());
            };

            visiting.push(role);
            let mut capabilities: BTreeSet<Capability> = grants.own_capabilities().collect();
            for parent in &grants.inherits {
                capabilities.extend(resolve(*parent, config, resolved, visiting)?);
            }
            visiting.pop();

            resolved.insert(role, capabilities.clone());
            Ok(capabilities)
        }

        let mut resolved = BTreeMap::new();
        for role in config.keys() {
            resolve(*role, config, &mut resolved, &mut Vec::new())?;
        }
        resolved.remove(&Role::SuperAdmin);

        Ok(Self { grants: resolved })
    }

    /// Grant `operations` on `resource_types` to `role`.
    pub fn grant(
        &mut self,
        role: Role,
        resource_types: &[ResourceType],
        operations: &[Operation],
    ) -> &mut Self {
        if role == Role::SuperAdmin {
            return self;
        }
        let entry = self.grants.entry(role).or_default();
        for resource_type in resource_types {
            for operation in operations {
                entry.insert(Capability::new(*resource_type, *operation));
            }
        }
        self
    }

    /// Whether `role` may ever perform `operation` on `resource_type`.
    pub fn allows(&self, role: Role, resource_type: ResourceType, operation: Operation) -> bool {
        if role == Role::SuperAdmin {
            return true;
        }
        self.grants
            .get(&role)
            .is_some_and(|set| set.contains(&Capability::new(resource_type, operation)))
    }

    /// The effective capabilities of `role`, sorted.
    pub fn grants_for(&self, role: Role) -> Vec<Capability> {
        if role == Role::SuperAdmin {
            return ResourceType::ALL
                .into_iter()
                .flat_map(|rt| Operation::ALL.map(|op| Capability::new(rt, op)))
                .collect();
        }
        self.grants
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every place where a lower role holds a capability a higher role lacks.
    pub fn check_monotonic(&self) -> Vec<MonotonicViolation> {
        let mut violations = Vec::new();
        for (i, lower) in Role::ALL.iter().enumerate() {
            for higher in &Role::ALL[i + 1..] {
                for capability in self.grants_for(*lower) {
                    if !self.allows(*higher, capability.resource_type, capability.operation) {
                        violations.push(MonotonicViolation {
                            lower: *lower,
                            higher: *higher,
                            capability,
                        });
                    }
                }
            }
        }
        violations
    }
}

impl Default for CapabilityTable {
    /// The built-in table used when no configuration is supplied.
    fn default() -> Self {
        use Operation::{Create, Delete, Update, View};
        use ResourceType::*;

        let mut table = Self::empty();

        let patient_views = [
            Patient,
            Practitioner,
            Organization,
            Appointment,
            Encounter,
            Observation,
            Condition,
            MedicationRequest,
            Medication,
            AllergyIntolerance,
            Immunization,
            DiagnosticReport,
            Claim,
            Coverage,
            CodeSystem,
            ValueSet,
        ];
        let clinical_records = [
            Encounter,
            Observation,
            Condition,
            Procedure,
            MedicationRequest,
            AllergyIntolerance,
            Immunization,
            DiagnosticReport,
        ];
        let administrative = [Patient, Practitioner, PractitionerRole, Claim, Coverage];

        for role in [Role::Patient, Role::Practitioner, Role::OrgAdmin] {
            table
                .grant(role, &patient_views, &[View])
                .grant(role, &[Appointment], &[Create, Update])
                .grant(role, &[Patient], &[Update]);
        }

        for role in [Role::Practitioner, Role::OrgAdmin] {
            table
                .grant(role, &[PractitionerRole, Procedure], &[View])
                .grant(role, &clinical_records, &[Create, Update])
                .grant(role, &[Appointment], &[Delete]);
        }

        table
            .grant(Role::OrgAdmin, &administrative, &[Create, Update, Delete])
            .grant(Role::OrgAdmin, &[Organization], &[Update]);

        table
    }
}

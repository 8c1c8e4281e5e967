//! # clinaccess core
//!
//! Role-based access decisions for clinical resources.
//!
//! This crate answers one question for every (actor, operation, resource) triple the
//! UI is about to render or perform: is it allowed? It contains:
//! - the identity context (actor, role, session)
//! - the per-role capability table
//! - tenancy and ownership scoping
//! - the access decision engine
//! - organizations, the resource-store seam and startup configuration
//!
//! **No UI or transport concerns**: rendering, forms, navigation and authentication live
//! outside this crate and only consume its decisions. Terminology and reference resolution
//! live in the `fhir` crate.

pub mod config;
pub mod constants;
pub mod decision;
pub mod error;
pub mod identity;
pub mod organization;
pub mod permissions;
pub mod scoping;
pub mod store;

pub use config::{resolve_config, CoreConfig};
pub use decision::{
    AccessDecision, AccessEngine, DenialReason, PractitionerScoping, VisibleFields,
};
pub use error::{AccessError, AccessResult};
pub use identity::{Actor, Role, Session};
pub use organization::{Organization, OrganizationType, TenancyRegistry};
pub use permissions::{Capability, CapabilityTable, Operation};
pub use scoping::{classify, Relationship};
pub use store::{display_reference, InMemoryResourceStore, ResourceStore};

pub use clinaccess_types::NonEmptyText;

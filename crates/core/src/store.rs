//! Resource store seam used to dereference references for display.
//!
//! The real resource store (an API, a cache, mock data) lives outside this crate. Anything
//! implementing [`ResourceStore`] can back [`display_reference`].

use crate::error::{AccessError, AccessResult};
use fhir::reference::display_of;
use fhir::{ClinicalResource, LookupError, Reference, ResourceType};
use std::collections::HashMap;
use std::path::Path;

/// Lookup of resource envelopes by type and id.
pub trait ResourceStore {
    fn fetch_by_reference(
        &self,
        resource_type: ResourceType,
        id: &str,
    ) -> Result<ClinicalResource, LookupError>;

    /// The [`ClinicalResource::display_label`] of the referenced resource.
    ///
    /// Stores that hold resources in memory should override this to skip the envelope copy.
    fn display_label_of(
        &self,
        resource_type: ResourceType,
        id: &str,
    ) -> Result<String, LookupError> {
        self.fetch_by_reference(resource_type, id)
            .map(|resource| resource.display_label())
    }
}

/// Display text for `reference`, dereferencing through `store` when needed.
///
/// The dereferenced display is the target's [`ClinicalResource::display_label`].
pub fn display_reference<S: ResourceStore + ?Sized>(store: &S, reference: &Reference) -> String {
    display_of(reference, |parsed| store.display_label_of(parsed.resource_type, &parsed.id))
}

/// A `HashMap`-backed store, mainly for the CLI and tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryResourceStore {
    resources: HashMap<ResourceType, HashMap<String, ClinicalResource>>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from resources.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::DuplicateResource`] if two resources share type and id.
    pub fn from_resources(
        resources: impl IntoIterator<Item = ClinicalResource>,
    ) -> AccessResult<Self> {
        let mut store = Self::new();
        for resource in resources {
            store.insert(resource)?;
        }
        Ok(store)
    }

    pub fn insert(&mut self, resource: ClinicalResource) -> AccessResult<()> {
        let by_id = self.resources.entry(resource.resource_type).or_default();
        if by_id.contains_key(resource.id.as_str()) {
            return Err(AccessError::DuplicateResource(format!(
                "{}/{}",
                resource.resource_type, resource.id
            )));
        }
        by_id.insert(resource.id.as_str().to_string(), resource);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.resources.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn resources(&self) -> impl Iterator<Item = &ClinicalResource> {
        self.resources.values().flat_map(HashMap::values)
    }

    fn get(&self, resource_type: ResourceType, id: &str) -> Result<&ClinicalResource, LookupError> {
        match self
            .resources
            .get(&resource_type)
            .and_then(|by_id| by_id.get(id))
        {
            Some(resource) => Ok(resource),
            None => {
                tracing::debug!(%resource_type, id, "resource not found in store");
                Err(LookupError::NotFound)
            }
        }
    }

    /// Load a YAML sequence of resource envelopes from a file.
    pub fn load(path: &Path) -> AccessResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| AccessError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_resources(ClinicalResource::parse_many(&text)?)?;
        tracing::info!(
            path = %path.display(),
            resources = store.len(),
            "loaded resource store"
        );
        Ok(store)
    }
}

impl ResourceStore for InMemoryResourceStore {
    fn fetch_by_reference(
        &self,
        resource_type: ResourceType,
        id: &str,
    ) -> Result<ClinicalResource, LookupError> {
        self.get(resource_type, id).cloned()
    }

    fn display_label_of(
        &self,
        resource_type: ResourceType,
        id: &str,
    ) -> Result<String, LookupError> {
        self.get(resource_type, id).map(ClinicalResource::display_label)
    }
}

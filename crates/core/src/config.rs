//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the engine and
//! resolvers. Nothing in this crate reads environment variables during evaluation; the
//! binary decides where configuration comes from and hands the path in.

use crate::constants::DEFAULT_STRICT_HIERARCHY;
use crate::decision::PractitionerScoping;
use crate::error::{AccessError, AccessResult};
use crate::identity::Role;
use crate::permissions::{CapabilityTable, RoleGrants};
use fhir::terminology::DEFAULT_LOCAL_SYSTEM_PREFIXES;
use fhir::CodeSystemRegistry;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    capabilities: CapabilityTable,
    practitioner_scoping: PractitionerScoping,
    strict_hierarchy: bool,
    local_code_systems: Vec<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            capabilities: CapabilityTable::default(),
            practitioner_scoping: PractitionerScoping::default(),
            strict_hierarchy: DEFAULT_STRICT_HIERARCHY,
            local_code_systems: DEFAULT_LOCAL_SYSTEM_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// With `strict_hierarchy` set, returns [`AccessError::NonMonotonicCapabilities`]
    /// listing every capability a lower role holds that a higher role lacks.
    pub fn new(
        capabilities: CapabilityTable,
        practitioner_scoping: PractitionerScoping,
        strict_hierarchy: bool,
        local_code_systems: Vec<String>,
    ) -> AccessResult<Self> {
        if strict_hierarchy {
            let violations = capabilities.check_monotonic();
            if !violations.is_empty() {
                let details = violations
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(AccessError::NonMonotonicCapabilities(details));
            }
        }

        Ok(Self {
            capabilities,
            practitioner_scoping,
            strict_hierarchy,
            local_code_systems,
        })
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    pub fn practitioner_scoping(&self) -> PractitionerScoping {
        self.practitioner_scoping
    }

    pub fn strict_hierarchy(&self) -> bool {
        self.strict_hierarchy
    }

    pub fn local_code_systems(&self) -> &[String] {
        &self.local_code_systems
    }

    /// A code-system registry recognising the configured local prefixes.
    pub fn code_system_registry(&self) -> CodeSystemRegistry {
        CodeSystemRegistry::new(&self.local_code_systems)
    }

    /// Parse configuration from YAML text.
    ///
    /// Omitted settings take their defaults; an omitted `capabilities` mapping keeps the
    /// built-in table.
    pub fn from_yaml_str(yaml_text: &str) -> AccessResult<Self> {
        let wire: CoreConfigWire = fhir::parse_yaml(yaml_text, "Configuration")?;

        let capabilities = match &wire.capabilities {
            Some(grants) => {
                if grants.contains_key(&Role::SuperAdmin) {
                    tracing::warn!("super_admin grants are ignored; super_admin is a wildcard");
                }
                CapabilityTable::from_role_grants(grants)?
            }
            None => CapabilityTable::default(),
        };

        let local_code_systems = wire.local_code_systems.unwrap_or_else(|| {
            DEFAULT_LOCAL_SYSTEM_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect()
        });

        Self::new(
            capabilities,
            wire.practitioner_scoping.unwrap_or_default(),
            wire.strict_hierarchy.unwrap_or(DEFAULT_STRICT_HIERARCHY),
            local_code_systems,
        )
    }

    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> AccessResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| AccessError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&text)?;
        tracing::info!(
            path = %path.display(),
            practitioner_scoping = ?config.practitioner_scoping,
            "loaded access configuration"
        );
        Ok(config)
    }
}

/// Resolve configuration from an optional file path, falling back to built-in defaults.
pub fn resolve_config(path_override: Option<PathBuf>) -> AccessResult<CoreConfig> {
    match path_override {
        Some(path) => CoreConfig::load(&path),
        None => {
            tracing::debug!("no configuration file given; using built-in capability table");
            Ok(CoreConfig::default())
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct CoreConfigWire {
    #[serde(default)]
    practitioner_scoping: Option<PractitionerScoping>,
    #[serde(default)]
    strict_hierarchy: Option<bool>,
    #[serde(default)]
    local_code_systems: Option<Vec<String>>,
    #[serde(default)]
    capabilities: Option<BTreeMap<Role, RoleGrants>>,
}

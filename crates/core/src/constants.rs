//! Constants used throughout the clinaccess core crate.

/// Environment variable naming the YAML configuration file.
pub const CONFIG_PATH_ENV: &str = "CLINACCESS_CONFIG";

/// Environment variable naming a YAML file of organizations.
pub const ORGANIZATIONS_PATH_ENV: &str = "CLINACCESS_ORGANIZATIONS";

/// Environment variable naming a YAML file of resource envelopes for reference lookups.
pub const RESOURCES_PATH_ENV: &str = "CLINACCESS_RESOURCES";

/// Whether configured capability tables must satisfy the monotonic-capability property.
pub const DEFAULT_STRICT_HIERARCHY: bool = true;

use crate::identity::Role;

/// Errors raised while building identities, loading configuration or reference data.
///
/// Access denials are not errors: they are returned as
/// [`AccessDecision`](crate::decision::AccessDecision) values.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("{role} actors must belong to an organization")]
    MissingOrganization { role: Role },

    #[error("capability table is not monotonic: {0}")]
    NonMonotonicCapabilities(String),

    #[error("capability inheritance cycle involving {0}")]
    InheritanceCycle(Role),

    #[error("duplicate organization id: {0}")]
    DuplicateOrganization(String),

    #[error("duplicate resource: {0}")]
    DuplicateResource(String),

    #[error("failed to read file {}: {source}", .path.display())]
    FileRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("FHIR error: {0}")]
    Fhir(#[from] fhir::FhirError),
}

pub type AccessResult<T> = std::result::Result<T, AccessError>;

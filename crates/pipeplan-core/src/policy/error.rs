//! Error types for the policy module.

/// Errors produced by policy construction.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("no environments: at least one account must be granted read access")]
    NoEnvironments,

    #[error("invalid artifact store name: {0:?}")]
    InvalidStoreName(String),
}

/// Result type for policy operations.
pub type PolicyResult<T> = std::result::Result<T, PolicyError>;

//! Domain-level error taxonomy for pipeplan.

/// Errors produced while parsing or encoding domain values.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("unknown deployment type: {0} (expected 'feature' or 'release')")]
    UnknownDeploymentType(String),

    #[error("unknown compute profile: {0}")]
    UnknownComputeProfile(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for domain operations.
pub type DomainResult<T> = std::result::Result<T, DomainError>;

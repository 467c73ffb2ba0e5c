//! Error types for plan execution.

use pipeplan_core::domain::Violation;
use pipeplan_core::request::RequestError;

/// Failures that abort an execution. Action-level failures are recorded in
/// the execution report instead.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("plan failed validation with {} violation(s)", .0.len())]
    InvalidPlan(Vec<Violation>),

    #[error("secret not found: {name}")]
    SecretNotFound { name: String },

    #[error("request error: {0}")]
    Request(#[from] RequestError),
}

/// Result type for execution.
pub type ExecResult<T> = std::result::Result<T, ExecError>;

/// Error returned by a collaborator for a single request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("artifact {artifact} has no recorded location")]
    UnknownArtifact { artifact: String },
}

pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

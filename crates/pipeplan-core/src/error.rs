//! Crate-wide error aggregating every module's error type.

use crate::compiler::CompileError;
use crate::config::ConfigError;
use crate::domain::DomainError;
use crate::policy::PolicyError;
use crate::registry::RegistryError;
use crate::request::RequestError;

/// Any error pipeplan-core can produce.
#[derive(Debug, thiserror::Error)]
pub enum PipeplanError {
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("request error: {0}")]
    Request(#[from] RequestError),

    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Result type for pipeplan-core operations.
pub type Result<T> = std::result::Result<T, PipeplanError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn fails() -> Result<()> {
        let inner: std::result::Result<(), PolicyError> = Err(PolicyError::NoEnvironments);
        inner?;
        Ok(())
    }

    #[test]
    fn test_question_mark_converts() {
        let err = fails().unwrap_err();
        assert!(matches!(err, PipeplanError::Policy(PolicyError::NoEnvironments)));
        assert!(err.to_string().starts_with("policy error"));
    }
}

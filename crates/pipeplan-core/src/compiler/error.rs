//! Error types for topology compilation.

use thiserror::Error;

use crate::domain::validation::Violation;

/// Errors produced by [`crate::compiler::compile`].
#[derive(Debug, Error)]
pub enum CompileError {
    /// The pipeline line needs an environment the registry does not hold.
    #[error("missing environment: {name} is required by this deployment type but not registered")]
    MissingEnvironment { name: String },

    /// The naming prefix is empty or not identifier-safe.
    #[error("invalid prefix {prefix:?}: {reason}")]
    InvalidPrefix { prefix: String, reason: String },

    /// The region is not a well-formed region code.
    #[error("invalid region {region:?}: {reason}")]
    InvalidRegion { region: String, reason: String },

    /// The source branch is empty or malformed.
    #[error("invalid branch {branch:?}: {reason}")]
    InvalidBranch { branch: String, reason: String },

    /// A resource group depends on a group that is not being deployed.
    #[error("resource group {group} depends on {dependency}, which is not deployed")]
    UnresolvedDependency { group: String, dependency: String },

    /// Resource group dependencies form a cycle.
    #[error("dependency cycle detected involving resource groups: {groups:?}")]
    DependencyCycle { groups: Vec<String> },

    /// The compiler produced a plan that breaks a structural invariant.
    #[error(
        "compiled plan violates {} structural invariant(s); first: {}",
        .violations.len(),
        .violations.first().map(ToString::to_string).unwrap_or_default()
    )]
    Structural { violations: Vec<Violation> },
}

impl CompileError {
    /// `true` for errors caused by caller input rather than a compiler defect.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CompileError::MissingEnvironment { .. }
                | CompileError::InvalidPrefix { .. }
                | CompileError::InvalidRegion { .. }
                | CompileError::InvalidBranch { .. }
        )
    }
}

/// Convenience result alias.
pub type CompileResult<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_environment_names_environment() {
        let err = CompileError::MissingEnvironment {
            name: "ci".to_string(),
        };
        assert!(err.to_string().contains("ci"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_structural_error_counts_violations() {
        let err = CompileError::Structural {
            violations: vec![Violation::EmptyPlan],
        };
        let msg = err.to_string();
        assert!(msg.contains("1 structural"));
        assert!(msg.contains("plan has no stages"));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_invalid_prefix_displays_reason() {
        let err = CompileError::InvalidPrefix {
            prefix: "bad prefix".to_string(),
            reason: "contains whitespace".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("bad prefix"));
        assert!(msg.contains("whitespace"));
    }
}

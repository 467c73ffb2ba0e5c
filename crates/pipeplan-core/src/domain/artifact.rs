//! Artifact handles and parameter values that point into them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Named handle to a build output passed between stages.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A file inside this artifact.
    pub fn at_path(&self, path: impl Into<String>) -> ArtifactPath {
        ArtifactPath {
            artifact: self.clone(),
            path: path.into(),
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file within an artifact, e.g. a synthesized template.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactPath {
    pub artifact: ArtifactRef,
    pub path: String,
}

impl fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.artifact, self.path)
    }
}

/// Value of a parameter override.
///
/// Artifact locations are only known once the artifact exists, so they are
/// carried as references and resolved by the executor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterValue {
    Literal { value: String },
    /// Bucket holding the artifact.
    ArtifactBucket { artifact: ArtifactRef },
    /// Object key of the artifact within its bucket.
    ArtifactObjectKey { artifact: ArtifactRef },
}

impl ParameterValue {
    pub fn literal(value: impl Into<String>) -> Self {
        ParameterValue::Literal {
            value: value.into(),
        }
    }

    /// The artifact this value points into, if any.
    pub fn referenced_artifact(&self) -> Option<&ArtifactRef> {
        match self {
            ParameterValue::Literal { .. } => None,
            ParameterValue::ArtifactBucket { artifact }
            | ParameterValue::ArtifactObjectKey { artifact } => Some(artifact),
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            ParameterValue::Literal { value } => Some(value),
            _ => None,
        }
    }
}

//! Locations of artifacts produced during one execution.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use pipeplan_core::domain::{ArtifactRef, ParameterValue};

use crate::error::{CollaboratorError, CollaboratorResult};

/// Where an artifact lives inside the artifact store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    pub bucket: String,
    pub object_key: String,
}

/// Artifact locations recorded as producers succeed.
#[derive(Debug, Clone)]
pub struct ArtifactIndex {
    store: String,
    pipeline: String,
    execution_id: String,
    locations: BTreeMap<ArtifactRef, ArtifactLocation>,
}

impl ArtifactIndex {
    /// Keys are `<pipeline>/<artifact>/<execution>` inside `store`.
    pub fn new(store: impl Into<String>, pipeline: &str, execution_id: &str) -> Self {
        Self {
            store: store.into(),
            pipeline: pipeline.to_string(),
            execution_id: execution_id.to_string(),
            locations: BTreeMap::new(),
        }
    }

    /// Location `artifact` is written to once produced.
    pub fn planned(&self, artifact: &ArtifactRef) -> ArtifactLocation {
        ArtifactLocation {
            bucket: self.store.clone(),
            object_key: format!("{}/{}/{}", self.pipeline, artifact, self.execution_id),
        }
    }

    /// Record `artifact` as produced and return its location.
    pub fn register(&mut self, artifact: &ArtifactRef) -> ArtifactLocation {
        let location = self.planned(artifact);
        self.locations.insert(artifact.clone(), location.clone());
        location
    }

    pub fn location(&self, artifact: &ArtifactRef) -> CollaboratorResult<&ArtifactLocation> {
        self.locations
            .get(artifact)
            .ok_or_else(|| CollaboratorError::UnknownArtifact {
                artifact: artifact.to_string(),
            })
    }

    /// Resolve every override to a literal string.
    pub fn resolve_overrides(
        &self,
        overrides: &BTreeMap<String, ParameterValue>,
    ) -> CollaboratorResult<BTreeMap<String, String>> {
        overrides
            .iter()
            .map(|(name, value)| {
                let resolved = match value {
                    ParameterValue::Literal { value } => value.clone(),
                    ParameterValue::ArtifactBucket { artifact } => {
                        self.location(artifact)?.bucket.clone()
                    }
                    ParameterValue::ArtifactObjectKey { artifact } => {
                        self.location(artifact)?.object_key.clone()
                    }
                };
                Ok((name.clone(), resolved))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let mut index = ArtifactIndex::new("store", "p-feature-deployment-pipeline", "exec-1");
        let lambda = ArtifactRef::new("LambdaBuildOutput");
        let location = index.register(&lambda);
        assert_eq!(location.bucket, "store");
        assert_eq!(
            location.object_key,
            "p-feature-deployment-pipeline/LambdaBuildOutput/exec-1"
        );

        let mut overrides = BTreeMap::new();
        overrides.insert(
            "SourceBucketName".to_string(),
            ParameterValue::ArtifactBucket {
                artifact: lambda.clone(),
            },
        );
        overrides.insert(
            "SourceObjectKey".to_string(),
            ParameterValue::ArtifactObjectKey { artifact: lambda },
        );
        overrides.insert("Environment".to_string(), ParameterValue::literal("dev"));

        let resolved = index.resolve_overrides(&overrides).unwrap();
        assert_eq!(resolved["SourceBucketName"], "store");
        assert_eq!(resolved["SourceObjectKey"], location.object_key);
        assert_eq!(resolved["Environment"], "dev");
    }

    #[test]
    fn test_unknown_artifact() {
        let index = ArtifactIndex::new("store", "p", "e");
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "SourceBucketName".to_string(),
            ParameterValue::ArtifactBucket {
                artifact: ArtifactRef::new("Missing"),
            },
        );
        assert!(matches!(
            index.resolve_overrides(&overrides),
            Err(CollaboratorError::UnknownArtifact { .. })
        ));
        assert!(index.is_empty());
    }
}

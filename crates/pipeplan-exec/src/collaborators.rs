//! Collaborator contracts the executor drives.
//!
//! Every trait is object-safe and `Send + Sync` so implementations can be
//! shared across concurrently running actions behind an `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pipeplan_core::request::{
    ApprovalRequest, BucketEmptyRequest, BucketPublishRequest, BuildRequest, SourceFetchRequest,
    StackDeleteRequest, StackDeployRequest,
};

use crate::artifacts::ArtifactLocation;
use crate::error::CollaboratorResult;

/// Stack and bucket operations in target accounts.
#[async_trait]
pub trait InfrastructureProvider: Send + Sync {
    /// Create or update a stack. `parameters` are the overrides with every
    /// artifact reference already resolved.
    async fn deploy_stack(
        &self,
        request: &StackDeployRequest,
        parameters: &BTreeMap<String, String>,
    ) -> CollaboratorResult<()>;

    async fn delete_stack(&self, request: &StackDeleteRequest) -> CollaboratorResult<()>;

    /// Copy the artifact stored at `source` into the request's bucket.
    async fn publish_bucket(
        &self,
        request: &BucketPublishRequest,
        source: &ArtifactLocation,
    ) -> CollaboratorResult<()>;

    async fn empty_bucket(&self, request: &BucketEmptyRequest) -> CollaboratorResult<()>;
}

/// Runs build projects.
#[async_trait]
pub trait BuildRunner: Send + Sync {
    async fn run_build(&self, request: &BuildRequest, input: &ArtifactLocation)
        -> CollaboratorResult<()>;
}

/// Fetches a branch snapshot from the source repository.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Returns the fetched revision.
    async fn fetch(&self, request: &SourceFetchRequest, token: &str) -> CollaboratorResult<String>;
}

/// Resolves credential handles to secret values.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, name: &str) -> Option<String>;
}

/// Decision returned by an approval gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected { reason: String },
}

/// Blocks until a human approves or rejects.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn request_approval(&self, request: &ApprovalRequest)
        -> CollaboratorResult<ApprovalDecision>;
}

/// The full set of collaborators an executor needs.
#[derive(Clone)]
pub struct Collaborators {
    pub infrastructure: Arc<dyn InfrastructureProvider>,
    pub builds: Arc<dyn BuildRunner>,
    pub source: Arc<dyn SourceProvider>,
    pub secrets: Arc<dyn SecretStore>,
    pub approvals: Arc<dyn ApprovalGate>,
}

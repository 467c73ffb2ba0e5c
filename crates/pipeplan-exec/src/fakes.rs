//! In-memory collaborators for tests and dry runs.
//!
//! Every fake records what it was asked to do and succeeds unless told to
//! fail for a specific stack, bucket, project or stage.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use pipeplan_core::request::{
    ApprovalRequest, BucketEmptyRequest, BucketPublishRequest, BuildRequest, SourceFetchRequest,
    StackDeleteRequest, StackDeployRequest,
};

use crate::artifacts::ArtifactLocation;
use crate::collaborators::{
    ApprovalDecision, ApprovalGate, BuildRunner, Collaborators, InfrastructureProvider,
    SecretStore, SourceProvider,
};
use crate::error::{CollaboratorError, CollaboratorResult};

// ---------------------------------------------------------------------------
// RecordingInfrastructure
// ---------------------------------------------------------------------------

/// One call received by [`RecordingInfrastructure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfrastructureCall {
    DeployStack {
        stack: String,
        account: String,
        role: String,
        parameters: BTreeMap<String, String>,
    },
    DeleteStack {
        stack: String,
        account: String,
    },
    PublishBucket {
        bucket: String,
        source_key: String,
    },
    EmptyBucket {
        bucket: String,
    },
}

#[derive(Debug, Default)]
pub struct RecordingInfrastructure {
    calls: Mutex<Vec<InfrastructureCall>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingInfrastructure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every operation on the stack or bucket called `name`.
    pub fn fail_on(&self, name: impl Into<String>) {
        self.failing.lock().unwrap().insert(name.into());
    }

    pub fn calls(&self) -> Vec<InfrastructureCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, name: &str, call: InfrastructureCall) -> CollaboratorResult<()> {
        if self.failing.lock().unwrap().contains(name) {
            return Err(CollaboratorError::Rejected(format!("{} failed", name)));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl InfrastructureProvider for RecordingInfrastructure {
    async fn deploy_stack(
        &self,
        request: &StackDeployRequest,
        parameters: &BTreeMap<String, String>,
    ) -> CollaboratorResult<()> {
        self.record(
            &request.stack,
            InfrastructureCall::DeployStack {
                stack: request.stack.clone(),
                account: request.target_account.to_string(),
                role: request.executing_role.to_string(),
                parameters: parameters.clone(),
            },
        )
    }

    async fn delete_stack(&self, request: &StackDeleteRequest) -> CollaboratorResult<()> {
        self.record(
            &request.stack,
            InfrastructureCall::DeleteStack {
                stack: request.stack.clone(),
                account: request.target_account.to_string(),
            },
        )
    }

    async fn publish_bucket(
        &self,
        request: &BucketPublishRequest,
        source: &ArtifactLocation,
    ) -> CollaboratorResult<()> {
        self.record(
            &request.bucket,
            InfrastructureCall::PublishBucket {
                bucket: request.bucket.clone(),
                source_key: source.object_key.clone(),
            },
        )
    }

    async fn empty_bucket(&self, request: &BucketEmptyRequest) -> CollaboratorResult<()> {
        self.record(
            &request.bucket,
            InfrastructureCall::EmptyBucket {
                bucket: request.bucket.clone(),
            },
        )
    }
}

// ---------------------------------------------------------------------------
// RecordingBuildRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingBuildRunner {
    builds: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingBuildRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, project: impl Into<String>) {
        self.failing.lock().unwrap().insert(project.into());
    }

    /// Project identifiers built, in completion order.
    pub fn builds(&self) -> Vec<String> {
        self.builds.lock().unwrap().clone()
    }
}

#[async_trait]
impl BuildRunner for RecordingBuildRunner {
    async fn run_build(
        &self,
        request: &BuildRequest,
        _input: &ArtifactLocation,
    ) -> CollaboratorResult<()> {
        if self.failing.lock().unwrap().contains(&request.project) {
            return Err(CollaboratorError::Rejected(format!(
                "build {} exited with code 1",
                request.project
            )));
        }
        self.builds.lock().unwrap().push(request.project.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingSourceProvider / MemorySecretStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingSourceProvider {
    fetches: Mutex<Vec<(SourceFetchRequest, String)>>,
}

impl RecordingSourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received with the token each was made with.
    pub fn fetches(&self) -> Vec<(SourceFetchRequest, String)> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceProvider for RecordingSourceProvider {
    async fn fetch(&self, request: &SourceFetchRequest, token: &str) -> CollaboratorResult<String> {
        let mut fetches = self.fetches.lock().unwrap();
        fetches.push((request.clone(), token.to_string()));
        Ok(format!("{}@{}", request.branch, fetches.len()))
    }
}

#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        self.secrets.lock().unwrap().insert(name.into(), value.into());
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get_secret(&self, name: &str) -> Option<String> {
        self.secrets.lock().unwrap().get(name).cloned()
    }
}

// ---------------------------------------------------------------------------
// ScriptedApprovalGate
// ---------------------------------------------------------------------------

/// Approves everything except stages explicitly scripted to reject.
#[derive(Debug, Default)]
pub struct ScriptedApprovalGate {
    rejections: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<ApprovalRequest>>,
}

impl ScriptedApprovalGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_stage(&self, stage: impl Into<String>, reason: impl Into<String>) {
        self.rejections
            .lock()
            .unwrap()
            .insert(stage.into(), reason.into());
    }

    pub fn requests(&self) -> Vec<ApprovalRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApprovalGate for ScriptedApprovalGate {
    async fn request_approval(
        &self,
        request: &ApprovalRequest,
    ) -> CollaboratorResult<ApprovalDecision> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(match self.rejections.lock().unwrap().get(&request.stage) {
            Some(reason) => ApprovalDecision::Rejected {
                reason: reason.clone(),
            },
            None => ApprovalDecision::Approved,
        })
    }
}

// ---------------------------------------------------------------------------
// FakeCollaborators
// ---------------------------------------------------------------------------

/// One of each fake, kept around so callers can inspect them afterwards.
#[derive(Debug, Default, Clone)]
pub struct FakeCollaborators {
    pub infrastructure: Arc<RecordingInfrastructure>,
    pub builds: Arc<RecordingBuildRunner>,
    pub source: Arc<RecordingSourceProvider>,
    pub secrets: Arc<MemorySecretStore>,
    pub approvals: Arc<ScriptedApprovalGate>,
}

impl FakeCollaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name, value);
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            infrastructure: self.infrastructure.clone(),
            builds: self.builds.clone(),
            source: self.source.clone(),
            secrets: self.secrets.clone(),
            approvals: self.approvals.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_secret_store_roundtrip() {
        let store = MemorySecretStore::new();
        assert!(store.get_secret("GitHubToken").await.is_none());
        store.insert("GitHubToken", "t0k3n");
        assert_eq!(store.get_secret("GitHubToken").await.as_deref(), Some("t0k3n"));
    }

    #[tokio::test]
    async fn test_approval_gate_scripted_rejection() {
        let gate = ScriptedApprovalGate::new();
        gate.reject_stage("DeployToProd", "change freeze");

        let request = |stage: &str| ApprovalRequest {
            stage: stage.into(),
            action: "Approve".into(),
            message: "ok?".into(),
        };
        assert_eq!(
            gate.request_approval(&request("DeployToStaging")).await.unwrap(),
            ApprovalDecision::Approved
        );
        assert!(matches!(
            gate.request_approval(&request("DeployToProd")).await.unwrap(),
            ApprovalDecision::Rejected { reason } if reason == "change freeze"
        ));
        assert_eq!(gate.requests().len(), 2);
    }
}

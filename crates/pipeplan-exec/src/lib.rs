//! pipeplan executor
//!
//! Reference implementation that realises a compiled [`PipelinePlan`]
//! against a set of collaborators: stages in sequence, run-order groups as
//! barriers, actions within a group concurrently.
//!
//! [`PipelinePlan`]: pipeplan_core::domain::PipelinePlan

pub mod artifacts;
pub mod collaborators;
pub mod error;
pub mod executor;
pub mod fakes;
pub mod report;

pub use artifacts::{ArtifactIndex, ArtifactLocation};
pub use collaborators::{
    ApprovalDecision, ApprovalGate, BuildRunner, Collaborators, InfrastructureProvider,
    SecretStore, SourceProvider,
};
pub use error::{CollaboratorError, CollaboratorResult, ExecError, ExecResult};
pub use executor::PlanExecutor;
pub use fakes::FakeCollaborators;
pub use report::{ActionReport, ActionStatus, ExecutionReport, StageReport, StageStatus};

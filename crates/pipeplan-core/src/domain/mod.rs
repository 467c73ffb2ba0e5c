//! Domain models for pipeplan.
//!
//! Canonical definitions for the core entities:
//! - `Environment`: a named account plus the role that deploys into it
//! - `DeploymentType` / `PipelineLine`: which environments a pipeline promotes through
//! - `Action` / `Stage` / `PipelinePlan`: the compiled topology
//! - `ArtifactRef`: handles to build outputs passed between stages

pub mod action;
pub mod artifact;
pub mod deployment;
pub mod digest;
pub mod environment;
pub mod error;
pub mod plan;
pub mod resource;
pub mod validation;

pub use action::{
    Action, ActionKind, ActionSpec, BuildProject, Capability, CommandPhase, ComputeProfile,
    DeployTarget, SourceRepository, TeardownTarget,
};
pub use artifact::{ArtifactPath, ArtifactRef, ParameterValue};
pub use deployment::{DeploymentType, Hop, PipelineLine, ServiceTags};
pub use environment::{AccountId, Environment, RoleRef};
pub use error::{DomainError, DomainResult};
pub use plan::{PipelinePlan, Placement, Stage};
pub use resource::ResourceGroup;
pub use validation::{validate_plan, Violation};

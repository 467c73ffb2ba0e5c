//! pipeplan core library
//!
//! Compiles a compact deployment intent into a complete, ordered,
//! cross-account pipeline plan and derives the access policy set for the
//! shared artifact store.

pub mod compiler;
pub mod config;
pub mod domain;
pub mod error;
pub mod obs;
pub mod policy;
pub mod registry;
pub mod request;
pub mod telemetry;

pub use compiler::{compile, CompileError, CompileRequest, CompileResult, Naming};

pub use config::{ConfigError, ConfigOverrides, ConfigResult, PipelineConfig};

pub use domain::{
    AccountId, Action, ActionKind, ActionSpec, ArtifactRef, DeployTarget, DeploymentType,
    DomainError, Environment, ParameterValue, PipelineLine, PipelinePlan, Placement,
    ResourceGroup, RoleRef, ServiceTags, SourceRepository, Stage, TeardownTarget, Violation,
};

pub use error::{PipeplanError, Result};

pub use policy::{
    build_policies, evaluate_access, AccessPolicy, AccessRequest, AccessVerdict, PolicyBuilder,
    PolicyError, PolicySet,
};

pub use registry::{AccountRegistry, EnvironmentConfig, RegistryConfig, RegistryError};

pub use request::{CollaboratorRequest, RequestError};

pub use telemetry::init_tracing;

//! Pipeline actions and their kind-specific payloads.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use super::artifact::{ArtifactPath, ArtifactRef, ParameterValue};
use super::environment::{Environment, RoleRef};
use super::error::DomainError;
use super::resource::ResourceGroup;

/// Discriminant of an [`Action`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Source,
    Build,
    Deploy,
    Teardown,
    ManualApproval,
}

impl ActionKind {
    /// Deploy and Teardown act on exactly one environment; the rest on none.
    pub fn requires_target(&self) -> bool {
        matches!(self, ActionKind::Deploy | ActionKind::Teardown)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::Source => "source",
            ActionKind::Build => "build",
            ActionKind::Deploy => "deploy",
            ActionKind::Teardown => "teardown",
            ActionKind::ManualApproval => "manual_approval",
        };
        f.write_str(s)
    }
}

/// Source repository the pipeline tracks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRepository {
    pub owner: String,
    pub name: String,
}

impl SourceRepository {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

/// Size of the build container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComputeProfile {
    Small,
    #[default]
    Medium,
    Large,
}

impl FromStr for ComputeProfile {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "small" => Ok(ComputeProfile::Small),
            "medium" => Ok(ComputeProfile::Medium),
            "large" => Ok(ComputeProfile::Large),
            other => Err(DomainError::UnknownComputeProfile(other.to_string())),
        }
    }
}

/// A named group of shell commands run by the build runner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandPhase {
    pub name: String,
    pub commands: Vec<String>,
}

/// Build project invoked by a Build action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildProject {
    pub identifier: String,
    pub phases: Vec<CommandPhase>,
    pub compute: ComputeProfile,
}

/// Capabilities acknowledged when provisioning a stack.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    Iam,
    NamedIam,
    AutoExpand,
}

/// What a Deploy action materializes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeployTarget {
    /// Create or update a stack from a synthesized template.
    Stack {
        stack: String,
        template: ArtifactPath,
        capabilities: BTreeSet<Capability>,
    },
    /// Copy an artifact's contents into a bucket.
    BucketPublish { bucket: String, extract: bool },
}

/// What a Teardown action removes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TeardownTarget {
    Stack { stack: String },
    /// Empty a bucket so the owning stack can be deleted.
    BucketEmpty { bucket: String },
}

/// Kind-specific payload of an [`Action`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionSpec {
    Source {
        repository: SourceRepository,
        branch: String,
        /// Secret name the source provider token is stored under.
        credential: String,
    },
    Build {
        project: BuildProject,
    },
    Deploy {
        resource: ResourceGroup,
        target: DeployTarget,
    },
    Teardown {
        resource: ResourceGroup,
        target: TeardownTarget,
    },
    ManualApproval {
        message: String,
    },
}

impl ActionSpec {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionSpec::Source { .. } => ActionKind::Source,
            ActionSpec::Build { .. } => ActionKind::Build,
            ActionSpec::Deploy { .. } => ActionKind::Deploy,
            ActionSpec::Teardown { .. } => ActionKind::Teardown,
            ActionSpec::ManualApproval { .. } => ActionKind::ManualApproval,
        }
    }
}

/// A single step inside a stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Action {
    /// Unique within the owning stage.
    pub name: String,

    /// Environment acted upon; set exactly for Deploy and Teardown.
    pub target: Option<Environment>,

    /// Role the action executes as.
    pub executing_role: RoleRef,

    /// Execution level within the stage, starting at 1.
    pub run_order: u32,

    pub inputs: BTreeSet<ArtifactRef>,
    pub outputs: BTreeSet<ArtifactRef>,

    #[serde(default)]
    pub parameter_overrides: BTreeMap<String, ParameterValue>,

    pub spec: ActionSpec,
}

impl Action {
    /// Start an action with no target, artifacts or overrides.
    pub fn new(
        name: impl Into<String>,
        executing_role: RoleRef,
        run_order: u32,
        spec: ActionSpec,
    ) -> Self {
        Self {
            name: name.into(),
            target: None,
            executing_role,
            run_order,
            inputs: BTreeSet::new(),
            outputs: BTreeSet::new(),
            parameter_overrides: BTreeMap::new(),
            spec,
        }
    }

    /// Bind the action to `environment`, executing as its deployment role.
    pub fn targeting(mut self, environment: &Environment) -> Self {
        self.executing_role = environment.deployment_role.clone();
        self.target = Some(environment.clone());
        self
    }

    pub fn with_input(mut self, artifact: ArtifactRef) -> Self {
        self.inputs.insert(artifact);
        self
    }

    pub fn with_output(mut self, artifact: ArtifactRef) -> Self {
        self.outputs.insert(artifact);
        self
    }

    pub fn with_override(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.parameter_overrides.insert(name.into(), value);
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.spec.kind()
    }
}

//! Requests a plan executor sends to its collaborators.
//!
//! One request per action, derived purely from the action and its stage.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::action::{
    Action, ActionKind, ActionSpec, Capability, CommandPhase, ComputeProfile, DeployTarget,
    TeardownTarget,
};
use crate::domain::artifact::{ArtifactPath, ArtifactRef, ParameterValue};
use crate::domain::environment::{AccountId, RoleRef};

/// Errors raised when an action cannot be expressed as a request.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("action {action} of kind {kind} has no target environment")]
    MissingTarget { action: String, kind: ActionKind },

    #[error("action {action} needs exactly one input artifact, found {found}")]
    AmbiguousInput { action: String, found: usize },

    #[error("action {action} produces no output artifact")]
    MissingOutput { action: String },
}

pub type RequestResult<T> = std::result::Result<T, RequestError>;

/// Create or update a stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackDeployRequest {
    pub stack: String,
    pub template: ArtifactPath,
    pub target_account: AccountId,
    pub executing_role: RoleRef,
    pub parameter_overrides: BTreeMap<String, ParameterValue>,
    pub capabilities: BTreeSet<Capability>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackDeleteRequest {
    pub stack: String,
    pub target_account: AccountId,
    pub executing_role: RoleRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketPublishRequest {
    pub bucket: String,
    pub input_artifact: ArtifactRef,
    pub extract: bool,
    pub target_account: AccountId,
    pub executing_role: RoleRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketEmptyRequest {
    pub bucket: String,
    pub target_account: AccountId,
    pub executing_role: RoleRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildRequest {
    pub project: String,
    pub input_artifact: ArtifactRef,
    pub output_artifacts: BTreeSet<ArtifactRef>,
    pub phases: Vec<CommandPhase>,
    pub compute: ComputeProfile,
    pub executing_role: RoleRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceFetchRequest {
    pub repository_owner: String,
    pub repository_name: String,
    pub branch: String,
    /// Secret name; resolved through the secret store before fetching.
    pub credential: String,
    pub output_artifact: ArtifactRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApprovalRequest {
    pub stage: String,
    pub action: String,
    pub message: String,
}

/// Any request derived from an action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum CollaboratorRequest {
    StackDeploy(StackDeployRequest),
    StackDelete(StackDeleteRequest),
    BucketPublish(BucketPublishRequest),
    BucketEmpty(BucketEmptyRequest),
    Build(BuildRequest),
    SourceFetch(SourceFetchRequest),
    Approval(ApprovalRequest),
}

impl CollaboratorRequest {
    /// Derive the request for `action` running in stage `stage`.
    pub fn for_action(stage: &str, action: &Action) -> RequestResult<Self> {
        let target_account = || {
            action
                .target
                .as_ref()
                .map(|env| env.account_id.clone())
                .ok_or_else(|| RequestError::MissingTarget {
                    action: action.name.clone(),
                    kind: action.kind(),
                })
        };
        let role = action.executing_role.clone();

        let request = match &action.spec {
            ActionSpec::Source {
                repository,
                branch,
                credential,
            } => CollaboratorRequest::SourceFetch(SourceFetchRequest {
                repository_owner: repository.owner.clone(),
                repository_name: repository.name.clone(),
                branch: branch.clone(),
                credential: credential.clone(),
                output_artifact: single_output(action)?,
            }),
            ActionSpec::Build { project } => CollaboratorRequest::Build(BuildRequest {
                project: project.identifier.clone(),
                input_artifact: single_input(action)?,
                output_artifacts: action.outputs.clone(),
                phases: project.phases.clone(),
                compute: project.compute,
                executing_role: role,
            }),
            ActionSpec::Deploy { target, .. } => match target {
                DeployTarget::Stack {
                    stack,
                    template,
                    capabilities,
                } => CollaboratorRequest::StackDeploy(StackDeployRequest {
                    stack: stack.clone(),
                    template: template.clone(),
                    target_account: target_account()?,
                    executing_role: role,
                    parameter_overrides: action.parameter_overrides.clone(),
                    capabilities: capabilities.clone(),
                }),
                DeployTarget::BucketPublish { bucket, extract } => {
                    CollaboratorRequest::BucketPublish(BucketPublishRequest {
                        bucket: bucket.clone(),
                        input_artifact: single_input(action)?,
                        extract: *extract,
                        target_account: target_account()?,
                        executing_role: role,
                    })
                }
            },
            ActionSpec::Teardown { target, .. } => match target {
                TeardownTarget::Stack { stack } => {
                    CollaboratorRequest::StackDelete(StackDeleteRequest {
                        stack: stack.clone(),
                        target_account: target_account()?,
                        executing_role: role,
                    })
                }
                TeardownTarget::BucketEmpty { bucket } => {
                    CollaboratorRequest::BucketEmpty(BucketEmptyRequest {
                        bucket: bucket.clone(),
                        target_account: target_account()?,
                        executing_role: role,
                    })
                }
            },
            ActionSpec::ManualApproval { message } => {
                CollaboratorRequest::Approval(ApprovalRequest {
                    stage: stage.to_string(),
                    action: action.name.clone(),
                    message: message.clone(),
                })
            }
        };
        Ok(request)
    }
}

fn single_input(action: &Action) -> RequestResult<ArtifactRef> {
    let mut inputs = action.inputs.iter();
    match (inputs.next(), inputs.next()) {
        (Some(input), None) => Ok(input.clone()),
        _ => Err(RequestError::AmbiguousInput {
            action: action.name.clone(),
            found: action.inputs.len(),
        }),
    }
}

fn single_output(action: &Action) -> RequestResult<ArtifactRef> {
    action
        .outputs
        .iter()
        .next()
        .cloned()
        .ok_or_else(|| RequestError::MissingOutput {
            action: action.name.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::SourceRepository;
    use crate::domain::environment::Environment;
    use crate::domain::resource::ResourceGroup;

    fn dev() -> Environment {
        Environment::new("dev", AccountId::new("123"))
    }

    fn mgmt_role() -> RoleRef {
        RoleRef::pipeline_automation(&AccountId::new("111"))
    }

    #[test]
    fn test_stack_deploy_request_carries_target_and_overrides() {
        let action = Action::new(
            "DeployDatabase",
            mgmt_role(),
            1,
            ActionSpec::Deploy {
                resource: ResourceGroup::Database,
                target: DeployTarget::Stack {
                    stack: "p-feature-database".into(),
                    template: ArtifactRef::new("TemplatesOutput").at_path("database.template.yaml"),
                    capabilities: BTreeSet::new(),
                },
            },
        )
        .targeting(&dev())
        .with_override("Environment", ParameterValue::literal("dev"));

        match CollaboratorRequest::for_action("DeployToDev", &action).unwrap() {
            CollaboratorRequest::StackDeploy(req) => {
                assert_eq!(req.target_account.as_str(), "123");
                assert_eq!(req.executing_role, dev().deployment_role);
                assert_eq!(req.parameter_overrides.len(), 1);
            }
            other => panic!("expected StackDeploy, got {:?}", other),
        }
    }

    #[test]
    fn test_teardown_without_target_rejected() {
        let action = Action::new(
            "TeardownDatabase",
            mgmt_role(),
            2,
            ActionSpec::Teardown {
                resource: ResourceGroup::Database,
                target: TeardownTarget::Stack {
                    stack: "p-feature-database".into(),
                },
            },
        );
        assert!(matches!(
            CollaboratorRequest::for_action("TeardownDev", &action),
            Err(RequestError::MissingTarget { .. })
        ));
    }

    #[test]
    fn test_source_fetch_request() {
        let action = Action::new(
            "Source",
            mgmt_role(),
            1,
            ActionSpec::Source {
                repository: SourceRepository::new("acme", "app"),
                branch: "master".into(),
                credential: "GitHubToken".into(),
            },
        )
        .with_output(ArtifactRef::new("SourceOutput"));

        match CollaboratorRequest::for_action("Source", &action).unwrap() {
            CollaboratorRequest::SourceFetch(req) => {
                assert_eq!(req.repository_owner, "acme");
                assert_eq!(req.credential, "GitHubToken");
                assert_eq!(req.output_artifact, ArtifactRef::new("SourceOutput"));
            }
            other => panic!("expected SourceFetch, got {:?}", other),
        }
    }

    #[test]
    fn test_approval_request_names_stage() {
        let action = Action::new(
            "Approve",
            mgmt_role(),
            1,
            ActionSpec::ManualApproval {
                message: "Deploy to the ci environment?".into(),
            },
        );
        let req = CollaboratorRequest::for_action("DeployToCi", &action).unwrap();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["request"], "approval");
        assert_eq!(json["stage"], "DeployToCi");
    }
}

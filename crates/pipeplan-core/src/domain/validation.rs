//! Structural validation of compiled pipeline plans.
//!
//! Checks the invariants an executor relies on, independent of how the plan
//! was built:
//! 1. Stages form one linear chain with unique names.
//! 2. `run_order` starts at 1 and action names are unique per stage.
//! 3. Deploy/Teardown actions carry a target and run as its deployment role,
//!    never as the management role; other kinds carry no target.
//! 4. Every artifact has exactly one producer and is only consumed after it
//!    has been produced.
//! 5. Manual approvals only open a stage.

use std::collections::{HashMap, HashSet};

use super::action::ActionKind;
use super::artifact::ArtifactRef;
use super::plan::{Placement, PipelinePlan};

/// A broken structural invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("plan has no stages")]
    EmptyPlan,

    #[error("stage name {stage} is used more than once")]
    DuplicateStage { stage: String },

    #[error("stage {stage} is not placed directly after {expected}")]
    BrokenPlacement { stage: String, expected: String },

    #[error("action {stage}/{action} has run order 0")]
    InvalidRunOrder { stage: String, action: String },

    #[error("action name {action} is used more than once in stage {stage}")]
    DuplicateAction { stage: String, action: String },

    #[error("{kind} action {stage}/{action} has no target environment")]
    MissingTarget {
        stage: String,
        action: String,
        kind: ActionKind,
    },

    #[error("{kind} action {stage}/{action} must not target an environment")]
    UnexpectedTarget {
        stage: String,
        action: String,
        kind: ActionKind,
    },

    #[error("action {stage}/{action} runs as {role}, not as its target's deployment role")]
    RoleMismatch {
        stage: String,
        action: String,
        role: String,
    },

    #[error("action {stage}/{action} deploys into a target with the management role")]
    ManagementRoleOnTarget { stage: String, action: String },

    #[error("manual approval {stage}/{action} is not at run order 1")]
    MisplacedApproval { stage: String, action: String },

    #[error("artifact {artifact} is produced more than once ({first} and {second})")]
    DuplicateProducer {
        artifact: String,
        first: String,
        second: String,
    },

    #[error("actions {first} and {second} run concurrently and both write {artifact}")]
    ConcurrentWrite {
        artifact: String,
        first: String,
        second: String,
    },

    #[error("action {stage}/{action} consumes {artifact}, which nothing produces")]
    DanglingArtifact {
        stage: String,
        action: String,
        artifact: String,
    },

    #[error("action {stage}/{action} consumes {artifact} before {producer} has produced it")]
    PrematureConsumption {
        stage: String,
        action: String,
        artifact: String,
        producer: String,
    },

    #[error("override {parameter} of {stage}/{action} points into {artifact}, which is not an input")]
    UndeclaredOverrideArtifact {
        stage: String,
        action: String,
        parameter: String,
        artifact: String,
    },
}

struct Producer {
    stage_index: usize,
    run_order: u32,
    label: String,
}

/// Validate a [`PipelinePlan`], collecting every violation found.
pub fn validate_plan(plan: &PipelinePlan) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();

    if plan.stages.is_empty() {
        return Err(vec![Violation::EmptyPlan]);
    }

    let mut stage_names = HashSet::new();
    for (i, stage) in plan.stages.iter().enumerate() {
        if !stage_names.insert(stage.name.as_str()) {
            violations.push(Violation::DuplicateStage {
                stage: stage.name.clone(),
            });
        }

        let placed_correctly = match (&stage.placement, i) {
            (Placement::First, 0) => true,
            (Placement::After(previous), i) if i > 0 => *previous == plan.stages[i - 1].name,
            _ => false,
        };
        if !placed_correctly {
            let expected = if i == 0 {
                "the start of the pipeline".to_string()
            } else {
                plan.stages[i - 1].name.clone()
            };
            violations.push(Violation::BrokenPlacement {
                stage: stage.name.clone(),
                expected,
            });
        }
    }

    let management_role = &plan.management.deployment_role;
    let mut producers: HashMap<&ArtifactRef, Producer> = HashMap::new();

    for (i, stage) in plan.stages.iter().enumerate() {
        let mut action_names = HashSet::new();

        for action in &stage.actions {
            let stage_name = || stage.name.clone();
            let action_name = || action.name.clone();

            if !action_names.insert(action.name.as_str()) {
                violations.push(Violation::DuplicateAction {
                    stage: stage_name(),
                    action: action_name(),
                });
            }

            if action.run_order == 0 {
                violations.push(Violation::InvalidRunOrder {
                    stage: stage_name(),
                    action: action_name(),
                });
            }

            let kind = action.kind();
            match (&action.target, kind.requires_target()) {
                (None, true) => violations.push(Violation::MissingTarget {
                    stage: stage_name(),
                    action: action_name(),
                    kind,
                }),
                (Some(_), false) => violations.push(Violation::UnexpectedTarget {
                    stage: stage_name(),
                    action: action_name(),
                    kind,
                }),
                (Some(target), true) => {
                    if action.executing_role != target.deployment_role {
                        violations.push(Violation::RoleMismatch {
                            stage: stage_name(),
                            action: action_name(),
                            role: action.executing_role.to_string(),
                        });
                    }
                    if action.executing_role == *management_role {
                        violations.push(Violation::ManagementRoleOnTarget {
                            stage: stage_name(),
                            action: action_name(),
                        });
                    }
                }
                (None, false) => {}
            }

            if kind == ActionKind::ManualApproval && action.run_order != 1 {
                violations.push(Violation::MisplacedApproval {
                    stage: stage_name(),
                    action: action_name(),
                });
            }

            for (parameter, value) in &action.parameter_overrides {
                if let Some(artifact) = value.referenced_artifact() {
                    if !action.inputs.contains(artifact) {
                        violations.push(Violation::UndeclaredOverrideArtifact {
                            stage: stage_name(),
                            action: action_name(),
                            parameter: parameter.clone(),
                            artifact: artifact.to_string(),
                        });
                    }
                }
            }

            for output in &action.outputs {
                let label = format!("{}/{}", stage.name, action.name);
                if let Some(existing) = producers.get(output) {
                    let artifact = output.to_string();
                    let first = existing.label.clone();
                    // Same stage and level means the two writers race.
                    if existing.stage_index == i && existing.run_order == action.run_order {
                        violations.push(Violation::ConcurrentWrite {
                            artifact,
                            first,
                            second: label,
                        });
                    } else {
                        violations.push(Violation::DuplicateProducer {
                            artifact,
                            first,
                            second: label,
                        });
                    }
                    continue;
                }
                producers.insert(
                    output,
                    Producer {
                        stage_index: i,
                        run_order: action.run_order,
                        label,
                    },
                );
            }
        }
    }

    for (i, stage) in plan.stages.iter().enumerate() {
        for action in &stage.actions {
            for input in &action.inputs {
                match producers.get(input) {
                    None => violations.push(Violation::DanglingArtifact {
                        stage: stage.name.clone(),
                        action: action.name.clone(),
                        artifact: input.to_string(),
                    }),
                    Some(p)
                        if p.stage_index < i
                            || (p.stage_index == i && p.run_order < action.run_order) => {}
                    Some(p) => violations.push(Violation::PrematureConsumption {
                        stage: stage.name.clone(),
                        action: action.name.clone(),
                        artifact: input.to_string(),
                        producer: p.label.clone(),
                    }),
                }
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::{Action, ActionSpec, BuildProject, ComputeProfile};
    use crate::domain::deployment::DeploymentType;
    use crate::domain::environment::{AccountId, Environment, RoleRef};
    use crate::domain::plan::Stage;

    fn mgmt() -> Environment {
        Environment::new("mgmt", AccountId::new("111"))
    }

    fn build(name: &str, run_order: u32) -> Action {
        Action::new(
            name,
            mgmt().deployment_role,
            run_order,
            ActionSpec::Build {
                project: BuildProject {
                    identifier: format!("{}-project", name),
                    phases: vec![],
                    compute: ComputeProfile::Medium,
                },
            },
        )
    }

    fn plan(stages: Vec<Stage>) -> PipelinePlan {
        PipelinePlan {
            pipeline_name: "test-pipeline".into(),
            deployment_type: DeploymentType::Feature,
            source_branch: "main".into(),
            artifact_store: "test-artifacts".into(),
            management: mgmt(),
            stages,
        }
    }

    #[test]
    fn test_empty_plan_rejected() {
        assert_eq!(plan(vec![]).validate(), Err(vec![Violation::EmptyPlan]));
    }

    #[test]
    fn test_same_stage_consumption_needs_smaller_run_order() {
        let a = ArtifactRef::new("A");
        let ok = Stage::new("Build", Placement::First)
            .with_action(build("Produce", 1).with_output(a.clone()))
            .with_action(build("Consume", 2).with_input(a.clone()));
        assert!(plan(vec![ok]).validate().is_ok());

        let same_level = Stage::new("Build", Placement::First)
            .with_action(build("Produce", 1).with_output(a.clone()))
            .with_action(build("Consume", 1).with_input(a));
        let errs = plan(vec![same_level]).validate().unwrap_err();
        assert!(matches!(
            errs.as_slice(),
            [Violation::PrematureConsumption { .. }]
        ));
    }

    #[test]
    fn test_dangling_artifact() {
        let stage = Stage::new("Build", Placement::First)
            .with_action(build("Consume", 1).with_input(ArtifactRef::new("Ghost")));
        let errs = plan(vec![stage]).validate().unwrap_err();
        assert!(errs
            .iter()
            .any(|v| matches!(v, Violation::DanglingArtifact { artifact, .. } if artifact == "Ghost")));
    }

    #[test]
    fn test_concurrent_write_detected() {
        let a = ArtifactRef::new("A");
        let stage = Stage::new("Build", Placement::First)
            .with_action(build("One", 1).with_output(a.clone()))
            .with_action(build("Two", 1).with_output(a));
        let errs = plan(vec![stage]).validate().unwrap_err();
        assert!(matches!(errs.as_slice(), [Violation::ConcurrentWrite { .. }]));
    }

    #[test]
    fn test_broken_placement() {
        let first = Stage::new("Source", Placement::First).with_action(build("One", 1));
        let second =
            Stage::new("Build", Placement::After("Elsewhere".into())).with_action(build("Two", 1));
        let errs = plan(vec![first, second]).validate().unwrap_err();
        assert!(matches!(
            errs.as_slice(),
            [Violation::BrokenPlacement { expected, .. }] if expected == "Source"
        ));
    }

    #[test]
    fn test_build_with_target_rejected() {
        let dev = Environment::new("dev", AccountId::new("123"));
        let mut action = build("Targeted", 1);
        action.target = Some(dev);
        let stage = Stage::new("Build", Placement::First).with_action(action);
        let errs = plan(vec![stage]).validate().unwrap_err();
        assert!(matches!(errs.as_slice(), [Violation::UnexpectedTarget { .. }]));
    }

    #[test]
    fn test_deploy_role_mismatch_rejected() {
        use crate::domain::action::DeployTarget;
        use crate::domain::resource::ResourceGroup;

        let dev = Environment::new("dev", AccountId::new("123"));
        let mut deploy = Action::new(
            "DeployWebsite",
            mgmt().deployment_role,
            1,
            ActionSpec::Deploy {
                resource: ResourceGroup::StaticSite,
                target: DeployTarget::BucketPublish {
                    bucket: "site".into(),
                    extract: true,
                },
            },
        );
        deploy.target = Some(dev);
        let stage = Stage::new("DeployToDev", Placement::First).with_action(deploy);
        let errs = plan(vec![stage]).validate().unwrap_err();
        assert!(errs
            .iter()
            .any(|v| matches!(v, Violation::RoleMismatch { .. })));
        assert!(errs
            .iter()
            .any(|v| matches!(v, Violation::ManagementRoleOnTarget { .. })));
    }

    #[test]
    fn test_misplaced_approval() {
        let approval = Action::new(
            "Approve",
            RoleRef::pipeline_automation(&AccountId::new("111")),
            2,
            ActionSpec::ManualApproval {
                message: "?".into(),
            },
        );
        let stage = Stage::new("Gate", Placement::First).with_action(approval);
        let errs = plan(vec![stage]).validate().unwrap_err();
        assert!(matches!(errs.as_slice(), [Violation::MisplacedApproval { .. }]));
    }
}

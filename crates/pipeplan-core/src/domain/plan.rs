//! Stages and the compiled pipeline plan.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::action::{Action, ActionKind};
use super::deployment::DeploymentType;
use super::digest::compute_digest;
use super::environment::Environment;
use super::error::DomainResult;
use super::validation::{validate_plan, Violation};

/// Where a stage sits in the linear stage chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "stage", rename_all = "snake_case")]
pub enum Placement {
    /// The first stage of the pipeline.
    First,
    /// Directly after the named stage.
    After(String),
}

/// A named group of actions executed as one pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub placement: Placement,
    pub actions: Vec<Action>,
}

impl Stage {
    pub fn new(name: impl Into<String>, placement: Placement) -> Self {
        Self {
            name: name.into(),
            placement,
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Actions grouped by `run_order`, ascending. Actions within a group may
    /// run concurrently; each group is a barrier for the next.
    pub fn run_order_groups(&self) -> Vec<(u32, Vec<&Action>)> {
        let mut groups: BTreeMap<u32, Vec<&Action>> = BTreeMap::new();
        for action in &self.actions {
            groups.entry(action.run_order).or_default().push(action);
        }
        groups.into_iter().collect()
    }

    /// `true` when the stage opens with a manual approval.
    pub fn is_gated(&self) -> bool {
        self.actions
            .iter()
            .any(|a| a.kind() == ActionKind::ManualApproval && a.run_order == 1)
    }

    /// Actions of `kind`, ordered by `run_order` then name.
    pub fn actions_of(&self, kind: ActionKind) -> Vec<&Action> {
        let mut actions: Vec<&Action> = self.actions.iter().filter(|a| a.kind() == kind).collect();
        actions.sort_by(|a, b| a.run_order.cmp(&b.run_order).then(a.name.cmp(&b.name)));
        actions
    }
}

/// A fully-formed, ordered pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelinePlan {
    pub pipeline_name: String,
    pub deployment_type: DeploymentType,
    pub source_branch: String,

    /// Name of the shared artifact store.
    pub artifact_store: String,

    /// Environment the pipeline itself runs in.
    pub management: Environment,

    pub stages: Vec<Stage>,
}

impl PipelinePlan {
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Every action with the index of its stage.
    pub fn actions(&self) -> impl Iterator<Item = (usize, &Action)> {
        self.stages
            .iter()
            .enumerate()
            .flat_map(|(i, stage)| stage.actions.iter().map(move |a| (i, a)))
    }

    pub fn action_count(&self) -> usize {
        self.stages.iter().map(|s| s.actions.len()).sum()
    }

    /// Check every structural invariant of the plan.
    pub fn validate(&self) -> Result<(), Vec<Violation>> {
        validate_plan(self)
    }

    /// SHA-256 digest of the canonical encoding of the plan.
    pub fn digest(&self) -> DomainResult<String> {
        compute_digest(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::ActionSpec;
    use crate::domain::environment::{AccountId, RoleRef};

    fn approval(run_order: u32) -> Action {
        Action::new(
            "Approve",
            RoleRef::pipeline_automation(&AccountId::new("111")),
            run_order,
            ActionSpec::ManualApproval {
                message: "ok?".into(),
            },
        )
    }

    #[test]
    fn test_run_order_groups_are_ascending() {
        let mut second = approval(2);
        second.name = "Second".into();
        let mut third = approval(2);
        third.name = "Third".into();
        let stage = Stage::new("Gate", Placement::First)
            .with_action(second)
            .with_action(approval(1))
            .with_action(third);

        let groups = stage.run_order_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, 1);
        assert_eq!(groups[1].0, 2);
        assert_eq!(groups[1].1.len(), 2);
    }

    #[test]
    fn test_is_gated() {
        let gated = Stage::new("Gate", Placement::First).with_action(approval(1));
        assert!(gated.is_gated());

        let late = Stage::new("Late", Placement::First).with_action(approval(2));
        assert!(!late.is_gated());
    }

    #[test]
    fn test_placement_encoding() {
        let json = serde_json::to_value(Placement::After("Build".into())).unwrap();
        assert_eq!(json["type"], "after");
        assert_eq!(json["stage"], "Build");
    }
}

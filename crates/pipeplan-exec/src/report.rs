//! Execution reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pipeplan_core::domain::{Action, ActionKind, Stage};

/// Outcome of one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionStatus {
    Succeeded,
    Failed { reason: String },
    /// A manual approval was rejected.
    Rejected { reason: String },
    /// Never started because an earlier group or stage failed.
    Skipped,
}

impl ActionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionStatus::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReport {
    pub stage: String,
    pub action: String,
    pub kind: ActionKind,
    pub run_order: u32,
    pub status: ActionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl ActionReport {
    pub fn skipped(stage: &str, action: &Action) -> Self {
        Self {
            stage: stage.to_string(),
            action: action.name.clone(),
            kind: action.kind(),
            run_order: action.run_order,
            status: ActionStatus::Skipped,
            started_at: None,
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub name: String,
    pub status: StageStatus,
    pub actions: Vec<ActionReport>,
}

impl StageReport {
    pub fn skipped(stage: &Stage) -> Self {
        let mut actions: Vec<ActionReport> = stage
            .actions
            .iter()
            .map(|a| ActionReport::skipped(&stage.name, a))
            .collect();
        actions.sort_by_key(|a| a.run_order);
        Self {
            name: stage.name.clone(),
            status: StageStatus::Skipped,
            actions,
        }
    }
}

/// Result of executing a whole plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub execution_id: Uuid,
    pub pipeline_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub stages: Vec<StageReport>,
}

impl ExecutionReport {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn action(&self, stage: &str, action: &str) -> Option<&ActionReport> {
        self.stage(stage)
            .and_then(|s| s.actions.iter().find(|a| a.action == action))
    }

    pub fn actions(&self) -> impl Iterator<Item = &ActionReport> {
        self.stages.iter().flat_map(|s| s.actions.iter())
    }

    pub fn succeeded_count(&self) -> usize {
        self.actions().filter(|a| a.status.is_success()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.actions()
            .filter(|a| a.status == ActionStatus::Skipped)
            .count()
    }

    /// Name of the stage that halted the execution.
    pub fn failed_stage(&self) -> Option<&str> {
        self.stages
            .iter()
            .find(|s| s.status == StageStatus::Failed)
            .map(|s| s.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeplan_core::domain::{AccountId, ActionSpec, Placement, RoleRef};

    #[test]
    fn test_skipped_stage_reports_every_action() {
        let approve = Action::new(
            "Approve",
            RoleRef::pipeline_automation(&AccountId::new("111")),
            1,
            ActionSpec::ManualApproval {
                message: "ok?".into(),
            },
        );
        let stage = Stage::new("DeployToCi", Placement::After("DeployToDev".into()))
            .with_action(approve);
        let report = StageReport::skipped(&stage);
        assert_eq!(report.status, StageStatus::Skipped);
        assert_eq!(report.actions.len(), 1);
        assert_eq!(report.actions[0].status, ActionStatus::Skipped);
        assert!(report.actions[0].started_at.is_none());
    }

    #[test]
    fn test_status_encoding() {
        let json = serde_json::to_value(ActionStatus::Rejected {
            reason: "no".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "rejected");
    }
}

//! Barrier-ordered plan execution.
//!
//! Stages run strictly in sequence. Inside a stage, actions sharing a run
//! order are dispatched together and awaited as a group; the next group
//! starts only once every action of the current one succeeded. The first
//! failed group halts the execution and everything after it is reported as
//! skipped.

use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pipeplan_core::domain::{Action, PipelinePlan, Stage};
use pipeplan_core::obs::{self, PlanSpan};
use pipeplan_core::request::CollaboratorRequest;

use crate::artifacts::ArtifactIndex;
use crate::collaborators::{ApprovalDecision, Collaborators};
use crate::error::{CollaboratorResult, ExecError, ExecResult};
use crate::report::{ActionReport, ActionStatus, ExecutionReport, StageReport, StageStatus};

/// Drives a compiled plan against a set of collaborators.
pub struct PlanExecutor {
    collaborators: Collaborators,
}

impl PlanExecutor {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// Execute every stage of `plan`.
    ///
    /// Collaborator failures and rejected approvals end up in the report;
    /// only an invalid plan or a missing secret returns `Err`.
    pub async fn execute(&self, plan: &PipelinePlan) -> ExecResult<ExecutionReport> {
        plan.validate().map_err(ExecError::InvalidPlan)?;

        let execution_id = Uuid::new_v4();
        let _span = PlanSpan::enter(&plan.pipeline_name);
        let started_at = Utc::now();
        let start = Instant::now();

        info!(execution_id = %execution_id, stages = plan.stages.len(), "Starting plan execution");

        let mut artifacts = ArtifactIndex::new(
            &plan.artifact_store,
            &plan.pipeline_name,
            &execution_id.to_string(),
        );
        let mut stages = Vec::with_capacity(plan.stages.len());
        let mut halted = false;

        for stage in &plan.stages {
            if halted {
                stages.push(StageReport::skipped(stage));
                continue;
            }

            let report = self.run_stage(stage, &mut artifacts).await?;
            obs::emit_stage_finished(&stage.name, report.status == StageStatus::Succeeded);
            halted = report.status != StageStatus::Succeeded;
            stages.push(report);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let success = !halted;
        obs::emit_execution_finished(&execution_id.to_string(), duration_ms, success);

        Ok(ExecutionReport {
            execution_id,
            pipeline_name: plan.pipeline_name.clone(),
            started_at,
            finished_at: Utc::now(),
            duration_ms,
            success,
            stages,
        })
    }

    async fn run_stage(&self, stage: &Stage, artifacts: &mut ArtifactIndex) -> ExecResult<StageReport> {
        info!(stage = %stage.name, "Executing stage");

        let mut actions = Vec::with_capacity(stage.actions.len());
        let mut failed = false;

        for (run_order, group) in stage.run_order_groups() {
            if failed {
                actions.extend(group.iter().map(|a| ActionReport::skipped(&stage.name, a)));
                continue;
            }

            debug!(stage = %stage.name, run_order, actions = group.len(), "Dispatching group");
            let index: &ArtifactIndex = artifacts;
            let results = join_all(
                group
                    .iter()
                    .map(|action| self.run_action(&stage.name, action, index)),
            )
            .await;

            for (action, result) in group.iter().zip(results) {
                let report = result?;
                if report.status.is_success() {
                    for output in &action.outputs {
                        artifacts.register(output);
                    }
                } else {
                    failed = true;
                }
                actions.push(report);
            }
        }

        let status = if failed {
            warn!(stage = %stage.name, "Stage failed");
            StageStatus::Failed
        } else {
            StageStatus::Succeeded
        };

        Ok(StageReport {
            name: stage.name.clone(),
            status,
            actions,
        })
    }

    async fn run_action(
        &self,
        stage: &str,
        action: &Action,
        artifacts: &ArtifactIndex,
    ) -> ExecResult<ActionReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        let request = CollaboratorRequest::for_action(stage, action)?;
        let status = match self.dispatch(request, artifacts).await? {
            Ok(status) => status,
            Err(e) => ActionStatus::Failed {
                reason: e.to_string(),
            },
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_action_finished(stage, &action.name, status.is_success(), duration_ms);

        Ok(ActionReport {
            stage: stage.to_string(),
            action: action.name.clone(),
            kind: action.kind(),
            run_order: action.run_order,
            status,
            started_at: Some(started_at),
            duration_ms,
        })
    }

    /// Outer error aborts the execution; inner error fails the action.
    async fn dispatch(
        &self,
        request: CollaboratorRequest,
        artifacts: &ArtifactIndex,
    ) -> ExecResult<CollaboratorResult<ActionStatus>> {
        let c = &self.collaborators;
        let succeeded = |r: CollaboratorResult<()>| r.map(|_| ActionStatus::Succeeded);

        let outcome = match request {
            CollaboratorRequest::SourceFetch(req) => {
                let token = c
                    .secrets
                    .get_secret(&req.credential)
                    .await
                    .ok_or_else(|| ExecError::SecretNotFound {
                        name: req.credential.clone(),
                    })?;
                c.source.fetch(&req, &token).await.map(|revision| {
                    debug!(revision = %revision, "Fetched source");
                    ActionStatus::Succeeded
                })
            }
            CollaboratorRequest::Build(req) => match artifacts.location(&req.input_artifact) {
                Ok(input) => succeeded(c.builds.run_build(&req, input).await),
                Err(e) => Err(e),
            },
            CollaboratorRequest::StackDeploy(req) => {
                match artifacts.resolve_overrides(&req.parameter_overrides) {
                    Ok(parameters) => {
                        succeeded(c.infrastructure.deploy_stack(&req, &parameters).await)
                    }
                    Err(e) => Err(e),
                }
            }
            CollaboratorRequest::StackDelete(req) => {
                succeeded(c.infrastructure.delete_stack(&req).await)
            }
            CollaboratorRequest::BucketPublish(req) => {
                match artifacts.location(&req.input_artifact) {
                    Ok(source) => succeeded(c.infrastructure.publish_bucket(&req, source).await),
                    Err(e) => Err(e),
                }
            }
            CollaboratorRequest::BucketEmpty(req) => {
                succeeded(c.infrastructure.empty_bucket(&req).await)
            }
            CollaboratorRequest::Approval(req) => {
                c.approvals
                    .request_approval(&req)
                    .await
                    .map(|decision| match decision {
                        ApprovalDecision::Approved => ActionStatus::Succeeded,
                        ApprovalDecision::Rejected { reason } => {
                            warn!(stage = %req.stage, reason = %reason, "Approval rejected");
                            ActionStatus::Rejected { reason }
                        }
                    })
            }
        };
        Ok(outcome)
    }
}

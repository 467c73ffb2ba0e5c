//! Structured observability hooks for compilation and execution.
//!
//! This module provides:
//! - A pipeline-scoped tracing span via the `PlanSpan` RAII guard
//! - Emission functions for lifecycle events: plan compiled, policies built,
//!   action and stage finished, execution finished
//!
//! Events are emitted at `info!` level; failures at `warn!`.

use tracing::{info, warn};

use crate::domain::plan::PipelinePlan;

/// RAII guard that enters a pipeline-scoped span.
///
/// ```ignore
/// let _span = PlanSpan::enter("ghostrider-feature-deployment-pipeline");
/// ```
pub struct PlanSpan {
    _span: tracing::span::EnteredSpan,
}

impl PlanSpan {
    pub fn enter(pipeline_name: &str) -> Self {
        let span = tracing::info_span!("pipeplan.pipeline", pipeline = %pipeline_name);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: plan compiled, with shape and digest.
pub fn emit_plan_compiled(plan: &PipelinePlan, digest: &str) {
    info!(
        event = "plan.compiled",
        pipeline = %plan.pipeline_name,
        deployment_type = %plan.deployment_type,
        stages = plan.stages.len(),
        actions = plan.action_count(),
        digest = %digest,
    );
}

/// Emit event: artifact store policy set built.
pub fn emit_policies_built(artifact_store: &str, statements: usize, accounts: usize) {
    info!(
        event = "policies.built",
        artifact_store = %artifact_store,
        statements = statements,
        accounts = accounts,
    );
}

/// Emit event: an action finished, successfully or not.
pub fn emit_action_finished(stage: &str, action: &str, success: bool, duration_ms: u64) {
    if success {
        info!(
            event = "action.finished",
            stage = %stage,
            action = %action,
            duration_ms = duration_ms,
            success = true,
        );
    } else {
        warn!(
            event = "action.finished",
            stage = %stage,
            action = %action,
            duration_ms = duration_ms,
            success = false,
        );
    }
}

/// Emit event: a stage finished.
pub fn emit_stage_finished(stage: &str, success: bool) {
    info!(event = "stage.finished", stage = %stage, success = success);
}

/// Emit event: a whole plan execution finished.
pub fn emit_execution_finished(execution_id: &str, duration_ms: u64, success: bool) {
    info!(
        event = "execution.finished",
        execution_id = %execution_id,
        duration_ms = duration_ms,
        success = success,
    );
}

//! Stage emitters. Each returns one fully-formed [`Stage`].

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::domain::action::{
    Action, ActionSpec, Capability, DeployTarget, SourceRepository, TeardownTarget,
};
use crate::domain::artifact::{ArtifactRef, ParameterValue};
use crate::domain::deployment::{DeploymentType, ServiceTags};
use crate::domain::environment::Environment;
use crate::domain::plan::{Placement, Stage};
use crate::domain::resource::ResourceGroup;

use super::build::{artifacts, BuildStep};
use super::naming::Naming;

pub const SOURCE_STAGE: &str = "Source";
pub const BUILD_STAGE: &str = "Build";
pub const APPROVE_ACTION: &str = "Approve";

pub fn deploy_stage_name(environment: &Environment) -> String {
    format!("DeployTo{}", environment.title())
}

pub fn teardown_stage_name(environment: &Environment) -> String {
    format!("Teardown{}", environment.title())
}

/// Everything stage emission reads; fixed for one compilation.
pub(crate) struct StageContext<'a> {
    pub naming: &'a Naming,
    pub deployment_type: DeploymentType,
    pub prefix: &'a str,
    pub branch: &'a str,
    pub repository: &'a SourceRepository,
    pub credential: &'a str,
    pub service_tags: &'a ServiceTags,
    pub management: &'a Environment,
    pub levels: &'a BTreeMap<ResourceGroup, u32>,
}

impl StageContext<'_> {
    fn max_level(&self) -> u32 {
        self.levels.values().copied().max().unwrap_or(0)
    }

    /// Groups ordered by level, then declaration order.
    fn groups(&self) -> Vec<(ResourceGroup, u32)> {
        let mut groups: Vec<_> = self.levels.iter().map(|(g, l)| (*g, *l)).collect();
        groups.sort_by_key(|(g, l)| (*l, *g));
        groups
    }

    fn approval(&self, message: String) -> Action {
        Action::new(
            APPROVE_ACTION,
            self.management.deployment_role.clone(),
            1,
            ActionSpec::ManualApproval { message },
        )
    }

    /// Overrides every Deploy action pins.
    fn base_overrides(&self, action: Action, environment: &Environment) -> Action {
        action
            .with_override("Environment", ParameterValue::literal(&environment.short_name))
            .with_override("UniquePrefix", ParameterValue::literal(self.prefix))
            .with_override(
                "Deployment",
                ParameterValue::literal(self.deployment_type.as_str()),
            )
            .with_override(
                "ServiceCode",
                ParameterValue::literal(&self.service_tags.service_code),
            )
            .with_override(
                "ServiceName",
                ParameterValue::literal(&self.service_tags.service_name),
            )
            .with_override(
                "ServiceOwner",
                ParameterValue::literal(&self.service_tags.service_owner),
            )
    }
}

pub(crate) fn source_stage(ctx: &StageContext<'_>) -> Stage {
    let action = Action::new(
        SOURCE_STAGE,
        ctx.management.deployment_role.clone(),
        1,
        ActionSpec::Source {
            repository: ctx.repository.clone(),
            branch: ctx.branch.to_string(),
            credential: ctx.credential.to_string(),
        },
    )
    .with_output(ArtifactRef::new(artifacts::SOURCE_OUTPUT));

    Stage::new(SOURCE_STAGE, Placement::First).with_action(action)
}

pub(crate) fn build_stage(ctx: &StageContext<'_>, after: &str) -> Stage {
    BuildStep::ALL
        .iter()
        .fold(
            Stage::new(BUILD_STAGE, Placement::After(after.to_string())),
            |stage, step| {
                let action = Action::new(
                    step.action_name(),
                    ctx.management.deployment_role.clone(),
                    1,
                    ActionSpec::Build {
                        project: step.project(ctx.naming),
                    },
                )
                .with_input(ArtifactRef::new(artifacts::SOURCE_OUTPUT))
                .with_output(step.output());
                stage.with_action(action)
            },
        )
}

pub(crate) fn deploy_stage(
    ctx: &StageContext<'_>,
    environment: &Environment,
    gated: bool,
    after: &str,
) -> Stage {
    let name = deploy_stage_name(environment);
    let mut stage = Stage::new(&name, Placement::After(after.to_string()));

    if gated {
        stage = stage.with_action(ctx.approval(format!(
            "Deploy to the {} environment?",
            environment.name
        )));
    }

    let base = if gated { 2 } else { 1 };
    for (group, level) in ctx.groups() {
        stage = stage.with_action(deploy_action(ctx, environment, group, base + level));
    }

    debug!(stage = %name, gated, actions = stage.actions.len(), "emitted deploy stage");
    stage
}

pub(crate) fn teardown_stage(ctx: &StageContext<'_>, environment: &Environment, after: &str) -> Stage {
    let name = teardown_stage_name(environment);
    let mut stage = Stage::new(&name, Placement::After(after.to_string())).with_action(
        ctx.approval(format!("Teardown the {} environment?", environment.name)),
    );

    let max_level = ctx.max_level();
    for (group, level) in ctx.groups().into_iter().rev() {
        let run_order = 2 + (max_level - level);
        stage = stage.with_action(teardown_action(ctx, environment, group, run_order));
    }

    debug!(stage = %name, actions = stage.actions.len(), "emitted teardown stage");
    stage
}

fn deploy_action(
    ctx: &StageContext<'_>,
    environment: &Environment,
    group: ResourceGroup,
    run_order: u32,
) -> Action {
    let templates = ArtifactRef::new(artifacts::TEMPLATES_OUTPUT);
    let target = match (group.stack_suffix(), group.template_file()) {
        (Some(suffix), Some(file)) => DeployTarget::Stack {
            stack: ctx.naming.stack(suffix),
            template: templates.at_path(file),
            capabilities: capabilities_for(group),
        },
        _ => DeployTarget::BucketPublish {
            bucket: ctx.naming.website_bucket(environment),
            extract: true,
        },
    };

    let spec = ActionSpec::Deploy {
        resource: group,
        target,
    };
    let action = Action::new(
        group.deploy_action_name(),
        environment.deployment_role.clone(),
        run_order,
        spec,
    )
    .targeting(environment);
    let action = ctx.base_overrides(action, environment);

    match group {
        ResourceGroup::Database => action.with_input(templates),
        ResourceGroup::ApiLayer => {
            let lambda = ArtifactRef::new(artifacts::LAMBDA_BUILD_OUTPUT);
            action
                .with_input(templates)
                .with_input(lambda.clone())
                .with_override(
                    "SourceBucketName",
                    ParameterValue::ArtifactBucket {
                        artifact: lambda.clone(),
                    },
                )
                .with_override(
                    "SourceObjectKey",
                    ParameterValue::ArtifactObjectKey { artifact: lambda },
                )
        }
        ResourceGroup::Client => action
            .with_input(templates)
            .with_override(
                "BucketName",
                ParameterValue::literal(ctx.naming.website_bucket(environment)),
            )
            .with_override(
                "AccountId",
                ParameterValue::literal(environment.account_id.as_str()),
            )
            .with_override(
                "StackAccount",
                ParameterValue::literal(ctx.management.account_id.as_str()),
            ),
        ResourceGroup::StaticSite => {
            action.with_input(ArtifactRef::new(artifacts::WEBSITE_BUILD_OUTPUT))
        }
    }
}

fn teardown_action(
    ctx: &StageContext<'_>,
    environment: &Environment,
    group: ResourceGroup,
    run_order: u32,
) -> Action {
    let target = match group.stack_suffix() {
        Some(suffix) => TeardownTarget::Stack {
            stack: ctx.naming.stack(suffix),
        },
        None => TeardownTarget::BucketEmpty {
            bucket: ctx.naming.website_bucket(environment),
        },
    };

    Action::new(
        group.teardown_action_name(),
        environment.deployment_role.clone(),
        run_order,
        ActionSpec::Teardown {
            resource: group,
            target,
        },
    )
    .targeting(environment)
}

fn capabilities_for(group: ResourceGroup) -> BTreeSet<Capability> {
    match group {
        ResourceGroup::ApiLayer => BTreeSet::from([Capability::NamedIam]),
        _ => BTreeSet::new(),
    }
}

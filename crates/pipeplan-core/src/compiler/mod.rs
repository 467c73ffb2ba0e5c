//! Topology compiler: derives a complete, ordered cross-account pipeline
//! from a deployment type, an account registry, a naming prefix and a branch.
//!
//! Compilation is a pure function. The compiler validates its own output and
//! either returns a plan that satisfies every structural invariant or an
//! error; never a partial plan.

pub mod build;
pub mod error;
pub mod levels;
pub mod naming;
pub mod stages;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::domain::action::SourceRepository;
use crate::domain::deployment::{DeploymentType, PipelineLine, ServiceTags};
use crate::domain::environment::Environment;
use crate::domain::plan::PipelinePlan;
use crate::domain::resource::ResourceGroup;
use crate::obs;
use crate::registry::AccountRegistry;

pub use build::{artifacts, BuildStep};
pub use error::{CompileError, CompileResult};
pub use levels::resource_levels;
pub use naming::{
    validate_branch, validate_prefix, validate_region, Naming, MAX_BUCKET_NAME_LEN, MAX_PREFIX_LEN,
};
pub use stages::{deploy_stage_name, teardown_stage_name, APPROVE_ACTION, BUILD_STAGE, SOURCE_STAGE};

use stages::StageContext;

/// Secret name the source provider token is stored under unless configured.
pub const DEFAULT_SOURCE_CREDENTIAL: &str = "GitHubToken";

fn default_credential() -> String {
    DEFAULT_SOURCE_CREDENTIAL.to_string()
}

/// Declarative intent for one pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompileRequest {
    pub deployment_type: DeploymentType,
    pub unique_prefix: String,
    pub source_branch: String,
    pub repository: SourceRepository,

    #[serde(default)]
    pub service_tags: ServiceTags,

    #[serde(default = "default_credential")]
    pub source_credential: String,

    /// Region code appended to every resource name root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl CompileRequest {
    pub fn new(
        deployment_type: DeploymentType,
        unique_prefix: impl Into<String>,
        source_branch: impl Into<String>,
        repository: SourceRepository,
    ) -> Self {
        Self {
            deployment_type,
            unique_prefix: unique_prefix.into(),
            source_branch: source_branch.into(),
            repository,
            service_tags: ServiceTags::default(),
            source_credential: default_credential(),
            region: None,
        }
    }

    pub fn with_service_tags(mut self, tags: ServiceTags) -> Self {
        self.service_tags = tags;
        self
    }

    pub fn with_source_credential(mut self, credential: impl Into<String>) -> Self {
        self.source_credential = credential.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// Compile `request` against `registry` into a validated [`PipelinePlan`].
#[instrument(
    skip_all,
    fields(deployment_type = %request.deployment_type, prefix = %request.unique_prefix)
)]
pub fn compile(request: &CompileRequest, registry: &AccountRegistry) -> CompileResult<PipelinePlan> {
    validate_prefix(&request.unique_prefix)?;
    validate_branch(&request.source_branch)?;
    if let Some(region) = &request.region {
        validate_region(region)?;
    }

    let line = PipelineLine::resolve(request.deployment_type);
    let hops = line
        .hops()
        .iter()
        .map(|hop| {
            registry
                .resolve(hop.environment)
                .map(|env| (hop.gated, env))
                .map_err(|_| CompileError::MissingEnvironment {
                    name: hop.environment.to_string(),
                })
        })
        .collect::<CompileResult<Vec<(bool, &Environment)>>>()?;

    let levels = resource_levels(&ResourceGroup::ALL)?;
    let mut naming = Naming::new(&request.unique_prefix, request.deployment_type);
    if let Some(region) = &request.region {
        naming = naming.with_region(region);
    }
    if let Some(bucket) = naming.oversized_bucket(hops.iter().map(|(_, env)| *env)) {
        return Err(CompileError::InvalidPrefix {
            prefix: request.unique_prefix.clone(),
            reason: format!(
                "derived bucket name {} is longer than {} characters",
                bucket, MAX_BUCKET_NAME_LEN
            ),
        });
    }

    let ctx = StageContext {
        naming: &naming,
        deployment_type: request.deployment_type,
        prefix: &request.unique_prefix,
        branch: &request.source_branch,
        repository: &request.repository,
        credential: &request.source_credential,
        service_tags: &request.service_tags,
        management: registry.management(),
        levels: &levels,
    };

    let mut stages = vec![stages::source_stage(&ctx)];
    stages.push(stages::build_stage(&ctx, SOURCE_STAGE));

    let mut previous = BUILD_STAGE.to_string();
    for (gated, env) in &hops {
        let stage = stages::deploy_stage(&ctx, env, *gated, &previous);
        previous = stage.name.clone();
        stages.push(stage);
    }

    if line.tears_down() {
        for (_, env) in hops.iter().rev() {
            let stage = stages::teardown_stage(&ctx, env, &previous);
            previous = stage.name.clone();
            stages.push(stage);
        }
    }

    let plan = PipelinePlan {
        pipeline_name: naming.pipeline(),
        deployment_type: request.deployment_type,
        source_branch: request.source_branch.clone(),
        artifact_store: naming.artifact_store(),
        management: registry.management().clone(),
        stages,
    };

    if let Err(violations) = plan.validate() {
        for violation in &violations {
            error!(violation = %violation, "compiled plan is structurally invalid");
        }
        return Err(CompileError::Structural { violations });
    }

    match plan.digest() {
        Ok(digest) => obs::emit_plan_compiled(&plan, &digest),
        Err(e) => info!(error = %e, "plan compiled without digest"),
    }

    Ok(plan)
}

//! pipeplan - deployment pipeline topology compiler CLI
//!
//! ## Commands
//!
//! - `compile`: Print the compiled pipeline plan as JSON
//! - `policies`: Print the artifact store access policy set as JSON
//! - `digest`: Print the SHA-256 digest of the compiled plan
//! - `execute --dry-run`: Run the plan against in-memory collaborators
//!
//! Settings come from `--config <file.json>` and/or environment variables
//! (`DEPLOYMENT_TYPE`, `UNIQUE_PREFIX`, `DEV_ACCOUNT`, ...); flags and
//! environment variables win over the file.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use pipeplan_core::config::env_vars;
use pipeplan_core::{
    build_policies, compile, ConfigOverrides, Environment, PipelineConfig, PipelineLine,
    PipelinePlan, PolicySet,
};
use pipeplan_exec::{ExecutionReport, FakeCollaborators, PlanExecutor};

#[derive(Parser)]
#[command(name = "pipeplan")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cross-account deployment pipeline compiler", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Pipeline configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Individual settings, each overriding the configuration file.
#[derive(Args, Debug, Default)]
struct SettingsArgs {
    /// Deployment type: feature or release
    #[arg(long, global = true, env = env_vars::DEPLOYMENT_TYPE)]
    deployment_type: Option<String>,

    /// Prefix every resource name starts with
    #[arg(long, global = true, env = env_vars::UNIQUE_PREFIX)]
    unique_prefix: Option<String>,

    /// Branch the source stage tracks
    #[arg(long, global = true, env = env_vars::SOURCE_BRANCH)]
    source_branch: Option<String>,

    #[arg(long, global = true, env = env_vars::REPOSITORY_OWNER)]
    repository_owner: Option<String>,

    #[arg(long, global = true, env = env_vars::REPOSITORY_NAME)]
    repository_name: Option<String>,

    #[arg(long, global = true, env = env_vars::SERVICE_CODE)]
    service_code: Option<String>,

    #[arg(long, global = true, env = env_vars::SERVICE_NAME)]
    service_name: Option<String>,

    #[arg(long, global = true, env = env_vars::SERVICE_OWNER)]
    service_owner: Option<String>,

    /// Management (pipeline) account id
    #[arg(long, global = true, env = env_vars::MGMT_ACCOUNT)]
    mgmt_account: Option<String>,

    #[arg(long, global = true, env = env_vars::DEV_ACCOUNT)]
    dev_account: Option<String>,

    #[arg(long, global = true, env = env_vars::CI_ACCOUNT)]
    ci_account: Option<String>,

    /// Defaults to the CI account
    #[arg(long, global = true, env = env_vars::STAGING_ACCOUNT)]
    staging_account: Option<String>,

    #[arg(long, global = true, env = env_vars::PROD_ACCOUNT)]
    prod_account: Option<String>,

    /// Region appended to every derived resource name
    #[arg(long, global = true, env = env_vars::REGION)]
    region: Option<String>,
}

impl From<SettingsArgs> for ConfigOverrides {
    fn from(args: SettingsArgs) -> Self {
        ConfigOverrides {
            deployment_type: args.deployment_type,
            unique_prefix: args.unique_prefix,
            source_branch: args.source_branch,
            repository_owner: args.repository_owner,
            repository_name: args.repository_name,
            service_code: args.service_code,
            service_name: args.service_name,
            service_owner: args.service_owner,
            mgmt_account: args.mgmt_account,
            dev_account: args.dev_account,
            ci_account: args.ci_account,
            staging_account: args.staging_account,
            prod_account: args.prod_account,
            region: args.region,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the pipeline plan and print it as JSON
    Compile {
        /// Write the plan to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build the artifact store access policies and print them as JSON
    Policies,

    /// Print the digest of the compiled plan
    Digest,

    /// Execute the compiled plan
    Execute {
        /// Run against in-memory collaborators; nothing is deployed
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    pipeplan_core::init_tracing(cli.json, level);

    let overrides = ConfigOverrides::from(cli.settings);
    let config = load_config(cli.config.as_deref(), &overrides)?;

    match cli.command {
        Commands::Compile { output } => cmd_compile(&config, output.as_deref()),
        Commands::Policies => cmd_policies(&config),
        Commands::Digest => cmd_digest(&config),
        Commands::Execute { dry_run } => cmd_execute(&config, dry_run).await,
    }
}

fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<PipelineConfig> {
    PipelineConfig::load(path, overrides).with_context(|| match path {
        Some(p) => format!("Failed to load pipeline configuration from {:?}", p),
        None => "Failed to load pipeline configuration from the environment".to_string(),
    })
}

fn compile_plan(config: &PipelineConfig) -> Result<PipelinePlan> {
    let registry = config
        .registry()
        .context("Invalid account configuration")?;
    let plan = compile(&config.compile_request(), &registry).context("Failed to compile plan")?;
    Ok(plan)
}

/// Target environments of the deployment type's promotion line.
fn deploy_environments(config: &PipelineConfig) -> Result<Vec<Environment>> {
    let registry = config
        .registry()
        .context("Invalid account configuration")?;
    PipelineLine::resolve(config.deployment_type)
        .hops()
        .iter()
        .map(|hop| {
            registry
                .resolve(hop.environment)
                .cloned()
                .with_context(|| format!("Environment '{}' is not configured", hop.environment))
        })
        .collect()
}

fn policy_set(config: &PipelineConfig) -> Result<PolicySet> {
    let plan = compile_plan(config)?;
    let environments = deploy_environments(config)?;
    let registry = config.registry()?;
    let policies = build_policies(
        &plan.artifact_store,
        &environments,
        &registry.management().account_id,
    )
    .context("Failed to build artifact store policies")?;
    Ok(policies)
}

// ========== Commands ==========

fn cmd_compile(config: &PipelineConfig, output: Option<&Path>) -> Result<()> {
    let plan = compile_plan(config)?;
    let json = serde_json::to_string_pretty(&plan)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write plan to {:?}", path))?;
            info!(
                pipeline = %plan.pipeline_name,
                stages = plan.stages.len(),
                "Wrote plan to {:?}",
                path
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn cmd_policies(config: &PipelineConfig) -> Result<()> {
    let policies = policy_set(config)?;
    println!("{}", serde_json::to_string_pretty(&policies)?);
    Ok(())
}

fn cmd_digest(config: &PipelineConfig) -> Result<()> {
    let plan = compile_plan(config)?;
    let digest = plan.digest().context("Failed to compute plan digest")?;
    println!("{}", digest);
    Ok(())
}

async fn dry_run(config: &PipelineConfig) -> Result<ExecutionReport> {
    let plan = compile_plan(config)?;
    let fakes = FakeCollaborators::new().with_secret(&config.source_credential, "dry-run");
    let report = PlanExecutor::new(fakes.collaborators())
        .execute(&plan)
        .await
        .context("Dry run aborted")?;
    Ok(report)
}

async fn cmd_execute(config: &PipelineConfig, dry_run_only: bool) -> Result<()> {
    if !dry_run_only {
        bail!("Only --dry-run is supported; wire real collaborators through pipeplan-exec");
    }

    let report = dry_run(config).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.success {
        bail!(
            "Dry run failed at stage {}",
            report.failed_stage().unwrap_or("<unknown>")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeplan_core::policy::sids;
    use pipeplan_core::DeploymentType;
    use std::io::Write;

    const CONFIG: &str = r#"{
        "deployment_type": "feature",
        "unique_prefix": "ghostrider",
        "source_branch": "master",
        "repository": { "owner": "acme", "name": "ghostrider" },
        "service_tags": {
            "service_code": "GR",
            "service_name": "ghostrider",
            "service_owner": "platform"
        },
        "accounts": {
            "management": { "name": "mgmt", "account_id": "111" },
            "environments": [
                { "name": "dev", "account_id": "123" },
                { "name": "ci", "account_id": "456" }
            ]
        }
    }"#;

    fn config_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_settings_override_file() {
        let file = config_file();
        let settings = SettingsArgs {
            deployment_type: Some("release".into()),
            staging_account: Some("654".into()),
            prod_account: Some("789".into()),
            ..Default::default()
        };
        let config = load_config(Some(file.path()), &settings.into()).unwrap();
        assert_eq!(config.deployment_type, DeploymentType::Release);

        let plan = compile_plan(&config).unwrap();
        assert_eq!(
            plan.stage_names(),
            vec!["Source", "Build", "DeployToStaging", "DeployToProd"]
        );
    }

    #[test]
    fn test_region_setting_roots_artifact_store() {
        let file = config_file();
        let settings = SettingsArgs {
            region: Some("eu-west-1".into()),
            ..Default::default()
        };
        let config = load_config(Some(file.path()), &settings.into()).unwrap();
        let policies = policy_set(&config).unwrap();
        assert_eq!(
            policies.artifact_store,
            "ghostrider-feature-eu-west-1-artifact-bucket"
        );

        let settings = SettingsArgs {
            region: Some("Europe".into()),
            ..Default::default()
        };
        let config = load_config(Some(file.path()), &settings.into()).unwrap();
        assert!(compile_plan(&config).is_err());
    }

    #[test]
    fn test_compile_writes_plan_file() {
        let file = config_file();
        let config = load_config(Some(file.path()), &ConfigOverrides::default()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("plan.json");
        cmd_compile(&config, Some(&out)).unwrap();

        let written: PipelinePlan =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written, compile_plan(&config).unwrap());
        assert_eq!(written.pipeline_name, "ghostrider-feature-deployment-pipeline");
    }

    #[test]
    fn test_policies_cover_line_accounts() {
        let file = config_file();
        let config = load_config(Some(file.path()), &ConfigOverrides::default()).unwrap();

        let policies = policy_set(&config).unwrap();
        assert_eq!(policies.artifact_store, "ghostrider-feature-artifact-bucket");
        let accounts = policies.statement(sids::ACCOUNTS_READ).unwrap();
        let rendered: Vec<String> = accounts.principals.iter().map(|p| p.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["account:111", "account:123", "account:456"]
        );
    }

    #[test]
    fn test_missing_line_environment_is_reported() {
        let file = config_file();
        let settings = SettingsArgs {
            deployment_type: Some("release".into()),
            ..Default::default()
        };
        // No prod account anywhere.
        let config = load_config(Some(file.path()), &settings.into()).unwrap();
        assert!(compile_plan(&config).is_err());
        assert!(deploy_environments(&config).is_err());
    }

    #[test]
    fn test_missing_configuration() {
        let err = load_config(None, &ConfigOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("environment"));
    }

    #[tokio::test]
    async fn test_dry_run_succeeds() {
        let file = config_file();
        let config = load_config(Some(file.path()), &ConfigOverrides::default()).unwrap();

        let report = dry_run(&config).await.unwrap();
        assert!(report.success);
        assert_eq!(report.stages.len(), 6);
        assert_eq!(report.skipped_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_requires_dry_run() {
        let file = config_file();
        let config = load_config(Some(file.path()), &ConfigOverrides::default()).unwrap();
        assert!(cmd_execute(&config, false).await.is_err());
    }
}

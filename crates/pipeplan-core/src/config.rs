//! Pipeline configuration: a JSON file, environment-style overrides, or both.
//!
//! Overrides win over file values field by field. Without a file every
//! required field must come from overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::compiler::{CompileRequest, DEFAULT_SOURCE_CREDENTIAL};
use crate::domain::action::SourceRepository;
use crate::domain::deployment::{DeploymentType, ServiceTags};
use crate::domain::environment::names;
use crate::registry::{AccountRegistry, EnvironmentConfig, RegistryConfig, RegistryResult};

/// Environment variable names read by the binaries.
pub mod env_vars {
    pub const DEPLOYMENT_TYPE: &str = "DEPLOYMENT_TYPE";
    pub const UNIQUE_PREFIX: &str = "UNIQUE_PREFIX";
    pub const SOURCE_BRANCH: &str = "SOURCE_BRANCH";
    pub const REPOSITORY_OWNER: &str = "REPOSITORY_OWNER";
    pub const REPOSITORY_NAME: &str = "REPOSITORY_NAME";
    pub const SERVICE_CODE: &str = "SERVICE_CODE";
    pub const SERVICE_NAME: &str = "SERVICE_NAME";
    pub const SERVICE_OWNER: &str = "SERVICE_OWNER";
    pub const MGMT_ACCOUNT: &str = "MGMT_ACCOUNT";
    pub const DEV_ACCOUNT: &str = "DEV_ACCOUNT";
    pub const CI_ACCOUNT: &str = "CI_ACCOUNT";
    pub const STAGING_ACCOUNT: &str = "STAGING_ACCOUNT";
    pub const PROD_ACCOUNT: &str = "PROD_ACCOUNT";
    pub const REGION: &str = "AWS_REGION";
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("missing required setting: {field}")]
    Missing { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

fn default_credential() -> String {
    DEFAULT_SOURCE_CREDENTIAL.to_string()
}

/// Everything needed to compile one pipeline and build its policies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    pub deployment_type: DeploymentType,
    pub unique_prefix: String,
    pub source_branch: String,
    pub repository: SourceRepository,

    #[serde(default)]
    pub service_tags: ServiceTags,

    #[serde(default = "default_credential")]
    pub source_credential: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    pub accounts: RegistryConfig,
}

/// Flat, optional settings as read from the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub deployment_type: Option<String>,
    pub unique_prefix: Option<String>,
    pub source_branch: Option<String>,
    pub repository_owner: Option<String>,
    pub repository_name: Option<String>,
    pub service_code: Option<String>,
    pub service_name: Option<String>,
    pub service_owner: Option<String>,
    pub mgmt_account: Option<String>,
    pub dev_account: Option<String>,
    pub ci_account: Option<String>,
    pub staging_account: Option<String>,
    pub prod_account: Option<String>,
    pub region: Option<String>,
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Load from an optional file, then apply `overrides` on top.
    pub fn load(file: Option<&Path>, overrides: &ConfigOverrides) -> ConfigResult<Self> {
        match file {
            Some(path) => {
                let mut config = Self::from_file(path)?;
                config.apply(overrides)?;
                Ok(config)
            }
            None => Self::from_overrides(overrides),
        }
    }

    /// Build a configuration purely from overrides.
    pub fn from_overrides(overrides: &ConfigOverrides) -> ConfigResult<Self> {
        let required = |value: &Option<String>, field: &'static str| {
            value.clone().ok_or(ConfigError::Missing { field })
        };

        let deployment_type = parse_deployment_type(&required(
            &overrides.deployment_type,
            env_vars::DEPLOYMENT_TYPE,
        )?)?;
        let mgmt = required(&overrides.mgmt_account, env_vars::MGMT_ACCOUNT)?;

        Ok(Self {
            deployment_type,
            unique_prefix: required(&overrides.unique_prefix, env_vars::UNIQUE_PREFIX)?,
            source_branch: required(&overrides.source_branch, env_vars::SOURCE_BRANCH)?,
            repository: SourceRepository::new(
                required(&overrides.repository_owner, env_vars::REPOSITORY_OWNER)?,
                required(&overrides.repository_name, env_vars::REPOSITORY_NAME)?,
            ),
            service_tags: ServiceTags {
                service_code: overrides.service_code.clone().unwrap_or_default(),
                service_name: overrides.service_name.clone().unwrap_or_default(),
                service_owner: overrides.service_owner.clone().unwrap_or_default(),
            },
            source_credential: default_credential(),
            region: overrides.region.clone(),
            accounts: RegistryConfig::from_accounts(
                &mgmt,
                overrides.dev_account.as_deref(),
                overrides.ci_account.as_deref(),
                overrides.staging_account.as_deref(),
                overrides.prod_account.as_deref(),
            ),
        })
    }

    /// Overwrite every field `overrides` sets.
    pub fn apply(&mut self, overrides: &ConfigOverrides) -> ConfigResult<()> {
        if let Some(dt) = &overrides.deployment_type {
            self.deployment_type = parse_deployment_type(dt)?;
        }
        set_if(&mut self.unique_prefix, &overrides.unique_prefix);
        set_if(&mut self.source_branch, &overrides.source_branch);
        set_if(&mut self.repository.owner, &overrides.repository_owner);
        set_if(&mut self.repository.name, &overrides.repository_name);
        set_if(&mut self.service_tags.service_code, &overrides.service_code);
        set_if(&mut self.service_tags.service_name, &overrides.service_name);
        set_if(&mut self.service_tags.service_owner, &overrides.service_owner);
        if overrides.region.is_some() {
            self.region = overrides.region.clone();
        }

        if let Some(mgmt) = &overrides.mgmt_account {
            self.accounts.management.account_id = mgmt.clone();
        }
        for (name, account) in [
            (names::DEV, &overrides.dev_account),
            (names::CI, &overrides.ci_account),
            (names::STAGING, &overrides.staging_account),
            (names::PROD, &overrides.prod_account),
        ] {
            if let Some(account) = account {
                self.set_account(name, account);
            }
        }
        Ok(())
    }

    fn set_account(&mut self, name: &str, account: &str) {
        match self.accounts.environments.iter_mut().find(|e| e.name == name) {
            Some(env) => env.account_id = account.to_string(),
            None => self
                .accounts
                .environments
                .push(EnvironmentConfig::new(name, account)),
        }
    }

    pub fn compile_request(&self) -> CompileRequest {
        let request = CompileRequest::new(
            self.deployment_type,
            &self.unique_prefix,
            &self.source_branch,
            self.repository.clone(),
        )
        .with_service_tags(self.service_tags.clone())
        .with_source_credential(&self.source_credential);
        match &self.region {
            Some(region) => request.with_region(region),
            None => request,
        }
    }

    pub fn registry(&self) -> RegistryResult<AccountRegistry> {
        AccountRegistry::from_config(&self.accounts)
    }
}

fn set_if(slot: &mut String, value: &Option<String>) {
    if let Some(v) = value {
        *slot = v.clone();
    }
}

fn parse_deployment_type(raw: &str) -> ConfigResult<DeploymentType> {
    raw.parse().map_err(|e: crate::domain::DomainError| ConfigError::InvalidValue {
        field: env_vars::DEPLOYMENT_TYPE,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn overrides() -> ConfigOverrides {
        ConfigOverrides {
            deployment_type: Some("feature".into()),
            unique_prefix: Some("ghostrider".into()),
            source_branch: Some("master".into()),
            repository_owner: Some("acme".into()),
            repository_name: Some("app".into()),
            mgmt_account: Some("111".into()),
            dev_account: Some("123".into()),
            ci_account: Some("456".into()),
            ..Default::default()
        }
    }

    const FILE: &str = r#"{
        "deployment_type": "release",
        "unique_prefix": "ghostrider",
        "source_branch": "master",
        "repository": { "owner": "acme", "name": "app" },
        "service_tags": { "service_code": "GR", "service_name": "ghostrider", "service_owner": "platform" },
        "accounts": {
            "management": { "name": "mgmt", "account_id": "111" },
            "environments": [
                { "name": "staging", "account_id": "456" },
                { "name": "prod", "account_id": "789" }
            ]
        }
    }"#;

    #[test]
    fn test_from_overrides() {
        let config = PipelineConfig::from_overrides(&overrides()).unwrap();
        assert_eq!(config.deployment_type, DeploymentType::Feature);
        assert_eq!(config.source_credential, DEFAULT_SOURCE_CREDENTIAL);
        let registry = config.registry().unwrap();
        // Staging inherits the CI account.
        assert_eq!(registry.resolve("staging").unwrap().account_id.as_str(), "456");
    }

    #[test]
    fn test_missing_required_setting() {
        let mut partial = overrides();
        partial.unique_prefix = None;
        assert!(matches!(
            PipelineConfig::from_overrides(&partial),
            Err(ConfigError::Missing { field }) if field == env_vars::UNIQUE_PREFIX
        ));
    }

    #[test]
    fn test_invalid_deployment_type() {
        let mut bad = overrides();
        bad.deployment_type = Some("hotfix".into());
        assert!(matches!(
            PipelineConfig::from_overrides(&bad),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_file_with_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FILE.as_bytes()).unwrap();

        let overrides = ConfigOverrides {
            source_branch: Some("release/2".into()),
            prod_account: Some("999".into()),
            ..Default::default()
        };
        let config = PipelineConfig::load(Some(file.path()), &overrides).unwrap();
        assert_eq!(config.deployment_type, DeploymentType::Release);
        assert_eq!(config.source_branch, "release/2");
        assert_eq!(config.service_tags.service_owner, "platform");

        let registry = config.registry().unwrap();
        assert_eq!(registry.resolve("prod").unwrap().account_id.as_str(), "999");

        let request = config.compile_request();
        assert_eq!(request.unique_prefix, "ghostrider");
    }

    #[test]
    fn test_region_flows_into_request() {
        let config = PipelineConfig::from_overrides(&overrides()).unwrap();
        assert_eq!(config.compile_request().region, None);

        let mut with_region = overrides();
        with_region.region = Some("eu-west-1".into());
        let config = PipelineConfig::from_overrides(&with_region).unwrap();
        assert_eq!(config.compile_request().region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(matches!(
            PipelineConfig::from_file(&path),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_malformed_file() {
        assert!(matches!(
            PipelineConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}

//! Account registry: the read-only set of environments a pipeline may use.
//!
//! Built once from [`RegistryConfig`]; compilation and policy building only
//! ever read from it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::environment::{default_short_name, names, AccountId, Environment, RoleRef};

/// Errors produced by registry construction and lookup.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("environment not found: {name}")]
    NotFound { name: String },

    #[error("environment {name} is registered more than once")]
    DuplicateEnvironment { name: String },

    #[error("deploy target {name} shares its {shared} with the management environment")]
    ManagementCollision { name: String, shared: &'static str },

    #[error("environment {name} has a malformed account id: {account_id:?}")]
    InvalidAccountId { name: String, account_id: String },

    #[error("environment name must not be empty")]
    EmptyName,
}

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// One environment as it appears in configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvironmentConfig {
    pub name: String,
    pub account_id: String,

    /// Role ARN; defaults to the account's pipeline automation role.
    #[serde(default)]
    pub deployment_role: Option<String>,

    /// Label for the `Environment` override; defaults from the name.
    #[serde(default)]
    pub short_name: Option<String>,
}

impl EnvironmentConfig {
    pub fn new(name: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            account_id: account_id.into(),
            deployment_role: None,
            short_name: None,
        }
    }

    fn to_environment(&self) -> RegistryResult<Environment> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let account_id = AccountId::new(self.account_id.trim());
        if !account_id.is_well_formed() {
            return Err(RegistryError::InvalidAccountId {
                name: self.name.clone(),
                account_id: self.account_id.clone(),
            });
        }

        let mut env = Environment::new(self.name.trim(), account_id);
        if let Some(role) = &self.deployment_role {
            env = env.with_role(RoleRef::new(role.clone()));
        }
        let short_name = self
            .short_name
            .clone()
            .unwrap_or_else(|| default_short_name(&env.name).to_string());
        Ok(env.with_short_name(short_name))
    }
}

/// Management environment plus every deploy target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryConfig {
    pub management: EnvironmentConfig,
    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,
}

impl RegistryConfig {
    /// Standard topology from bare account ids: `mgmt`, `dev`, `ci`,
    /// `staging`, `prod`. Absent accounts are simply not registered;
    /// staging falls back to the CI account.
    pub fn from_accounts(
        management: &str,
        dev: Option<&str>,
        ci: Option<&str>,
        staging: Option<&str>,
        prod: Option<&str>,
    ) -> Self {
        let staging = staging.or(ci);
        let environments = [
            (names::DEV, dev),
            (names::CI, ci),
            (names::STAGING, staging),
            (names::PROD, prod),
        ]
        .into_iter()
        .filter_map(|(name, account)| account.map(|a| EnvironmentConfig::new(name, a)))
        .collect();

        Self {
            management: EnvironmentConfig::new(names::MGMT, management),
            environments,
        }
    }
}

/// Read-only lookup of environments by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRegistry {
    management: Environment,
    targets: BTreeMap<String, Environment>,
}

impl AccountRegistry {
    /// Build a registry from already-constructed environments.
    pub fn new(
        management: Environment,
        targets: impl IntoIterator<Item = Environment>,
    ) -> RegistryResult<Self> {
        if management.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let mut map = BTreeMap::new();
        for env in targets {
            if env.name.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            let shared = if env.name == management.name {
                Some("name")
            } else if env.account_id == management.account_id {
                Some("account")
            } else if env.deployment_role == management.deployment_role {
                Some("deployment role")
            } else {
                None
            };
            if let Some(shared) = shared {
                return Err(RegistryError::ManagementCollision {
                    name: env.name,
                    shared,
                });
            }
            if map.contains_key(&env.name) {
                return Err(RegistryError::DuplicateEnvironment { name: env.name });
            }
            map.insert(env.name.clone(), env);
        }

        Ok(Self {
            management,
            targets: map,
        })
    }

    pub fn from_config(config: &RegistryConfig) -> RegistryResult<Self> {
        let management = config.management.to_environment()?;
        let targets = config
            .environments
            .iter()
            .map(EnvironmentConfig::to_environment)
            .collect::<RegistryResult<Vec<_>>>()?;
        Self::new(management, targets)
    }

    /// Look up an environment by name; the management environment resolves
    /// under its own name.
    pub fn resolve(&self, name: &str) -> RegistryResult<&Environment> {
        if name == self.management.name {
            return Ok(&self.management);
        }
        self.targets
            .get(name)
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })
    }

    pub fn management(&self) -> &Environment {
        &self.management
    }

    /// Deploy targets, ordered by name.
    pub fn targets(&self) -> impl Iterator<Item = &Environment> {
        self.targets.values()
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RegistryConfig {
        RegistryConfig::from_accounts("111", Some("123"), Some("456"), None, Some("789"))
    }

    #[test]
    fn test_resolve_targets_and_management() {
        let registry = AccountRegistry::from_config(&config()).unwrap();
        assert_eq!(registry.resolve("dev").unwrap().account_id.as_str(), "123");
        assert_eq!(registry.resolve("mgmt").unwrap().account_id.as_str(), "111");
        assert_eq!(registry.management().name, "mgmt");
        assert_eq!(registry.target_count(), 4);
    }

    #[test]
    fn test_staging_falls_back_to_ci_account() {
        let registry = AccountRegistry::from_config(&config()).unwrap();
        let staging = registry.resolve("staging").unwrap();
        assert_eq!(staging.account_id.as_str(), "456");
        assert_eq!(staging.short_name, "stg");
    }

    #[test]
    fn test_missing_environment_is_not_found() {
        let config = RegistryConfig::from_accounts("111", Some("123"), None, None, None);
        let registry = AccountRegistry::from_config(&config).unwrap();
        assert!(matches!(
            registry.resolve("ci"),
            Err(RegistryError::NotFound { name }) if name == "ci"
        ));
    }

    #[test]
    fn test_duplicate_environment_rejected() {
        let mut config = config();
        config.environments.push(EnvironmentConfig::new("dev", "999"));
        assert!(matches!(
            AccountRegistry::from_config(&config),
            Err(RegistryError::DuplicateEnvironment { name }) if name == "dev"
        ));
    }

    #[test]
    fn test_management_collision_rejected() {
        let mut config = config();
        config.environments.push(EnvironmentConfig::new("mgmt", "999"));
        assert!(matches!(
            AccountRegistry::from_config(&config),
            Err(RegistryError::ManagementCollision { shared: "name", .. })
        ));
    }

    #[test]
    fn test_target_in_management_account_rejected() {
        let config = RegistryConfig::from_accounts("111", Some("111"), Some("456"), None, None);
        assert!(matches!(
            AccountRegistry::from_config(&config),
            Err(RegistryError::ManagementCollision { name, shared: "account" }) if name == "dev"
        ));
    }

    #[test]
    fn test_target_with_management_role_rejected() {
        let management = Environment::new("mgmt", AccountId::new("111"));
        let ci = Environment::new("ci", AccountId::new("456"))
            .with_role(management.deployment_role.clone());
        let err = AccountRegistry::new(management, [ci]).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::ManagementCollision { shared: "deployment role", .. }
        ));
        assert!(err.to_string().contains("deployment role"));
    }

    #[test]
    fn test_malformed_account_rejected() {
        let mut config = config();
        config.environments[0].account_id = "12x".into();
        assert!(matches!(
            AccountRegistry::from_config(&config),
            Err(RegistryError::InvalidAccountId { .. })
        ));
    }

    #[test]
    fn test_configured_role_and_short_name_win() {
        let mut config = config();
        config.environments[0].deployment_role = Some("arn:aws:iam::123:role/Deployer".into());
        config.environments[0].short_name = Some("development".into());
        let registry = AccountRegistry::from_config(&config).unwrap();
        let dev = registry.resolve("dev").unwrap();
        assert_eq!(dev.deployment_role.as_str(), "arn:aws:iam::123:role/Deployer");
        assert_eq!(dev.short_name, "development");
    }

    #[test]
    fn test_config_serde_defaults() {
        let json = r#"{ "management": { "name": "mgmt", "account_id": "111" } }"#;
        let config: RegistryConfig = serde_json::from_str(json).unwrap();
        assert!(config.environments.is_empty());
        assert!(config.management.deployment_role.is_none());
    }
}

//! Deployment environments and the identities they carry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role assumed in every account for pipeline automation.
pub const PIPELINE_AUTOMATION_ROLE: &str = "PipelineAutomationRole";

/// Well-known environment names.
pub mod names {
    pub const DEV: &str = "dev";
    pub const CI: &str = "ci";
    pub const STAGING: &str = "staging";
    pub const PROD: &str = "prod";
    pub const MGMT: &str = "mgmt";
}

/// Cloud account identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for a non-empty, all-digit identifier.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to the role an action executes as.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleRef(String);

impl RoleRef {
    pub fn new(arn: impl Into<String>) -> Self {
        Self(arn.into())
    }

    /// The pipeline automation role living in `account`.
    pub fn pipeline_automation(account: &AccountId) -> Self {
        Self(format!(
            "arn:aws:iam::{}:role/{}",
            account, PIPELINE_AUTOMATION_ROLE
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named environment bound to one account and its deployment role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Registry key, e.g. `"dev"` or `"staging"`.
    pub name: String,

    /// Account the environment lives in.
    pub account_id: AccountId,

    /// Role that deploys into this environment.
    pub deployment_role: RoleRef,

    /// Label pinned into the `Environment` parameter override (`"stg"`).
    pub short_name: String,
}

impl Environment {
    /// Create an environment using the account's pipeline automation role
    /// and the default short name.
    pub fn new(name: impl Into<String>, account_id: AccountId) -> Self {
        let name = name.into();
        Self {
            short_name: default_short_name(&name).to_string(),
            deployment_role: RoleRef::pipeline_automation(&account_id),
            name,
            account_id,
        }
    }

    pub fn with_role(mut self, role: RoleRef) -> Self {
        self.deployment_role = role;
        self
    }

    pub fn with_short_name(mut self, short_name: impl Into<String>) -> Self {
        self.short_name = short_name.into();
        self
    }

    /// Name with its first letter upper-cased, used in stage names
    /// (`"ci"` → `"Ci"`).
    pub fn title(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Short label for well-known long names; everything else keeps its name.
pub fn default_short_name(name: &str) -> &str {
    match name {
        "staging" => "stg",
        "production" => "prod",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_automation_role_arn() {
        let role = RoleRef::pipeline_automation(&AccountId::new("123456789012"));
        assert_eq!(
            role.as_str(),
            "arn:aws:iam::123456789012:role/PipelineAutomationRole"
        );
    }

    #[test]
    fn test_environment_defaults() {
        let env = Environment::new("staging", AccountId::new("456"));
        assert_eq!(env.short_name, "stg");
        assert_eq!(
            env.deployment_role,
            RoleRef::pipeline_automation(&AccountId::new("456"))
        );
        assert_eq!(env.title(), "Staging");
    }

    #[test]
    fn test_environment_overrides() {
        let env = Environment::new("ci", AccountId::new("456"))
            .with_role(RoleRef::new("arn:aws:iam::456:role/Custom"))
            .with_short_name("integration");
        assert_eq!(env.deployment_role.as_str(), "arn:aws:iam::456:role/Custom");
        assert_eq!(env.short_name, "integration");
        assert_eq!(env.title(), "Ci");
    }

    #[test]
    fn test_account_id_well_formed() {
        assert!(AccountId::new("123456789012").is_well_formed());
        assert!(AccountId::new("123").is_well_formed());
        assert!(!AccountId::new("").is_well_formed());
        assert!(!AccountId::new("12a4").is_well_formed());
    }

    #[test]
    fn test_account_id_serializes_transparently() {
        let json = serde_json::to_string(&AccountId::new("789")).unwrap();
        assert_eq!(json, "\"789\"");
    }
}

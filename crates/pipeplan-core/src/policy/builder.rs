//! Derives the artifact store policy set from the deploy targets.

use std::collections::BTreeSet;

use crate::domain::environment::{AccountId, Environment};
use crate::obs;

use super::error::{PolicyError, PolicyResult};
use super::statement::{
    context_keys, permissions, AccessPolicy, Condition, ConditionOperator, Effect, PolicySet,
    Principal, ResourceScope, ServicePrincipal,
};

pub mod sids {
    pub const BUILD_RUNNER_READ: &str = "AllowBuildRunnerRead";
    pub const INFRASTRUCTURE_PROVIDER_FULL_ACCESS: &str = "AllowInfrastructureProviderFullAccess";
    pub const ORCHESTRATOR_ARTIFACT_TRANSFER: &str = "AllowOrchestratorArtifactTransfer";
    pub const ACCOUNTS_READ: &str = "AllowAccountsRead";
    pub const DENY_UNENCRYPTED_UPLOADS: &str = "DenyUnencryptedUploads";
    pub const DENY_INSECURE_TRANSPORT: &str = "DenyInsecureTransport";
}

/// Builds the complete statement set for one artifact store.
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    artifact_store: String,
}

impl PolicyBuilder {
    pub fn new(artifact_store: impl Into<String>) -> Self {
        Self {
            artifact_store: artifact_store.into(),
        }
    }

    /// Six statements: four allows scoped by principal, then the two denies
    /// that every caller is subject to.
    pub fn build(
        &self,
        environments: &[Environment],
        management: &AccountId,
    ) -> PolicyResult<PolicySet> {
        if environments.is_empty() {
            return Err(PolicyError::NoEnvironments);
        }
        let store = self.artifact_store.as_str();
        if store.trim().is_empty() {
            return Err(PolicyError::InvalidStoreName(self.artifact_store.clone()));
        }

        let accounts: BTreeSet<AccountId> = std::iter::once(management.clone())
            .chain(environments.iter().map(|env| env.account_id.clone()))
            .collect();

        let mut accounts_read =
            AccessPolicy::new(sids::ACCOUNTS_READ, Effect::Allow, ResourceScope::BucketAndObjects, store)
                .with_actions([
                    permissions::GET_OBJECT,
                    permissions::GET_OBJECT_VERSION,
                    permissions::LIST_BUCKET,
                ]);
        for account in &accounts {
            accounts_read = accounts_read.with_principal(Principal::Account(account.clone()));
        }

        let statements = vec![
            AccessPolicy::new(sids::BUILD_RUNNER_READ, Effect::Allow, ResourceScope::Objects, store)
                .with_principal(Principal::Service(ServicePrincipal::BuildRunner))
                .with_actions([permissions::GET_OBJECT]),
            AccessPolicy::new(
                sids::INFRASTRUCTURE_PROVIDER_FULL_ACCESS,
                Effect::Allow,
                ResourceScope::BucketAndObjects,
                store,
            )
            .with_principal(Principal::Service(ServicePrincipal::InfrastructureProvider))
            .with_actions([permissions::ALL]),
            AccessPolicy::new(
                sids::ORCHESTRATOR_ARTIFACT_TRANSFER,
                Effect::Allow,
                ResourceScope::BucketAndObjects,
                store,
            )
            .with_principal(Principal::Service(ServicePrincipal::PipelineOrchestrator))
            .with_actions([
                permissions::DELETE_OBJECT,
                permissions::GET_OBJECT,
                permissions::GET_OBJECT_VERSION,
                permissions::LIST_BUCKET,
                permissions::PUT_OBJECT,
            ]),
            accounts_read,
            AccessPolicy::new(
                sids::DENY_UNENCRYPTED_UPLOADS,
                Effect::Deny,
                ResourceScope::Objects,
                store,
            )
            .with_principal(Principal::Any)
            .with_actions([permissions::PUT_OBJECT])
            .with_condition(Condition::new(
                ConditionOperator::Null,
                context_keys::SERVER_SIDE_ENCRYPTION,
                "true",
            )),
            AccessPolicy::new(
                sids::DENY_INSECURE_TRANSPORT,
                Effect::Deny,
                ResourceScope::BucketAndObjects,
                store,
            )
            .with_principal(Principal::Any)
            .with_actions([permissions::ALL])
            .with_condition(Condition::new(
                ConditionOperator::Bool,
                context_keys::SECURE_TRANSPORT,
                "false",
            )),
        ];

        obs::emit_policies_built(store, statements.len(), accounts.len());

        Ok(PolicySet {
            artifact_store: self.artifact_store.clone(),
            statements,
        })
    }
}

/// Build the policy set for `artifact_store`.
pub fn build_policies(
    artifact_store: &str,
    environments: &[Environment],
    management: &AccountId,
) -> PolicyResult<PolicySet> {
    PolicyBuilder::new(artifact_store).build(environments, management)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn environments() -> Vec<Environment> {
        vec![
            Environment::new("dev", AccountId::new("123")),
            Environment::new("ci", AccountId::new("456")),
            Environment::new("staging", AccountId::new("456")),
        ]
    }

    #[test]
    fn test_six_statements_in_order() {
        let set = build_policies("store", &environments(), &AccountId::new("111")).unwrap();
        let order: Vec<&str> = set.statements.iter().map(|s| s.sid.as_str()).collect();
        assert_eq!(
            order,
            vec![
                sids::BUILD_RUNNER_READ,
                sids::INFRASTRUCTURE_PROVIDER_FULL_ACCESS,
                sids::ORCHESTRATOR_ARTIFACT_TRANSFER,
                sids::ACCOUNTS_READ,
                sids::DENY_UNENCRYPTED_UPLOADS,
                sids::DENY_INSECURE_TRANSPORT,
            ]
        );
        assert_eq!(set.deny_statements().count(), 2);
    }

    #[test]
    fn test_account_principals_deduplicated_and_sorted() {
        let set = build_policies("store", &environments(), &AccountId::new("111")).unwrap();
        let accounts: Vec<String> = set
            .statement(sids::ACCOUNTS_READ)
            .unwrap()
            .principals
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(accounts, vec!["account:111", "account:123", "account:456"]);
    }

    #[test]
    fn test_build_runner_scoped_to_objects() {
        let set = build_policies("store", &environments(), &AccountId::new("111")).unwrap();
        let stmt = set.statement(sids::BUILD_RUNNER_READ).unwrap();
        assert_eq!(stmt.resources, vec!["arn:aws:s3:::store/*".to_string()]);
    }

    #[test]
    fn test_no_environments_rejected() {
        assert!(matches!(
            build_policies("store", &[], &AccountId::new("111")),
            Err(PolicyError::NoEnvironments)
        ));
    }

    #[test]
    fn test_blank_store_rejected() {
        assert!(matches!(
            build_policies(" ", &environments(), &AccountId::new("111")),
            Err(PolicyError::InvalidStoreName(_))
        ));
    }
}

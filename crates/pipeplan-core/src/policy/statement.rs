//! Access policy statements for the shared artifact store.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::domain::environment::AccountId;

/// Well-known permission symbols.
pub mod permissions {
    pub const ALL: &str = "s3:*";
    pub const GET_OBJECT: &str = "s3:GetObject";
    pub const GET_OBJECT_VERSION: &str = "s3:GetObjectVersion";
    pub const LIST_BUCKET: &str = "s3:ListBucket";
    pub const PUT_OBJECT: &str = "s3:PutObject";
    pub const DELETE_OBJECT: &str = "s3:DeleteObject";
}

/// Request context keys that conditions test.
pub mod context_keys {
    pub const SERVER_SIDE_ENCRYPTION: &str = "s3:x-amz-server-side-encryption";
    pub const SECURE_TRANSPORT: &str = "aws:SecureTransport";
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

/// Cloud services that touch the artifact store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServicePrincipal {
    BuildRunner,
    InfrastructureProvider,
    PipelineOrchestrator,
}

impl ServicePrincipal {
    pub fn service_name(&self) -> &'static str {
        match self {
            ServicePrincipal::BuildRunner => "codebuild.amazonaws.com",
            ServicePrincipal::InfrastructureProvider => "cloudformation.amazonaws.com",
            ServicePrincipal::PipelineOrchestrator => "codepipeline.amazonaws.com",
        }
    }
}

/// Who a statement applies to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Principal {
    Service(ServicePrincipal),
    Account(AccountId),
    /// Every caller, authenticated or not.
    Any,
}

impl Principal {
    /// Whether a statement naming `self` covers a request from `caller`.
    pub fn covers(&self, caller: &Principal) -> bool {
        matches!(self, Principal::Any) || self == caller
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Service(s) => write!(f, "service:{}", s.service_name()),
            Principal::Account(a) => write!(f, "account:{}", a),
            Principal::Any => f.write_str("*"),
        }
    }
}

/// A permission symbol such as `s3:GetObject`; `s3:*` matches the whole service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, action: &str) -> bool {
        match self.0.strip_suffix('*') {
            Some(prefix) => action.starts_with(prefix),
            None => self.0 == action,
        }
    }
}

/// Part of the store a statement covers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceScope {
    Bucket,
    Objects,
    BucketAndObjects,
}

impl ResourceScope {
    /// Resource ARNs this scope expands to for `bucket`.
    pub fn resources(&self, bucket: &str) -> Vec<String> {
        let bucket_arn = format!("arn:aws:s3:::{}", bucket);
        let objects_arn = format!("arn:aws:s3:::{}/*", bucket);
        match self {
            ResourceScope::Bucket => vec![bucket_arn],
            ResourceScope::Objects => vec![objects_arn],
            ResourceScope::BucketAndObjects => vec![bucket_arn, objects_arn],
        }
    }

    pub fn covers(&self, target: &ResourceTarget) -> bool {
        matches!(
            (self, target),
            (ResourceScope::BucketAndObjects, _)
                | (ResourceScope::Bucket, ResourceTarget::Bucket)
                | (ResourceScope::Objects, ResourceTarget::Object { .. })
        )
    }
}

/// What a request touches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceTarget {
    Bucket,
    Object { key: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConditionOperator {
    /// `"true"` holds when the key is absent, `"false"` when present.
    Null,
    /// Holds when the key is present and equals the value.
    Bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condition {
    pub operator: ConditionOperator,
    pub key: String,
    pub value: String,
}

impl Condition {
    pub fn new(operator: ConditionOperator, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            operator,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn holds(&self, context: &BTreeMap<String, String>) -> bool {
        let present = context.get(&self.key);
        match self.operator {
            ConditionOperator::Null => {
                let expect_absent = self.value.eq_ignore_ascii_case("true");
                present.is_none() == expect_absent
            }
            ConditionOperator::Bool => {
                present.is_some_and(|v| v.eq_ignore_ascii_case(&self.value))
            }
        }
    }
}

/// One statement of the artifact store policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessPolicy {
    pub sid: String,
    pub effect: Effect,
    pub principals: BTreeSet<Principal>,
    pub actions: BTreeSet<Permission>,
    pub scope: ResourceScope,
    /// Resource ARNs derived from `scope` for the owning store.
    pub resources: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl AccessPolicy {
    pub fn new(sid: impl Into<String>, effect: Effect, scope: ResourceScope, bucket: &str) -> Self {
        Self {
            sid: sid.into(),
            effect,
            principals: BTreeSet::new(),
            actions: BTreeSet::new(),
            scope,
            resources: scope.resources(bucket),
            conditions: Vec::new(),
        }
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principals.insert(principal);
        self
    }

    pub fn with_actions<'a>(mut self, actions: impl IntoIterator<Item = &'a str>) -> Self {
        self.actions.extend(actions.into_iter().map(Permission::new));
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Whether this statement applies to the given request.
    pub fn applies_to(
        &self,
        caller: &Principal,
        action: &str,
        target: &ResourceTarget,
        context: &BTreeMap<String, String>,
    ) -> bool {
        self.principals.iter().any(|p| p.covers(caller))
            && self.actions.iter().any(|a| a.matches(action))
            && self.scope.covers(target)
            && self.conditions.iter().all(|c| c.holds(context))
    }
}

/// Complete replacement set of statements for one artifact store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicySet {
    pub artifact_store: String,
    pub statements: Vec<AccessPolicy>,
}

impl PolicySet {
    pub fn statement(&self, sid: &str) -> Option<&AccessPolicy> {
        self.statements.iter().find(|s| s.sid == sid)
    }

    pub fn deny_statements(&self) -> impl Iterator<Item = &AccessPolicy> {
        self.statements.iter().filter(|s| s.effect == Effect::Deny)
    }
}

//! Policy evaluation engine: deny overrides allow, default-deny.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::statement::{context_keys, Effect, PolicySet, Principal, ResourceTarget};

/// A single access attempt against the artifact store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessRequest {
    pub principal: Principal,
    pub action: String,
    pub target: ResourceTarget,
    /// Condition keys present on the request.
    pub context: BTreeMap<String, String>,
}

impl AccessRequest {
    /// A request made over a secure transport with no other context.
    pub fn new(principal: Principal, action: impl Into<String>, target: ResourceTarget) -> Self {
        let mut context = BTreeMap::new();
        context.insert(context_keys::SECURE_TRANSPORT.to_string(), "true".to_string());
        Self {
            principal,
            action: action.into(),
            target,
            context,
        }
    }

    pub fn over_secure_transport(mut self, secure: bool) -> Self {
        self.context.insert(
            context_keys::SECURE_TRANSPORT.to_string(),
            secure.to_string(),
        );
        self
    }

    /// Mark the upload as server-side encrypted with `algorithm`.
    pub fn with_encryption(mut self, algorithm: impl Into<String>) -> Self {
        self.context.insert(
            context_keys::SERVER_SIDE_ENCRYPTION.to_string(),
            algorithm.into(),
        );
        self
    }
}

/// Outcome of evaluating an [`AccessRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum AccessVerdict {
    Allowed { sid: String },
    Denied { sid: String },
    /// No statement matched.
    DefaultDenied,
}

impl AccessVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessVerdict::Allowed { .. })
    }
}

/// Evaluate `request` against every statement in `policies`.
///
/// Any matching Deny wins regardless of statement order. Otherwise the first
/// matching Allow grants access. With no match the request is denied.
pub fn evaluate_access(policies: &PolicySet, request: &AccessRequest) -> AccessVerdict {
    let mut allowed_by = None;

    for statement in &policies.statements {
        if !statement.applies_to(
            &request.principal,
            &request.action,
            &request.target,
            &request.context,
        ) {
            continue;
        }
        match statement.effect {
            Effect::Deny => {
                return AccessVerdict::Denied {
                    sid: statement.sid.clone(),
                }
            }
            Effect::Allow => {
                allowed_by.get_or_insert_with(|| statement.sid.clone());
            }
        }
    }

    match allowed_by {
        Some(sid) => AccessVerdict::Allowed { sid },
        None => AccessVerdict::DefaultDenied,
    }
}

impl PolicySet {
    pub fn evaluate(&self, request: &AccessRequest) -> AccessVerdict {
        evaluate_access(self, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::environment::AccountId;
    use crate::policy::statement::{
        permissions, AccessPolicy, Condition, ConditionOperator, ResourceScope,
    };

    fn object() -> ResourceTarget {
        ResourceTarget::Object {
            key: "builds/out.zip".into(),
        }
    }

    fn account() -> Principal {
        Principal::Account(AccountId::new("123"))
    }

    #[test]
    fn test_default_deny_when_no_statements() {
        let set = PolicySet {
            artifact_store: "store".into(),
            statements: vec![],
        };
        let req = AccessRequest::new(account(), permissions::GET_OBJECT, object());
        assert_eq!(set.evaluate(&req), AccessVerdict::DefaultDenied);
    }

    #[test]
    fn test_deny_overrides_earlier_allow() {
        let set = PolicySet {
            artifact_store: "store".into(),
            statements: vec![
                AccessPolicy::new("Allow", Effect::Allow, ResourceScope::Objects, "store")
                    .with_principal(account())
                    .with_actions([permissions::ALL]),
                AccessPolicy::new("Deny", Effect::Deny, ResourceScope::Objects, "store")
                    .with_principal(Principal::Any)
                    .with_actions([permissions::PUT_OBJECT]),
            ],
        };

        let put = AccessRequest::new(account(), permissions::PUT_OBJECT, object());
        assert!(matches!(set.evaluate(&put), AccessVerdict::Denied { sid } if sid == "Deny"));

        let get = AccessRequest::new(account(), permissions::GET_OBJECT, object());
        assert!(set.evaluate(&get).is_allowed());
    }

    #[test]
    fn test_conditional_deny_only_when_condition_holds() {
        let set = PolicySet {
            artifact_store: "store".into(),
            statements: vec![
                AccessPolicy::new("Allow", Effect::Allow, ResourceScope::Objects, "store")
                    .with_principal(account())
                    .with_actions([permissions::GET_OBJECT]),
                AccessPolicy::new("Insecure", Effect::Deny, ResourceScope::Objects, "store")
                    .with_principal(Principal::Any)
                    .with_actions([permissions::ALL])
                    .with_condition(Condition::new(
                        ConditionOperator::Bool,
                        context_keys::SECURE_TRANSPORT,
                        "false",
                    )),
            ],
        };

        let secure = AccessRequest::new(account(), permissions::GET_OBJECT, object());
        assert!(set.evaluate(&secure).is_allowed());

        let insecure = secure.clone().over_secure_transport(false);
        assert!(!set.evaluate(&insecure).is_allowed());
    }
}

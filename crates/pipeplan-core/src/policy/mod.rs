//! Artifact store access policies.
//!
//! The builder derives a complete replacement set of statements from the
//! deploy targets; the engine evaluates requests against it with
//! deny-overrides-allow and a default-deny posture.
//!
//! # Modules
//!
//! - [`statement`]: `AccessPolicy`, `Principal`, `Permission`, `Condition`, `PolicySet`
//! - [`builder`]: `PolicyBuilder`, `build_policies()`
//! - [`engine`]: `AccessRequest`, `evaluate_access()`
//! - [`error`]: `PolicyError` / `PolicyResult`

pub mod builder;
pub mod engine;
pub mod error;
pub mod statement;

pub use builder::{build_policies, sids, PolicyBuilder};
pub use engine::{evaluate_access, AccessRequest, AccessVerdict};
pub use error::{PolicyError, PolicyResult};
pub use statement::{
    context_keys, permissions, AccessPolicy, Condition, ConditionOperator, Effect, Permission,
    PolicySet, Principal, ResourceScope, ResourceTarget, ServicePrincipal,
};

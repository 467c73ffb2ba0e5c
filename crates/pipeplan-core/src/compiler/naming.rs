//! Input validation and deterministic resource naming.

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::deployment::DeploymentType;
use crate::domain::environment::Environment;

use super::error::{CompileError, CompileResult};

/// Longest accepted naming prefix.
pub const MAX_PREFIX_LEN: usize = 32;

/// Bucket names are capped by the object store.
pub const MAX_BUCKET_NAME_LEN: usize = 63;

fn prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]*$").expect("static pattern"))
}

fn region_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-[0-9]+$").expect("static pattern"))
}

/// Check that `prefix` is non-empty and identifier-safe.
pub fn validate_prefix(prefix: &str) -> CompileResult<()> {
    let invalid = |reason: &str| CompileError::InvalidPrefix {
        prefix: prefix.to_string(),
        reason: reason.to_string(),
    };

    if prefix.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if prefix.len() > MAX_PREFIX_LEN {
        return Err(invalid(&format!(
            "must be at most {} characters",
            MAX_PREFIX_LEN
        )));
    }
    if !prefix_pattern().is_match(prefix) {
        return Err(invalid(
            "must start with a letter or digit and contain only letters, digits and '-'",
        ));
    }
    Ok(())
}

/// Check that `region` looks like `eu-west-2`.
pub fn validate_region(region: &str) -> CompileResult<()> {
    if region_pattern().is_match(region) {
        Ok(())
    } else {
        Err(CompileError::InvalidRegion {
            region: region.to_string(),
            reason: "expected lowercase '<area>-<location>-<number>', e.g. eu-west-2".to_string(),
        })
    }
}

/// Check that `branch` is a plausible branch name.
pub fn validate_branch(branch: &str) -> CompileResult<()> {
    let invalid = |reason: &str| CompileError::InvalidBranch {
        branch: branch.to_string(),
        reason: reason.to_string(),
    };

    if branch.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if branch.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid("must not contain whitespace or control characters"));
    }
    if branch.contains("..") {
        return Err(invalid("must not contain '..'"));
    }
    if branch.starts_with('/') || branch.ends_with('/') {
        return Err(invalid("must not start or end with '/'"));
    }
    Ok(())
}

/// Names of everything a pipeline creates, rooted at `<prefix>-<type>` or
/// `<prefix>-<type>-<region>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    root: String,
}

impl Naming {
    pub fn new(prefix: &str, deployment_type: DeploymentType) -> Self {
        Self {
            root: format!("{}-{}", prefix, deployment_type),
        }
    }

    /// Append `region` to the root.
    pub fn with_region(mut self, region: &str) -> Self {
        self.root = format!("{}-{}", self.root, region);
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn pipeline(&self) -> String {
        format!("{}-deployment-pipeline", self.root)
    }

    pub fn artifact_store(&self) -> String {
        format!("{}-artifact-bucket", self.root)
    }

    pub fn stack(&self, suffix: &str) -> String {
        format!("{}-{}", self.root, suffix)
    }

    pub fn build_project(&self, suffix: &str) -> String {
        format!("{}-{}-build", self.root, suffix)
    }

    /// Website bucket of one environment; unique per hop.
    pub fn website_bucket(&self, environment: &Environment) -> String {
        format!("{}-{}-website-bucket", self.root, environment.short_name)
    }

    /// First bucket name, among the artifact store and the website buckets
    /// of `environments`, that is longer than [`MAX_BUCKET_NAME_LEN`].
    pub fn oversized_bucket<'a>(
        &self,
        environments: impl IntoIterator<Item = &'a Environment>,
    ) -> Option<String> {
        std::iter::once(self.artifact_store())
            .chain(environments.into_iter().map(|env| self.website_bucket(env)))
            .find(|name| name.len() > MAX_BUCKET_NAME_LEN)
    }
}

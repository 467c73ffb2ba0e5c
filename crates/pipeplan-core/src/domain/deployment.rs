//! Deployment types and the promotion line each one resolves to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::environment::names;
use super::error::DomainError;

/// Which topology shape a compilation produces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentType {
    /// Short-lived branch environments, torn down after review.
    Feature,
    /// Long-lived staging and production environments.
    Release,
}

impl DeploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentType::Feature => "feature",
            DeploymentType::Release => "release",
        }
    }
}

impl fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "feature" => Ok(DeploymentType::Feature),
            "release" => Ok(DeploymentType::Release),
            _ => Err(DomainError::UnknownDeploymentType(s.to_string())),
        }
    }
}

/// One deploy step of a [`PipelineLine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop {
    /// Registry name of the target environment.
    pub environment: &'static str,
    /// Whether the hop's stage opens with a manual approval.
    pub gated: bool,
}

/// The ordered pair of environments a deployment type promotes through.
///
/// Resolved once per compilation; stage emission consumes it uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineLine {
    /// `dev → ci`; only the promotion to ci is gated; both are torn down.
    Ephemeral { hops: [Hop; 2] },
    /// `staging → prod`; every hop is gated; nothing is torn down.
    LongLived { hops: [Hop; 2] },
}

impl PipelineLine {
    pub fn resolve(deployment_type: DeploymentType) -> Self {
        match deployment_type {
            DeploymentType::Feature => PipelineLine::Ephemeral {
                hops: [
                    Hop {
                        environment: names::DEV,
                        gated: false,
                    },
                    Hop {
                        environment: names::CI,
                        gated: true,
                    },
                ],
            },
            DeploymentType::Release => PipelineLine::LongLived {
                hops: [
                    Hop {
                        environment: names::STAGING,
                        gated: true,
                    },
                    Hop {
                        environment: names::PROD,
                        gated: true,
                    },
                ],
            },
        }
    }

    pub fn hops(&self) -> &[Hop; 2] {
        match self {
            PipelineLine::Ephemeral { hops } | PipelineLine::LongLived { hops } => hops,
        }
    }

    /// Whether teardown stages follow the last deploy stage.
    pub fn tears_down(&self) -> bool {
        matches!(self, PipelineLine::Ephemeral { .. })
    }

    /// Environment names referenced by this line, in promotion order.
    pub fn environments(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.hops().iter().map(|hop| hop.environment)
    }
}

/// Service tagging metadata, carried through as opaque override values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceTags {
    #[serde(default)]
    pub service_code: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub service_owner: String,
}

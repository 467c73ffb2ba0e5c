//! Independently provisionable resource groups deployed on every hop.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unit deployed (and torn down) as one action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResourceGroup {
    /// DynamoDB-backed data stack.
    Database,
    /// Lambda functions behind the API; consumes the Lambda build artifact.
    ApiLayer,
    /// Client stack owning the website bucket.
    Client,
    /// Static website contents published into the client bucket.
    StaticSite,
}

impl ResourceGroup {
    /// Every group, in declaration order.
    pub const ALL: [ResourceGroup; 4] = [
        ResourceGroup::Database,
        ResourceGroup::ApiLayer,
        ResourceGroup::Client,
        ResourceGroup::StaticSite,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ResourceGroup::Database => "Database",
            ResourceGroup::ApiLayer => "APILayer",
            ResourceGroup::Client => "Client",
            ResourceGroup::StaticSite => "Website",
        }
    }

    /// Groups that must exist before this one can be created.
    pub fn depends_on(&self) -> &'static [ResourceGroup] {
        match self {
            ResourceGroup::Database => &[],
            ResourceGroup::ApiLayer => &[ResourceGroup::Database],
            ResourceGroup::Client => &[ResourceGroup::ApiLayer],
            ResourceGroup::StaticSite => &[ResourceGroup::Client],
        }
    }

    /// Stack name suffix, `None` for groups that are not stacks.
    pub fn stack_suffix(&self) -> Option<&'static str> {
        match self {
            ResourceGroup::Database => Some("database"),
            ResourceGroup::ApiLayer => Some("api-layer"),
            ResourceGroup::Client => Some("client"),
            ResourceGroup::StaticSite => None,
        }
    }

    /// Template file synthesized for this group's stack.
    pub fn template_file(&self) -> Option<&'static str> {
        match self {
            ResourceGroup::Database => Some("database.template.yaml"),
            ResourceGroup::ApiLayer => Some("api.template.yaml"),
            ResourceGroup::Client => Some("client.template.yaml"),
            ResourceGroup::StaticSite => None,
        }
    }

    pub fn deploy_action_name(&self) -> String {
        format!("Deploy{}", self.name())
    }

    pub fn teardown_action_name(&self) -> String {
        match self {
            ResourceGroup::StaticSite => "EmptyWebsiteBucket".to_string(),
            other => format!("Teardown{}", other.name()),
        }
    }
}

impl fmt::Display for ResourceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

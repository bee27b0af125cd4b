// Group Membership Resolver
// Derives coarse application roles from a remote directory service. Lookups
// can fail; failures degrade the role set and never block login.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use utoipa::ToSchema;

use crate::config::GroupsConfig;

#[derive(Debug, Error)]
pub enum GroupLookupError {
    #[error("Directory request failed: {0}")]
    Transport(String),

    #[error("Directory returned status {0}")]
    Status(u16),

    #[error("Directory response malformed: {0}")]
    Malformed(String),
}

/// Application roles, serialized with the exact directory group spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Role {
    #[serde(rename = "Solution_Architect")]
    SolutionArchitect,
    #[serde(rename = "Administration")]
    Administration,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::SolutionArchitect, Role::Administration];

    /// Directory group this role is derived from.
    pub fn group_name(self) -> &'static str {
        match self {
            Role::SolutionArchitect => "Solution_Architect",
            Role::Administration => "Administration",
        }
    }
}

/// Remote membership lookup, one call per (email, group) pair.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    async fn is_member(&self, email: &str, group: &str) -> Result<bool, GroupLookupError>;
}

/// Directory client querying the membership endpoint over HTTP.
pub struct HttpGroupDirectory {
    base_url: String,
    client: Client,
}

impl HttpGroupDirectory {
    pub fn new(config: &GroupsConfig) -> Result<Self, GroupLookupError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GroupLookupError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: config.directory_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct MembershipResponse {
    #[serde(alias = "is_member")]
    member: bool,
}

#[async_trait]
impl GroupDirectory for HttpGroupDirectory {
    async fn is_member(&self, email: &str, group: &str) -> Result<bool, GroupLookupError> {
        let url = format!("{}/groups/{}/members", self.base_url, group);
        let response = self
            .client
            .get(&url)
            .query(&[("email", email)])
            .send()
            .await
            .map_err(|e| GroupLookupError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GroupLookupError::Status(response.status().as_u16()));
        }

        let body: MembershipResponse = response
            .json()
            .await
            .map_err(|e| GroupLookupError::Malformed(e.to_string()))?;

        Ok(body.member)
    }
}

/// Resolve the caller's roles, one directory lookup per known role.
pub async fn resolve_roles(directory: &dyn GroupDirectory, email: &str) -> Vec<Role> {
    let mut roles = Vec::new();
    for role in Role::ALL {
        if membership_or_false(directory, email, role.group_name()).await {
            roles.push(role);
        }
    }
    roles
}

/// Collapse a fallible lookup to a plain bool. Failures are logged and read
/// as non-membership; login never blocks on the directory.
async fn membership_or_false(directory: &dyn GroupDirectory, email: &str, group: &str) -> bool {
    match directory.is_member(email, group).await {
        Ok(member) => member,
        Err(err) => {
            warn!(group, error = %err, "group lookup failed, treating as non-member");
            false
        }
    }
}

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use deskbot_common::UserId;

use crate::error::Result;

/// Which conversation logic a sender gets.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    #[default]
    Employee,
    Contractor,
}

/// Resolved sender identity attached to an update after authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: UserId,
    /// Directory account name, used as the author of external records.
    pub account: String,
    pub display_name: String,
    pub role: SenderRole,
}

/// Resolves a transport sender id to a directory identity.
///
/// Returns `Ok(None)` for senders unknown to the directory; those are
/// answered with a registration hint and never reach conversation dispatch.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, user: UserId) -> Result<Option<Identity>>;
}

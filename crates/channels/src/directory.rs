//! Config-backed identity directory.
//!
//! Stands in for an external directory service: the deployment lists known
//! senders in its config file and this resolver answers lookups from that
//! table. Entries are keyed by the transport user id.

use std::collections::HashMap;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use deskbot_common::UserId;

use crate::{
    error::Result,
    identity::{Identity, IdentityResolver, SenderRole},
};

/// One directory entry as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub user_id: u64,
    pub account: String,
    pub display_name: String,
    #[serde(default)]
    pub role: SenderRole,
}

/// In-memory resolver over a fixed user table.
pub struct StaticDirectoryResolver {
    users: HashMap<UserId, Identity>,
}

impl StaticDirectoryResolver {
    pub fn new(users: impl IntoIterator<Item = DirectoryUser>) -> Self {
        let users = users
            .into_iter()
            .map(|u| {
                (UserId(u.user_id), Identity {
                    user: UserId(u.user_id),
                    account: u.account,
                    display_name: u.display_name,
                    role: u.role,
                })
            })
            .collect();
        Self { users }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl IdentityResolver for StaticDirectoryResolver {
    async fn resolve(&self, user: UserId) -> Result<Option<Identity>> {
        Ok(self.users.get(&user).cloned())
    }
}

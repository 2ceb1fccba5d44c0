use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use crate::session::SessionUser;

/// Represents a user the gateway has seen log in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Latest identity the provider asserted for this subject
    pub user: SessionUser,
    /// When the user first logged in
    pub first_login_at: DateTime<Utc>,
    /// When the user last logged in
    pub last_login_at: DateTime<Utc>,
    pub login_count: u64,
}

/// Durable home for user records.
///
/// Login does not depend on it: the session carries everything a request
/// needs, and a failed write here is logged rather than failing the login.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Create or refresh the record for a user who just logged in
    async fn record_login(&self, user: &SessionUser) -> color_eyre::Result<UserRecord>;
}

/// Process-local directory, lost on restart
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn record_login(&self, user: &SessionUser) -> color_eyre::Result<UserRecord> {
        let now = Utc::now();
        let mut users = self.users.write().await;

        let record = users
            .entry(user.id.clone())
            .and_modify(|record| {
                record.user = user.clone();
                record.last_login_at = now;
                record.login_count += 1;
            })
            .or_insert_with(|| {
                info!("Recording first login for user {}", user.id);
                UserRecord {
                    user: user.clone(),
                    first_login_at: now,
                    last_login_at: now,
                    login_count: 1,
                }
            });

        Ok(record.clone())
    }
}

#[cfg(test)]
impl MemoryUserDirectory {
    async fn find(&self, id: &str) -> Option<UserRecord> {
        self.users.read().await.get(id).cloned()
    }
}

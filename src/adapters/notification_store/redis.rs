//! Redis-backed notification store for production deployments.
//!
//! Each user's queue is a Redis list:
//!
//! ```text
//! notifications:queue:<userId>   RPUSH entry / EXPIRE ttl / LRANGE 0 -1 / DEL
//! ```
//!
//! The connection is opened on first use and retried on every call until it
//! succeeds, so the gateway starts and serves while Redis is down. Once open,
//! `ConnectionManager` reconnects by itself after Redis restarts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::OnceCell;

use crate::domain::foundation::UserId;
use crate::ports::{NotificationStore, StoreError};

const KEY_PREFIX: &str = "notifications:queue";

/// Redis list storage for queued notifications.
#[derive(Clone)]
pub struct RedisNotificationStore {
    client: redis::Client,
    conn: Arc<OnceCell<ConnectionManager>>,
}

impl RedisNotificationStore {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            conn: Arc::new(OnceCell::new()),
        }
    }

    /// Open the connection now instead of on first use.
    pub async fn connect(&self) -> Result<(), StoreError> {
        self.connection().await.map(|_| ())
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let conn = self
            .conn
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await
            .map_err(unavailable)?;
        Ok(conn.clone())
    }

    /// Returns the Redis key holding a user's queue.
    pub fn key_for(user_id: &UserId) -> String {
        format!("{}:{}", KEY_PREFIX, user_id)
    }
}

fn unavailable(e: redis::RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl NotificationStore for RedisNotificationStore {
    async fn push_back(&self, user_id: &UserId, entry: String) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        conn.rpush::<_, _, ()>(Self::key_for(user_id), entry)
            .await
            .map_err(unavailable)
    }

    async fn expire(&self, user_id: &UserId, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        conn.expire::<_, ()>(Self::key_for(user_id), secs)
            .await
            .map_err(unavailable)
    }

    async fn read_all(&self, user_id: &UserId) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection().await?;
        conn.lrange(Self::key_for(user_id), 0, -1)
            .await
            .map_err(unavailable)
    }

    async fn delete(&self, user_id: &UserId) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(Self::key_for(user_id))
            .await
            .map_err(unavailable)
    }
}

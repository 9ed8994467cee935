//! In-memory notification store for tests and single-process deployments.
//!
//! Mirrors the Redis list semantics, including expiry. Failures and latency
//! can be injected to exercise the queue's degraded paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::UserId;
use crate::ports::{NotificationStore, StoreError};

#[derive(Debug, Default)]
struct UserList {
    entries: Vec<String>,
    expires_at: Option<Instant>,
}

impl UserList {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Process-local list storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationStore {
    lists: Arc<RwLock<HashMap<UserId, UserList>>>,
    failing: Arc<AtomicBool>,
    delay_ms: Arc<AtomicU64>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every subsequent call by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of entries currently queued for a user.
    pub async fn queued_len(&self, user_id: &UserId) -> usize {
        let lists = self.lists.read().await;
        lists
            .get(user_id)
            .filter(|list| !list.is_expired(Instant::now()))
            .map_or(0, |list| list.entries.len())
    }

    /// Time left before the user's list expires.
    pub async fn ttl(&self, user_id: &UserId) -> Option<Duration> {
        let lists = self.lists.read().await;
        let expires_at = lists.get(user_id)?.expires_at?;
        Some(expires_at.saturating_duration_since(Instant::now()))
    }

    async fn before_call(&self) -> Result<(), StoreError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("in-memory store set to fail"));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn push_back(&self, user_id: &UserId, entry: String) -> Result<(), StoreError> {
        self.before_call().await?;
        let mut lists = self.lists.write().await;
        let list = lists.entry(user_id.clone()).or_default();
        if list.is_expired(Instant::now()) {
            *list = UserList::default();
        }
        list.entries.push(entry);
        Ok(())
    }

    async fn expire(&self, user_id: &UserId, ttl: Duration) -> Result<(), StoreError> {
        self.before_call().await?;
        let mut lists = self.lists.write().await;
        if let Some(list) = lists.get_mut(user_id) {
            list.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn read_all(&self, user_id: &UserId) -> Result<Vec<String>, StoreError> {
        self.before_call().await?;
        let lists = self.lists.read().await;
        Ok(lists
            .get(user_id)
            .filter(|list| !list.is_expired(Instant::now()))
            .map(|list| list.entries.clone())
            .unwrap_or_default())
    }

    async fn delete(&self, user_id: &UserId) -> Result<(), StoreError> {
        self.before_call().await?;
        self.lists.write().await.remove(user_id);
        Ok(())
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::identity::Identity;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store backend error: {0}")]
    Backend(String),

    #[error("session record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("session store {0} timed out")]
    Timeout(&'static str),
}

/// Server-side view of a live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub identity: Identity,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Shared key-value storage for session records.
///
/// Implementations key records by [`session_key`], never by the raw token.
/// A missing or evicted key is `Ok(None)`.
#[async_trait]
pub trait SessionStore: Send + Sync + fmt::Debug {
    async fn put(
        &self,
        token: &str,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn get(&self, token: &str) -> Result<Option<SessionRecord>, StoreError>;

    async fn delete(&self, token: &str) -> Result<(), StoreError>;
}

/// Cache key for a session token.
pub fn session_key(token: &str) -> String {
    format!("fusion:session:{}", hex::encode(Sha256::digest(token.as_bytes())))
}

/// Process-local store for tests and single-node development.
#[derive(Clone, Debug, Default)]
pub struct InMemorySessionStore {
    entries: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let guard = self.entries.lock().await;
        guard.values().filter(|(_, deadline)| *deadline > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(
        &self,
        token: &str,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        let deadline = Instant::now() + ttl;
        let mut guard = self.entries.lock().await;
        guard.retain(|_, (_, expires)| *expires > Instant::now());
        guard.insert(session_key(token), (json, deadline));
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<SessionRecord>, StoreError> {
        let key = session_key(token);
        let mut guard = self.entries.lock().await;
        let json = match guard.get(&key) {
            Some((json, deadline)) if *deadline > Instant::now() => json.clone(),
            Some(_) => {
                debug!("evicting expired in-memory session");
                guard.remove(&key);
                return Ok(None);
            }
            None => return Ok(None),
        };
        drop(guard);
        Ok(Some(serde_json::from_str(&json)?))
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(&session_key(token));
        Ok(())
    }
}

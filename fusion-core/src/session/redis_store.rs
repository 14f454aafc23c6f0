use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use super::store::{SessionRecord, SessionStore, StoreError, session_key};

/// Session store shared by every server instance through redis.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSessionStore")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisSessionStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        info!("Connecting to redis session store");

        let client = redis::Client::open(redis_url).map_err(|e| {
            StoreError::Backend(format!("Failed to create Redis client: {e}"))
        })?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            StoreError::Backend(format!("Failed to connect to Redis: {e}"))
        })?;

        info!("Connected to redis session store");

        Ok(Self { conn })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(
        &self,
        token: &str,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let key = session_key(token);
        let json = serde_json::to_string(record)?;
        let seconds = ttl.as_secs().max(1);
        debug!(ttl_secs = seconds, "session SET");

        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, json, seconds)
            .await
            .map_err(|e| StoreError::Backend(format!("Redis SETEX failed: {e}")))
    }

    async fn get(&self, token: &str) -> Result<Option<SessionRecord>, StoreError> {
        let key = session_key(token);
        let mut conn = self.conn.clone();
        let data: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| StoreError::Backend(format!("Redis GET failed: {e}")))?;

        match data {
            Some(json) => {
                debug!("session HIT");
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => {
                debug!("session MISS");
                Ok(None)
            }
        }
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        let key = session_key(token);
        debug!("session DEL");
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| StoreError::Backend(format!("Redis DEL failed: {e}")))
    }
}

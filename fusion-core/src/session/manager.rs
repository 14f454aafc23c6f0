use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::sealer::{SealedToken, SessionSealer};
use super::store::{SessionRecord, SessionStore, StoreError};
use crate::error::{FusionError, Result};
use crate::identity::Identity;

/// A freshly opened session as returned to the login endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: SealedToken,
    pub identity: Identity,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session ttl must be between 1s and {max:?}, got {ttl:?}")]
pub struct InvalidTtl {
    pub ttl: Duration,
    pub max: Duration,
}

/// Issues, resolves and closes sessions.
///
/// A token is only honoured when it unseals under the deployment key, its
/// embedded expiry is in the future, and the store still holds a matching
/// record. Each check alone is insufficient: the store lets logout revoke a
/// token that would otherwise still unseal, and the sealed expiry rejects
/// records the store has not evicted yet.
#[derive(Debug, Clone)]
pub struct SessionManager {
    sealer: Arc<SessionSealer>,
    store: Arc<dyn SessionStore>,
    ttl: chrono::Duration,
    store_timeout: Duration,
}

impl SessionManager {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(12 * 60 * 60);
    pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);
    /// Longest accepted session lifetime.
    pub const MAX_TTL: Duration = Duration::from_secs(366 * 24 * 60 * 60);

    pub fn new(sealer: Arc<SessionSealer>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            sealer,
            store,
            ttl: chrono::Duration::from_std(Self::DEFAULT_TTL)
                .unwrap_or_else(|_| chrono::Duration::hours(12)),
            store_timeout: Self::DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> std::result::Result<Self, InvalidTtl> {
        self.ttl = Self::check_ttl(ttl)?;
        Ok(self)
    }

    /// Reject lifetimes that are zero or above [`Self::MAX_TTL`].
    pub fn check_ttl(ttl: Duration) -> std::result::Result<chrono::Duration, InvalidTtl> {
        let invalid = InvalidTtl {
            ttl,
            max: Self::MAX_TTL,
        };
        if ttl.is_zero() || ttl > Self::MAX_TTL {
            return Err(invalid);
        }
        chrono::Duration::from_std(ttl).map_err(|_| invalid)
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl.to_std().unwrap_or(Self::DEFAULT_TTL)
    }

    pub fn sealer(&self) -> &SessionSealer {
        &self.sealer
    }

    pub async fn open(&self, identity: Identity) -> Result<Session> {
        let issued_at = Utc::now();
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| FusionError::Internal("session expiry out of range".into()))?;

        let token = self
            .sealer
            .seal(&identity, expires_at)
            .map_err(|err| FusionError::Internal(err.to_string()))?;
        let record = SessionRecord {
            identity: identity.clone(),
            issued_at,
            expires_at,
        };

        let ttl = store_ttl(expires_at, issued_at);
        self.bounded("put", self.store.put(token.as_str(), &record, ttl))
            .await?;

        info!(subject = %identity.subject, expires_at = %expires_at, "session opened");
        Ok(Session {
            token,
            identity,
            issued_at,
            expires_at,
        })
    }

    /// Resolve a presented token to its identity.
    ///
    /// `Ok(None)` means the session is invalid or gone; `Err` is reserved for
    /// store failures.
    pub async fn resolve(&self, token: &str) -> Result<Option<Identity>> {
        let identity = match self.sealer.unseal(token) {
            Ok(identity) => identity,
            Err(_) => {
                debug!("session token rejected by sealer");
                return Ok(None);
            }
        };

        let record = self.bounded("get", self.store.get(token)).await?;
        let Some(record) = record else {
            debug!(subject = %identity.subject, "session absent from store");
            return Ok(None);
        };

        if record.identity != identity {
            warn!(subject = %identity.subject, "session record subject mismatch");
            return Ok(None);
        }
        if record.expires_at <= Utc::now() {
            debug!(subject = %identity.subject, "stored session past expiry");
            return Ok(None);
        }

        Ok(Some(identity))
    }

    pub async fn close(&self, token: &str) -> Result<()> {
        self.bounded("delete", self.store.delete(token)).await?;
        debug!("session closed");
        Ok(())
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result.map_err(FusionError::from),
            Err(_) => Err(FusionError::from(StoreError::Timeout(operation))),
        }
    }
}

fn store_ttl(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    let millis = (expires_at - now).num_milliseconds().max(0) as u64;
    // Round up to whole seconds; redis EX cannot express less than one.
    Duration::from_secs(millis.div_ceil(1000).max(1))
}

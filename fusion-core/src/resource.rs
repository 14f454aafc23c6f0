//! Resource lifecycle hooks and the per-operation contexts handed to them.
//!
//! The dispatcher builds one context per request after the caller has been
//! authenticated and authorized, so a hook never has to re-check access.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::identity::Identity;

/// Failure reported by a resource hook.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// `Ok(None)` is reported to the caller as not found.
pub type HookResult<T> = Result<Option<T>, HookError>;

#[derive(Debug, Clone)]
pub struct CreateContext {
    pub identity: Identity,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct RetrieveContext {
    pub identity: Identity,
    pub resource_id: String,
}

#[derive(Debug, Clone)]
pub struct UpdateContext {
    pub identity: Identity,
    pub resource_id: String,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct AttachContext {
    pub identity: Identity,
    pub resource_id: String,
    pub next_id: String,
}

#[derive(Debug, Clone)]
pub struct EnumerateContext {
    pub identity: Identity,
}

impl CreateContext {
    /// Deserialize the request body, reporting shape errors as bad requests.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, HookError> {
        parse_body(&self.body)
    }
}

impl UpdateContext {
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, HookError> {
        parse_body(&self.body)
    }
}

fn parse_body<T: DeserializeOwned>(body: &Value) -> Result<T, HookError> {
    T::deserialize(body).map_err(|e| HookError::BadRequest(format!("invalid body: {e}")))
}

/// Behavior behind one registered resource.
///
/// Operations a resource does not support can be left at their default,
/// which reports not found.
#[async_trait]
pub trait ResourceHooks: Send + Sync + 'static {
    type Resource: Serialize + Send + 'static;

    async fn create(&self, _ctx: CreateContext) -> HookResult<Self::Resource> {
        Ok(None)
    }

    async fn retrieve(&self, _ctx: RetrieveContext) -> HookResult<Self::Resource> {
        Ok(None)
    }

    async fn update(&self, _ctx: UpdateContext) -> HookResult<Self::Resource> {
        Ok(None)
    }

    async fn attach(&self, _ctx: AttachContext) -> HookResult<Self::Resource> {
        Ok(None)
    }

    async fn enumerate(&self, _ctx: EnumerateContext) -> HookResult<Vec<Self::Resource>> {
        Ok(None)
    }
}

//! # Fusion Core
//!
//! Core library for Fusion, the authenticated resource framework. It holds
//! everything the HTTP layer needs that is not HTTP:
//!
//! - **Credentials**: the configured [`CredentialBackend`] and API-key clients
//! - **Sessions**: the [`SessionSealer`] token transform, the shared
//!   [`SessionStore`] and the [`SessionManager`] composing them
//! - **Authorization**: group rules and application hooks in [`authz`]
//! - **Resources**: the [`ResourceHooks`] table and per-operation contexts
//!
//! ## Feature Flags
//!
//! - `redis`: Enables [`session::RedisSessionStore`] (on by default)
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use fusion_core::{Identity, InMemorySessionStore, SessionManager, SessionSealer};
//!
//! async fn issue() -> fusion_core::Result<()> {
//!     let sealer = SessionSealer::new(b"deployment key")
//!         .map_err(|e| fusion_core::FusionError::Internal(e.to_string()))?;
//!     let sessions = SessionManager::new(Arc::new(sealer), Arc::new(InMemorySessionStore::new()));
//!
//!     let session = sessions.open(Identity::new("test", ["TEST"])).await?;
//!     assert!(sessions.resolve(session.token.as_str()).await?.is_some());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Response envelopes shared by every endpoint
pub mod api;
/// Credential backends and API-key clients
pub mod auth;
pub mod authz;
/// Error taxonomy of the request pipeline
pub mod error;
/// Identities and credentials
pub mod identity;
pub mod resource;
pub mod session;

pub use api::{ApiResponse, Info};
pub use auth::{AuthFailure, Authenticator, ClientRegistry, CredentialBackend};
pub use authz::{AuthorizeHook, Authorizer, Operation, RequestMetadata, ResourceConfig};
pub use error::{FusionError, Result};
pub use identity::{Credential, Identity};
pub use resource::{
    AttachContext, CreateContext, EnumerateContext, HookError, HookResult,
    ResourceHooks, RetrieveContext, UpdateContext,
};
pub use session::{
    InMemorySessionStore, SealError, SealedToken, Session, SessionManager,
    SessionRecord, SessionSealer, SessionStore, StoreError,
};

//! Sealed sessions: the [`SessionSealer`] transform, the shared
//! [`SessionStore`], and the [`SessionManager`] that ties them together.

pub mod manager;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod sealer;
pub mod store;

pub use manager::{InvalidTtl, Session, SessionManager};
#[cfg(feature = "redis")]
pub use redis_store::RedisSessionStore;
pub use sealer::{SealError, SealedToken, SealerKeyError, SessionSealer};
pub use store::{
    InMemorySessionStore, SessionRecord, SessionStore, StoreError, session_key,
};

use thiserror::Error;

use crate::auth::AuthFailure;
use crate::resource::HookError;
use crate::session::{SealError, StoreError};

/// Failure kinds surfaced by the request pipeline.
///
/// Every gate and hook result is folded into one of these before it reaches
/// the transport layer, which maps each variant to exactly one status code.
#[derive(Error, Debug)]
pub enum FusionError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("access denied")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, FusionError>;

impl From<AuthFailure> for FusionError {
    fn from(err: AuthFailure) -> Self {
        match err {
            AuthFailure::InvalidCredentials => FusionError::Unauthenticated,
            AuthFailure::Backend(msg) => FusionError::Internal(msg),
        }
    }
}

impl From<SealError> for FusionError {
    fn from(err: SealError) -> Self {
        match err {
            SealError::Invalid => FusionError::Unauthenticated,
            SealError::Sealing => FusionError::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for FusionError {
    fn from(err: StoreError) -> Self {
        FusionError::Internal(err.to_string())
    }
}

impl From<HookError> for FusionError {
    fn from(err: HookError) -> Self {
        match err {
            HookError::NotFound(msg) => FusionError::NotFound(msg),
            HookError::BadRequest(msg) => FusionError::BadRequest(msg),
            HookError::Conflict(msg) => FusionError::Conflict(msg),
            HookError::Internal(err) => FusionError::Internal(format!("{err:#}")),
        }
    }
}

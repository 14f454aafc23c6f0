use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fusion_core::{AuthFailure, FusionError, HookError};
use serde_json::json;
use std::any::Any;
use std::fmt;
use tracing::error;

pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Opaque 500. `detail` is logged, never returned.
    pub fn internal(detail: impl fmt::Display) -> Self {
        error!(error = %detail, "request failed with internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Authentication required")
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Access denied")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));

        (self.status, body).into_response()
    }
}

impl From<FusionError> for AppError {
    fn from(err: FusionError) -> Self {
        match err {
            FusionError::Unauthenticated => Self::unauthorized(),
            FusionError::Unauthorized => Self::forbidden(),
            FusionError::NotFound(msg) => Self::not_found(msg),
            FusionError::BadRequest(msg) => Self::bad_request(msg),
            FusionError::Conflict(msg) => Self::conflict(msg),
            FusionError::Internal(detail) => Self::internal(detail),
        }
    }
}

impl From<HookError> for AppError {
    fn from(err: HookError) -> Self {
        FusionError::from(err).into()
    }
}

impl From<AuthFailure> for AppError {
    fn from(err: AuthFailure) -> Self {
        FusionError::from(err).into()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{err:#}"))
    }
}

/// Response for a handler that panicked; used with `CatchPanicLayer`.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else {
        "non-string panic payload"
    };
    AppError::internal(format_args!("handler panicked: {detail}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_each_kind_to_one_status() {
        let cases = [
            (FusionError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (FusionError::Unauthorized, StatusCode::FORBIDDEN),
            (FusionError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (FusionError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (FusionError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                FusionError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = AppError::from(FusionError::Internal("redis://secret@host".into()));
        assert_eq!(err.message, INTERNAL_MESSAGE);
    }

    #[test]
    fn panics_become_opaque_500s() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

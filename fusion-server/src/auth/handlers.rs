use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, Uri, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use fusion_core::{
    ApiResponse, Credential, Identity, Operation, RequestMetadata, ResourceConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::middleware::{admit, extract_session_token};
use crate::infra::app_state::AppState;
use crate::infra::errors::{AppError, AppResult};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    #[serde(alias = "password")]
    pub secret: Zeroizing<String>,
}

impl LoginRequest {
    fn into_credential(self) -> Credential {
        Credential {
            username: self.username,
            secret: self.secret,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub subject: String,
    pub groups: BTreeSet<String>,
}

/// Verify credentials and open a session.
///
/// The token is set as an HttpOnly cookie and echoed in the body for
/// clients that prefer the `Authorization` header.
pub async fn login(State(state): State<AppState>, body: Bytes) -> AppResult<Response> {
    let request: LoginRequest = serde_json::from_slice(&body)
        .map_err(|_| AppError::bad_request("Expected a JSON body with username and secret"))?;
    let credential = request.into_credential();

    let identity = match state.authenticator.login(&credential).await {
        Ok(identity) => identity,
        Err(err) => {
            debug!(username = %credential.username, "login rejected");
            return Err(err.into());
        }
    };

    let session = state.sessions.open(identity).await?;
    let cookie = HeaderValue::from_str(&state.cookie.issue(session.token.as_str()))
        .map_err(AppError::internal)?;

    info!(subject = %session.identity.subject, "user logged in");

    let body = ApiResponse::success(LoginResponse {
        token: session.token.into_string(),
        identity: session.identity,
        expires_at: session.expires_at,
    });
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Revoke the caller's session in the store and clear the cookie.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let token = extract_session_token(&headers, &state.cookie.name)
        .ok_or_else(AppError::unauthorized)?;
    let identity = state
        .sessions
        .resolve(&token)
        .await?
        .ok_or_else(AppError::unauthorized)?;

    state.sessions.close(&token).await?;
    info!(subject = %identity.subject, "user logged out");

    let cookie = HeaderValue::from_str(&state.cookie.clear()).map_err(AppError::internal)?;
    let body = ApiResponse::<()>::success(()).with_message("Logged out".to_string());
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Return the identity behind the presented session or API key.
pub async fn identity(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<IdentityResponse>>> {
    let meta = RequestMetadata::new(method.as_str(), uri.path(), "auth", Operation::Retrieve);
    let identity = admit(&state, &headers, &ResourceConfig::default(), &meta, &[]).await?;

    Ok(Json(ApiResponse::success(IdentityResponse {
        subject: identity.subject,
        groups: identity.groups,
    })))
}

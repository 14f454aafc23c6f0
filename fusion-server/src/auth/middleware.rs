//! Request gate: credential extraction, identity resolution and
//! authorization, in that order.

use axum::http::{HeaderMap, header};
use fusion_core::{
    AuthorizeHook, FusionError, Identity, RequestMetadata, ResourceConfig,
};
use tracing::{debug, warn};

use crate::infra::app_state::AppState;
use crate::infra::errors::{AppError, AppResult};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Whatever the caller presented to identify itself.
#[derive(Clone, PartialEq, Eq)]
pub enum Presented {
    Session(String),
    ApiKey(String),
}

impl std::fmt::Debug for Presented {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Presented::Session(_) => f.write_str("Session(<redacted>)"),
            Presented::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
        }
    }
}

/// Bearer token first, then the session cookie, then an API key.
pub fn extract_credentials(headers: &HeaderMap, cookie_name: &str) -> Option<Presented> {
    if let Some(token) = extract_session_token(headers, cookie_name) {
        return Some(Presented::Session(token));
    }
    headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| Presented::ApiKey(key.to_string()))
}

pub fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    bearer_token(headers)
        .or_else(|| cookie_value(headers, cookie_name))
        .map(str::to_string)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}

/// Resolve presented credentials to an identity.
///
/// `Ok(None)` when nothing was presented or it did not resolve; `Err` only
/// when the session store failed.
pub async fn resolve_identity(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<Identity>, FusionError> {
    match extract_credentials(headers, &state.cookie.name) {
        Some(Presented::Session(token)) => state.sessions.resolve(&token).await,
        Some(Presented::ApiKey(key)) => {
            let identity = state.authenticator.client(&key);
            if identity.is_none() {
                debug!("unknown api key presented");
            }
            Ok(identity)
        }
        None => Ok(None),
    }
}

/// Run the gate for one request and return the identity it admits.
///
/// Unauthenticated callers of a resource requiring auth get 401; refused
/// identities get 403. Public resources admit everyone, falling back to the
/// anonymous identity when no valid credentials were presented.
pub async fn admit(
    state: &AppState,
    headers: &HeaderMap,
    config: &ResourceConfig,
    meta: &RequestMetadata,
    hooks: &[AuthorizeHook],
) -> AppResult<Identity> {
    let identity = match resolve_identity(state, headers).await {
        Ok(Some(identity)) => identity,
        Ok(None) if config.auth_required => {
            debug!(resource = %meta.resource, operation = %meta.operation, "unauthenticated request rejected");
            return Err(AppError::unauthorized());
        }
        Ok(None) => Identity::anonymous(),
        Err(err) if config.auth_required => return Err(err.into()),
        Err(err) => {
            warn!(error = %err, resource = %meta.resource, "session lookup failed; continuing anonymously");
            Identity::anonymous()
        }
    };

    if !state
        .authorizer
        .authorize_with(&identity, config, meta, hooks)
    {
        debug!(
            subject = %identity,
            resource = %meta.resource,
            operation = %meta.operation,
            "authorization refused"
        );
        return Err(AppError::forbidden());
    }

    Ok(identity)
}

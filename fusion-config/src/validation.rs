//! Field-level validation with precise key paths.

use fusion_core::auth::clients::parse_key_digest;
use fusion_core::SessionManager;
use fusion_core::auth::{BackendUser, ClientKey, validate_digest};
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use url::Url;

use crate::loader::error::ConfigLoadError;
use crate::models::sources::{FileClientConfig, FileUserConfig};

/// Seal keys shorter than this load, with a warning.
pub const RECOMMENDED_SEAL_KEY_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

pub(crate) fn duration(
    path: &str,
    raw: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let parsed = humantime::parse_duration(raw.trim())
        .map_err(|err| ConfigLoadError::invalid(path, err))?;
    if parsed.is_zero() {
        return Err(ConfigLoadError::invalid(path, "must be greater than zero"));
    }
    Ok(parsed)
}

/// A duration that must also fit a session lifetime.
pub(crate) fn session_ttl(
    path: &str,
    raw: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    let ttl = duration(path, raw, default)?;
    SessionManager::check_ttl(ttl).map_err(|err| ConfigLoadError::invalid(path, err))?;
    Ok(ttl)
}

pub(crate) fn non_empty(path: &str, value: &str) -> Result<String, ConfigLoadError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigLoadError::invalid(path, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn redis_url(path: &str, raw: &str) -> Result<String, ConfigLoadError> {
    let url = Url::parse(raw.trim()).map_err(|err| ConfigLoadError::invalid(path, err))?;
    match url.scheme() {
        "redis" | "rediss" | "redis+unix" | "unix" => Ok(raw.trim().to_string()),
        other => Err(ConfigLoadError::invalid(
            path,
            format!("unsupported scheme `{other}`"),
        )),
    }
}

/// Cookie names are RFC 6265 tokens.
pub(crate) fn cookie_name(path: &str, raw: &str) -> Result<String, ConfigLoadError> {
    let name = non_empty(path, raw)?;
    let valid = name.bytes().all(|b| {
        b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
    });
    if !valid {
        return Err(ConfigLoadError::invalid(path, "invalid cookie name"));
    }
    Ok(name)
}

/// Resource names become the first path segment of their routes.
pub(crate) fn resource_name(path: &str, name: &str) -> Result<(), ConfigLoadError> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if !valid {
        return Err(ConfigLoadError::invalid(
            path,
            "resource names may only contain letters, digits, `-` and `_`",
        ));
    }
    if matches!(name, "auth" | "info") {
        return Err(ConfigLoadError::invalid(path, "name is reserved"));
    }
    Ok(())
}

pub(crate) fn known_groups(
    path: &str,
    groups: &[String],
    declared: &BTreeSet<String>,
) -> Result<BTreeSet<String>, ConfigLoadError> {
    groups
        .iter()
        .enumerate()
        .map(|(index, group)| {
            let group = group.trim();
            if declared.contains(group) {
                Ok(group.to_string())
            } else {
                Err(ConfigLoadError::invalid(
                    format!("{path}[{index}]"),
                    format!("unknown group `{group}`"),
                ))
            }
        })
        .collect()
}

pub(crate) fn users(
    raw: &[FileUserConfig],
    declared: &BTreeSet<String>,
) -> Result<Vec<BackendUser>, ConfigLoadError> {
    let mut seen = HashSet::new();
    let mut users = Vec::with_capacity(raw.len());

    for (index, user) in raw.iter().enumerate() {
        let base = format!("auth.backend.users[{index}]");
        let username = non_empty(&format!("{base}.username"), &user.username)?;
        if !seen.insert(username.clone()) {
            return Err(ConfigLoadError::invalid(
                format!("{base}.username"),
                format!("duplicate user `{username}`"),
            ));
        }
        validate_digest(user.digest.trim())
            .map_err(|err| ConfigLoadError::invalid(format!("{base}.digest"), err))?;
        let groups = known_groups(&format!("{base}.groups"), &user.groups, declared)?;

        users.push(BackendUser {
            username,
            digest: user.digest.trim().to_string(),
            groups,
        });
    }

    Ok(users)
}

pub(crate) fn clients(
    raw: &[FileClientConfig],
    declared: &BTreeSet<String>,
) -> Result<Vec<ClientKey>, ConfigLoadError> {
    let mut seen = HashSet::new();
    let mut clients = Vec::with_capacity(raw.len());

    for (index, client) in raw.iter().enumerate() {
        let base = format!("auth.clients[{index}]");
        let name = non_empty(&format!("{base}.name"), &client.name)?;
        if !seen.insert(name.clone()) {
            return Err(ConfigLoadError::invalid(
                format!("{base}.name"),
                format!("duplicate client `{name}`"),
            ));
        }
        if parse_key_digest(&client.key_digest).is_none() {
            return Err(ConfigLoadError::invalid(
                format!("{base}.key_digest"),
                "expected 64 hex characters",
            ));
        }
        let groups = known_groups(&format!("{base}.groups"), &client.groups, declared)?;

        clients.push(ClientKey {
            name,
            key_digest: client.key_digest.trim().to_ascii_lowercase(),
            groups,
        });
    }

    Ok(clients)
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    pub redis: Option<FileRedisConfig>,
    #[serde(default)]
    pub session: FileSessionConfig,
    #[serde(default)]
    pub auth: FileAuthConfig,
    #[serde(default)]
    pub info: FileInfoConfig,
    #[serde(default)]
    pub resources: BTreeMap<String, FileResourceConfig>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileRedisConfig {
    pub url: String,
}

/// Durations are humantime strings such as `"12h"` or `"500ms"`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileSessionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure_cookie: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seal_key: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_timeout: Option<String>,
    #[serde(default)]
    pub backend: FileBackendConfig,
    #[serde(default)]
    pub clients: Vec<FileClientConfig>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileBackendConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default)]
    pub users: Vec<FileUserConfig>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileUserConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileClientConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub key_digest: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileInfoConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Defaults to false: the info endpoint is public unless stated otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_required: Option<bool>,
    #[serde(default)]
    pub required_groups: Vec<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileResourceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_required: Option<bool>,
    #[serde(default)]
    pub required_groups: Vec<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub redis_url: Option<String>,
    pub seal_key: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: non_empty_var("FUSION_CONFIG").map(PathBuf::from),
            server_host: non_empty_var("FUSION_HOST"),
            server_port: non_empty_var("FUSION_PORT").and_then(|s| s.parse().ok()),
            redis_url: non_empty_var("REDIS_URL"),
            seal_key: non_empty_var("FUSION_SEAL_KEY"),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

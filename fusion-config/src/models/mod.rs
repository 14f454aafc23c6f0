pub mod sources;

use fusion_core::auth::{BackendStrategy, BackendUser, ClientKey};
use fusion_core::authz::ResourceConfig;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use zeroize::Zeroizing;

/// Fully validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub redis: Option<RedisConfig>,
    pub session: SessionConfig,
    pub auth: AuthConfig,
    pub info: InfoConfig,
    pub resources: BTreeMap<String, ResourceConfig>,
    pub metadata: ConfigMetadata,
}

impl Config {
    /// Access policy for a resource; unlisted resources get the default
    /// (authenticated, no group restriction).
    pub fn resource(&self, name: &str) -> ResourceConfig {
        self.resources.get(name).cloned().unwrap_or_default()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ttl: Duration,
    pub cookie_name: String,
    pub secure_cookie: bool,
    pub store_timeout: Duration,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub seal_key: Zeroizing<String>,
    /// Every group name the deployment knows about
    pub groups: BTreeSet<String>,
    pub verify_timeout: Duration,
    pub backend: BackendConfig,
    pub clients: Vec<ClientKey>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("seal_key", &"<redacted>")
            .field("groups", &self.groups)
            .field("verify_timeout", &self.verify_timeout)
            .field("backend", &self.backend)
            .field("clients", &self.clients)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub strategy: BackendStrategy,
    pub users: Vec<BackendUser>,
}

/// Published by `GET /info`.
#[derive(Debug, Clone)]
pub struct InfoConfig {
    pub api: String,
    pub version: String,
    pub access: ResourceConfig,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

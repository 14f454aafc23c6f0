pub mod error;

use fusion_core::auth::BackendStrategy;
use fusion_core::authz::ResourceConfig;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use zeroize::Zeroizing;

use crate::models::sources::{EnvConfig, FileConfig};
use crate::models::{
    AuthConfig, BackendConfig, Config, ConfigMetadata, InfoConfig, RedisConfig,
    ServerConfig, SessionConfig,
};
use crate::validation::{self, ConfigWarnings, RECOMMENDED_SEAL_KEY_LEN};
use error::ConfigLoadError;

const DEFAULT_CONFIG_LOCATIONS: &[&str] = &["fusion.toml", "config/fusion.toml"];

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_COOKIE_NAME: &str = "fusion_session";
pub const DEFAULT_API_NAME: &str = "fusion";

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    /// Use these values instead of reading the process environment
    pub env: Option<EnvConfig>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn with_env(mut self, env: EnvConfig) -> Self {
        self.options.env = Some(env);
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let (env, env_file_loaded) = match &self.options.env {
            Some(env) => (env.clone(), false),
            None => {
                let loaded = self.load_env_file()?;
                (EnvConfig::gather(), loaded)
            }
        };

        let (file, config_path) = self.load_file_config(&env)?;
        let mut load = compose(file, &env, config_path.is_some())?;
        load.config.metadata = ConfigMetadata {
            config_path,
            env_file_loaded,
        };
        Ok(load)
    }

    /// Compose a configuration from TOML text, still honouring environment
    /// overrides.
    pub fn load_str(&self, contents: &str) -> Result<ConfigLoad, ConfigLoadError> {
        let env = self.options.env.clone().unwrap_or_else(EnvConfig::gather);
        let file: FileConfig =
            toml::from_str(contents).map_err(|source| ConfigLoadError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        compose(Some(file), &env, true)
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        let outcome = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path),
            None => dotenvy::dotenv().map(|_| ()),
        };
        match outcome {
            Ok(()) => Ok(true),
            Err(dotenvy::Error::Io(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            Some(path) => path,
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => path,
                None => return Ok((None, None)),
            },
        };

        let contents = fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
            path: path.clone(),
            source,
        })?;
        let file: FileConfig =
            toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
                path: path.clone(),
                source,
            })?;

        Ok((Some(file), Some(path)))
    }
}

fn compose(
    file: Option<FileConfig>,
    env: &EnvConfig,
    config_present: bool,
) -> Result<ConfigLoad, ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();
    if !config_present {
        warnings.push_with_hint(
            "No fusion.toml detected; falling back to environment variables",
            "Create fusion.toml or pass --config to declare users and resources",
        );
    }

    let FileConfig {
        server: file_server,
        redis: file_redis,
        session: file_session,
        auth: file_auth,
        info: file_info,
        resources: file_resources,
    } = file.unwrap_or_default();

    let server = ServerConfig {
        host: env
            .server_host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: env.server_port.or(file_server.port).unwrap_or(DEFAULT_PORT),
    };

    let redis = match env.redis_url.as_deref() {
        Some(url) => Some(RedisConfig {
            url: validation::redis_url("REDIS_URL", url)?,
        }),
        None => file_redis
            .map(|r| validation::redis_url("redis.url", &r.url).map(|url| RedisConfig { url }))
            .transpose()?,
    };
    if redis.is_none() {
        warnings.push_with_hint(
            "Redis not configured; sessions are kept in process memory",
            "Set REDIS_URL or [redis] url to share sessions between instances",
        );
    }

    let session = SessionConfig {
        ttl: validation::session_ttl(
            "session.ttl",
            file_session.ttl.as_deref(),
            DEFAULT_SESSION_TTL,
        )?,
        cookie_name: match file_session.cookie_name.as_deref() {
            Some(name) => validation::cookie_name("session.cookie_name", name)?,
            None => DEFAULT_COOKIE_NAME.to_string(),
        },
        secure_cookie: file_session.secure_cookie.unwrap_or(false),
        store_timeout: validation::duration(
            "session.store_timeout",
            file_session.store_timeout.as_deref(),
            DEFAULT_STORE_TIMEOUT,
        )?,
    };

    let seal_key = match env.seal_key.clone().or(file_auth.seal_key) {
        Some(key) if !key.is_empty() => Zeroizing::new(key),
        _ => {
            return Err(ConfigLoadError::invalid(
                "auth.seal_key",
                "must not be empty (set it or FUSION_SEAL_KEY)",
            ));
        }
    };
    if seal_key.len() < RECOMMENDED_SEAL_KEY_LEN {
        warnings.push_with_hint(
            format!("auth.seal_key is shorter than {RECOMMENDED_SEAL_KEY_LEN} characters"),
            "Generate a longer random key; rotating it logs every session out",
        );
    }

    let mut groups = BTreeSet::new();
    for (index, group) in file_auth.groups.iter().enumerate() {
        groups.insert(validation::non_empty(&format!("auth.groups[{index}]"), group)?);
    }

    let strategy = match file_auth.backend.strategy.as_deref() {
        Some(raw) => raw
            .parse::<BackendStrategy>()
            .map_err(|reason| ConfigLoadError::invalid("auth.backend.strategy", reason))?,
        None => BackendStrategy::Basic,
    };
    let users = validation::users(&file_auth.backend.users, &groups)?;
    if users.is_empty() {
        return Err(ConfigLoadError::invalid(
            "auth.backend.users",
            "at least one user is required",
        ));
    }
    let clients = validation::clients(&file_auth.clients, &groups)?;

    let auth = AuthConfig {
        seal_key,
        verify_timeout: validation::duration(
            "auth.verify_timeout",
            file_auth.verify_timeout.as_deref(),
            DEFAULT_VERIFY_TIMEOUT,
        )?,
        backend: BackendConfig { strategy, users },
        clients,
        groups,
    };

    let info = InfoConfig {
        api: match file_info.api.as_deref() {
            Some(api) => validation::non_empty("info.api", api)?,
            None => DEFAULT_API_NAME.to_string(),
        },
        version: match file_info.version.as_deref() {
            Some(version) => validation::non_empty("info.version", version)?,
            None => env!("CARGO_PKG_VERSION").to_string(),
        },
        access: ResourceConfig {
            auth_required: file_info.auth_required.unwrap_or(false),
            required_groups: validation::known_groups(
                "info.required_groups",
                &file_info.required_groups,
                &auth.groups,
            )?,
        },
    };

    let mut resources = BTreeMap::new();
    for (name, raw) in file_resources {
        let base = format!("resources.{name}");
        validation::resource_name(&base, &name)?;
        let required_groups = validation::known_groups(
            &format!("{base}.required_groups"),
            &raw.required_groups,
            &auth.groups,
        )?;
        let config = ResourceConfig {
            auth_required: raw.auth_required.unwrap_or(true),
            required_groups,
        };
        if !config.auth_required && !config.required_groups.is_empty() {
            warnings.push(format!(
                "{base}.required_groups is ignored because auth_required is false"
            ));
        }
        resources.insert(name, config);
    }

    Ok(ConfigLoad {
        config: Config {
            server,
            redis,
            session,
            auth,
            info,
            resources,
            metadata: ConfigMetadata::default(),
        },
        warnings,
    })
}

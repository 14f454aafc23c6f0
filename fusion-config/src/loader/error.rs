use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// A value parsed but failed validation. `path` is the dotted location
    /// of the offending key, e.g. `auth.backend.users[0].digest`.
    #[error("{path}: {reason}")]
    Invalid { path: String, reason: String },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

impl ConfigLoadError {
    pub(crate) fn invalid(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        ConfigLoadError::Invalid {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Dotted key path for validation failures.
    pub fn key_path(&self) -> Option<&str> {
        match self {
            ConfigLoadError::Invalid { path, .. } => Some(path),
            _ => None,
        }
    }
}

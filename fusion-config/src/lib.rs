//! Configuration for Fusion.
//!
//! A TOML file (`fusion.toml`, `config/fusion.toml`, or an explicit path)
//! is layered under environment overrides and validated in one pass.
//! Anything that would fail at request time fails here instead, with the
//! dotted path of the offending key.

#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, ConfigLoaderOptions, error::ConfigLoadError};
pub use models::sources::{EnvConfig, FileConfig};
pub use models::{
    AuthConfig, BackendConfig, Config, ConfigMetadata, InfoConfig, RedisConfig,
    ServerConfig, SessionConfig,
};
pub use validation::{ConfigWarning, ConfigWarnings};

use std::sync::Arc;

use anyhow::Context;
use fusion_config::Config;
use fusion_core::auth::{BackendStrategy, BasicBackend, ClientRegistry, CredentialBackend};
use fusion_core::session::RedisSessionStore;
use fusion_core::{
    Authenticator, Info, InMemorySessionStore, SessionManager, SessionSealer, SessionStore,
};
use tracing::{info, warn};

use super::app_state::{AppState, CookieSettings};

/// Connect the configured session store, or fall back to process memory.
pub async fn connect_session_store(config: &Config) -> anyhow::Result<Arc<dyn SessionStore>> {
    match &config.redis {
        Some(redis) => {
            let store = RedisSessionStore::connect(&redis.url)
                .await
                .context("failed to connect the redis session store")?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("No redis configured; sessions will not survive a restart or be shared");
            Ok(Arc::new(InMemorySessionStore::new()))
        }
    }
}

pub fn build_backend(config: &Config) -> anyhow::Result<CredentialBackend> {
    let backend = match config.auth.backend.strategy {
        BackendStrategy::Basic => CredentialBackend::Basic(
            BasicBackend::new(config.auth.backend.users.iter().cloned())
                .context("invalid auth.backend")?,
        ),
    };
    Ok(backend)
}

/// Assemble the shared application state from validated configuration.
///
/// Derives the sealing key once; this is the slow step of startup.
pub fn build_state(config: &Config, store: Arc<dyn SessionStore>) -> anyhow::Result<AppState> {
    let clients = ClientRegistry::new(config.auth.clients.iter().cloned())
        .context("invalid auth.clients")?;
    let authenticator = Authenticator::new(build_backend(config)?)
        .with_clients(clients)
        .with_verify_timeout(config.auth.verify_timeout);

    let sealer = SessionSealer::new(config.auth.seal_key.as_bytes())
        .context("failed to derive the session sealing key")?;
    let sessions = SessionManager::new(Arc::new(sealer), store)
        .with_ttl(config.session.ttl)
        .context("invalid session.ttl")?
        .with_store_timeout(config.session.store_timeout);

    let cookie = CookieSettings::new(config.session.cookie_name.clone(), config.session.ttl)
        .secure(config.session.secure_cookie);

    info!(
        strategy = %authenticator.backend().strategy(),
        users = config.auth.backend.users.len(),
        clients = config.auth.clients.len(),
        session_ttl = ?config.session.ttl,
        "authentication configured"
    );

    Ok(AppState::new(authenticator, sessions)
        .with_cookie(cookie)
        .with_info(
            Info::new(config.info.api.clone(), config.info.version.clone()),
            config.info.access.clone(),
        ))
}

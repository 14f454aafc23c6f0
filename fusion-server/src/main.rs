//! # Fusion Server
//!
//! Serves the auth, info and reference case APIs configured in
//! `fusion.toml`, and carries the small tools needed to write that file.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use fusion_config::{ConfigLoad, ConfigLoader};
use fusion_core::auth::{digest_api_key, generate_api_key, hash_secret};
use fusion_server::{
    cases::{CaseHooks, InMemoryCaseStore, RESOURCE_NAME},
    infra::startup,
    resources::ResourceApi,
    routes,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroizing;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "fusion-server")]
#[command(about = "Authenticated REST resource server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Path to the configuration file
    #[arg(short, long, env = "FUSION_CONFIG")]
    config: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the server (default)
    Serve(ServeArgs),
    /// Print an Argon2id digest for a `[[auth.backend.users]]` entry
    HashPassword {
        /// Secret to hash; read from stdin when omitted
        #[arg(long)]
        secret: Option<String>,
    },
    /// Print a new API key and the digest to put in `[[auth.clients]]`
    GenerateClientKey,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Serve(args)) => run_server(args).await,
        Some(Command::HashPassword { secret }) => hash_password(secret),
        Some(Command::GenerateClientKey) => generate_client_key(),
        None => run_server(cli.serve).await,
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fusion_server=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    init_tracing();

    let mut loader = ConfigLoader::new();
    if let Some(path) = args.config.clone() {
        loader = loader.with_config_path(path);
    }
    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration loaded");
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    let store = startup::connect_session_store(&config).await?;
    let state = startup::build_state(&config, store)?;

    let case_api = ResourceApi::new(
        RESOURCE_NAME,
        Arc::new(CaseHooks::new(InMemoryCaseStore::new())),
    )
    .with_config(config.resource(RESOURCE_NAME));
    let app = routes::create_app(state.clone(), [case_api.into_router(state)]);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(address = %addr, "fusion server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("fusion server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn hash_password(secret: Option<String>) -> anyhow::Result<()> {
    let secret = match secret {
        Some(secret) => Zeroizing::new(secret),
        None => {
            let mut line = Zeroizing::new(String::new());
            io::stdin()
                .lock()
                .read_line(&mut line)
                .context("failed to read secret from stdin")?;
            Zeroizing::new(line.trim_end_matches(['\r', '\n']).to_string())
        }
    };
    if secret.is_empty() {
        anyhow::bail!("secret must not be empty");
    }

    let digest = hash_secret(&secret).context("failed to hash secret")?;
    println!("{digest}");
    Ok(())
}

fn generate_client_key() -> anyhow::Result<()> {
    let key = Zeroizing::new(generate_api_key().context("failed to generate api key")?);
    println!("api_key    = {}", key.as_str());
    println!("key_digest = {}", digest_api_key(&key));
    Ok(())
}

//! # Fusion Server
//!
//! Authenticated REST resources on axum.
//!
//! ## Overview
//!
//! - **Login**: `POST /auth/login` verifies credentials against the
//!   configured backend and opens a sealed session (cookie + body token)
//! - **Gate**: every resource request resolves a session or API key, checks
//!   group access, and only then reaches the resource hooks
//! - **Resources**: [`resources::ResourceApi`] turns a
//!   [`fusion_core::ResourceHooks`] implementation into five routes
//! - **Info**: `GET /info` publishes the API name and version
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fusion_server::{cases, infra::startup, resources::ResourceApi, routes};
//!
//! async fn run(config: fusion_config::Config) -> anyhow::Result<()> {
//!     let store = startup::connect_session_store(&config).await?;
//!     let state = startup::build_state(&config, store)?;
//!
//!     let hooks = Arc::new(cases::CaseHooks::new(cases::InMemoryCaseStore::new()));
//!     let case_api = ResourceApi::new(cases::RESOURCE_NAME, hooks)
//!         .with_config(config.resource(cases::RESOURCE_NAME));
//!
//!     let app = routes::create_app(state.clone(), [case_api.into_router(state)]);
//!     let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cases;
pub mod infra;
pub mod resources;
pub mod routes;

pub use infra::app_state::AppState;
pub use infra::errors::{AppError, AppResult};

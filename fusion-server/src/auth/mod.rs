pub mod handlers;
pub mod middleware;

use axum::{
    Router,
    routing::{get, post},
};

use crate::infra::app_state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/identity", get(handlers::identity))
}

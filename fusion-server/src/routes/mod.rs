use axum::{Router, routing::get};
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::auth::auth_routes;
use crate::infra::app_state::AppState;
use crate::infra::errors::{AppError, panic_response};
use crate::resources::info::info;

/// Build the application: auth and info endpoints plus every registered
/// resource router.
pub fn create_app<I>(state: AppState, resources: I) -> Router
where
    I: IntoIterator<Item = Router>,
{
    let mut app = Router::new()
        .merge(auth_routes())
        .route("/info", get(info))
        .with_state(state);

    for resource in resources {
        app = app.merge(resource);
    }

    // Tracing wraps panic recovery so the resulting 500 is recorded.
    app.fallback(not_found).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::custom(panic_response)),
    )
}

async fn not_found() -> AppError {
    AppError::not_found("Not found")
}

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, Method, Uri},
};
use fusion_core::{ApiResponse, Info, Operation, RequestMetadata};

use crate::auth::middleware::admit;
use crate::infra::app_state::AppState;
use crate::infra::errors::AppResult;

/// `GET /info`: API name and version, behind the configured info policy.
pub async fn info(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<Info>>> {
    let meta = RequestMetadata::new(method.as_str(), uri.path(), "info", Operation::Retrieve);
    admit(&state, &headers, &state.info_access, &meta, &[]).await?;
    Ok(Json(ApiResponse::success(Info::clone(&state.info))))
}

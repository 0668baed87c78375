use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use cellar_protocol::{endpoints, ErrorResponse};

use crate::handler::{self, AppState};

/// Build the axum router with all Cellar endpoints.
pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route(endpoints::HEALTH, get(handler::health_handler))
        .route(endpoints::INFO, get(handler::info_handler))
        .route(endpoints::NAMESPACES, get(handler::namespaces_handler))
        .route(endpoints::CELL, post(handler::put_cell_handler))
        .route(endpoints::CELL_LATEST, get(handler::get_latest_handler))
        .route(endpoints::CELL_VERSION, get(handler::get_version_handler))
        .layer(middleware::from_fn_with_state(state.clone(), enforce_deadline))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Abandon requests that outlive the configured timeout.
///
/// Dropping the handler future is safe for puts: an insert either commits
/// in full or leaves nothing behind, and the cell's write lock is released
/// with the future.
async fn enforce_deadline(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    match tokio::time::timeout(state.request_timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            let after_ms = u64::try_from(state.request_timeout.as_millis()).unwrap_or(u64::MAX);
            tracing::warn!(%method, %uri, after_ms, "request timed out");
            (StatusCode::REQUEST_TIMEOUT, Json(ErrorResponse::timeout(after_ms))).into_response()
        }
    }
}

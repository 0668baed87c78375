use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use tracing::debug;

use cellar_engine::{CellEngine, CellRecord, EngineError};
use cellar_protocol::{
    CellResponse, HealthResponse, InfoResponse, NamespacesResponse, ProtocolError,
    PutCellRequest, PROTOCOL_VERSION,
};
use cellar_store::CellRepository;

use crate::config::StorageBackend;
use crate::error::ServerResult;

/// Shared state of every request handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub engine: CellEngine,
    pub backend: StorageBackend,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(engine: CellEngine, backend: StorageBackend) -> Self {
        Self {
            engine,
            backend,
            request_timeout: Duration::from_secs(10),
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Path parameters of a cell.
type CellPath = Path<(String, String, String)>;

fn respond(record: CellRecord) -> ServerResult<Json<CellResponse>> {
    Ok(Json(CellResponse::from_record(&record)?))
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "cellar-server".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        protocol_version: PROTOCOL_VERSION,
        storage_backend: state.backend.as_str().into(),
    })
}

pub async fn namespaces_handler(
    State(state): State<AppState>,
) -> ServerResult<Json<NamespacesResponse>> {
    let namespaces = state
        .engine
        .repository()
        .namespaces()
        .await
        .map_err(EngineError::from)?;
    Ok(Json(NamespacesResponse {
        namespaces: namespaces.iter().map(|ns| ns.as_str().to_string()).collect(),
    }))
}

/// GetLatestCell.
pub async fn get_latest_handler(
    State(state): State<AppState>,
    Path((namespace, row_key, column_key)): CellPath,
) -> ServerResult<Json<CellResponse>> {
    debug!(%namespace, %row_key, %column_key, "get latest");
    let record = state
        .engine
        .get_latest(&namespace, &row_key, &column_key)
        .await?;
    respond(record)
}

/// GetCell. `ref_key` arrives as text so that a non-numeric value is
/// reported in the regular error envelope.
pub async fn get_version_handler(
    State(state): State<AppState>,
    Path((namespace, row_key, column_key, ref_key)): Path<(String, String, String, String)>,
) -> ServerResult<Json<CellResponse>> {
    debug!(%namespace, %row_key, %column_key, %ref_key, "get version");
    let ref_key: i64 = ref_key.parse().map_err(|_| {
        EngineError::InvalidArgument(format!("ref_key must be an integer, got {ref_key:?}"))
    })?;
    let record = state
        .engine
        .get_exact(&namespace, &row_key, &column_key, ref_key)
        .await?;
    respond(record)
}

/// PutCell. Responds `201 Created` with the new version.
pub async fn put_cell_handler(
    State(state): State<AppState>,
    Path((namespace, row_key, column_key)): CellPath,
    request: Result<Json<PutCellRequest>, JsonRejection>,
) -> ServerResult<(StatusCode, Json<CellResponse>)> {
    let Json(request) =
        request.map_err(|rejection| ProtocolError::MalformedBody(rejection.body_text()))?;
    let body = request.document()?;
    let record = state
        .engine
        .put(&namespace, &row_key, &column_key, &body)
        .await?;
    debug!(
        %namespace,
        %row_key,
        %column_key,
        ref_key = record.ref_key().get(),
        "cell written"
    );
    let Json(response) = respond(record)?;
    Ok((StatusCode::CREATED, Json(response)))
}

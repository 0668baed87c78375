use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use cellar_engine::{EngineError, ErrorKind};
use cellar_protocol::{ErrorResponse, ProtocolError};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("store error: {0}")]
    Store(#[from] cellar_store::StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// HTTP status for an engine error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::NamespaceNotFound | ErrorKind::CellNotFound => StatusCode::NOT_FOUND,
        ErrorKind::MalformedBody => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Conflict => StatusCode::CONFLICT,
    }
}

impl ServerError {
    /// The client-facing kind, if this error has one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ServerError::Engine(e) => Some(e.kind()),
            ServerError::Protocol(e) => Some(e.kind()),
            ServerError::Store(_) => Some(ErrorKind::StorageUnavailable),
            ServerError::Config(_) | ServerError::Io(_) | ServerError::Internal(_) => None,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match self.kind() {
            Some(kind) => (status_for(kind), ErrorResponse::new(kind, self.to_string())),
            None => {
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::internal(self.to_string()),
                )
            }
        };
        if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::warn!(error = %self, "storage unavailable");
        }
        (status, Json(body)).into_response()
    }
}

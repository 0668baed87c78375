use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use cellar_engine::{CellRecord, EngineError, ErrorKind};
use cellar_types::{Document, TypeError};

use crate::error::{ProtocolError, ProtocolResult};

pub const PROTOCOL_VERSION: u32 = 1;

/// Kind string used for requests abandoned after the server deadline.
pub const TIMEOUT_KIND: &str = "Timeout";

/// Kind string for server faults outside the engine taxonomy.
pub const INTERNAL_KIND: &str = "Internal";

/// Numeric error codes, following the canonical RPC status codes.
pub mod codes {
    pub const INVALID_ARGUMENT: u32 = 3;
    pub const DEADLINE_EXCEEDED: u32 = 4;
    pub const NOT_FOUND: u32 = 5;
    pub const ABORTED: u32 = 10;
    pub const INTERNAL: u32 = 13;
    pub const UNAVAILABLE: u32 = 14;
    pub const DATA_LOSS: u32 = 15;
}

/// Wire code of an engine error kind.
pub fn error_code(kind: ErrorKind) -> u32 {
    match kind {
        ErrorKind::InvalidArgument => codes::INVALID_ARGUMENT,
        ErrorKind::NamespaceNotFound | ErrorKind::CellNotFound => codes::NOT_FOUND,
        ErrorKind::MalformedBody => codes::DATA_LOSS,
        ErrorKind::StorageUnavailable => codes::UNAVAILABLE,
        ErrorKind::Conflict => codes::ABORTED,
    }
}

/// Render a timestamp as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_timestamp(value: &str) -> ProtocolResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ProtocolError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Parse a transport body: JSON text whose top level is an object.
pub fn body_from_text(text: &str) -> ProtocolResult<Document> {
    let doc = Document::from_json_str(text).map_err(|e| match e {
        TypeError::MalformedBody(reason) => ProtocolError::MalformedBody(reason),
        other => ProtocolError::MalformedBody(other.to_string()),
    })?;
    if !doc.is_map() {
        return Err(ProtocolError::BodyNotObject {
            found: doc.type_name(),
        });
    }
    Ok(doc)
}

pub fn body_to_text(doc: &Document) -> ProtocolResult<String> {
    doc.to_json_string().map_err(|e| match e {
        TypeError::UnencodableBody(reason) => ProtocolError::Encoding(reason),
        other => ProtocolError::Encoding(other.to_string()),
    })
}

/// Body of a PutCell request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutCellRequest {
    /// The record as JSON text.
    pub body: String,
}

impl PutCellRequest {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    pub fn document(&self) -> ProtocolResult<Document> {
        body_from_text(&self.body)
    }
}

/// Version metadata plus body, returned by all three cell calls.
///
/// `added_id` is sent as a decimal string so clients that parse JSON
/// numbers as doubles do not lose precision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellResponse {
    pub added_id: String,
    pub row_key: String,
    pub column_key: String,
    pub ref_key: u64,
    pub body: String,
    pub created_at: String,
}

impl CellResponse {
    pub fn from_record(record: &CellRecord) -> ProtocolResult<Self> {
        let version = &record.version;
        Ok(Self {
            added_id: version.added_id.to_string(),
            row_key: version.row_key.as_str().to_string(),
            column_key: version.column_key.as_str().to_string(),
            ref_key: version.ref_key.get(),
            body: body_to_text(&record.body)?,
            created_at: format_timestamp(&version.created_at),
        })
    }

    pub fn added_id(&self) -> ProtocolResult<u64> {
        self.added_id
            .parse()
            .map_err(|_| ProtocolError::InvalidAddedId(self.added_id.clone()))
    }

    pub fn document(&self) -> ProtocolResult<Document> {
        body_from_text(&self.body)
    }

    pub fn created_at(&self) -> ProtocolResult<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub code: u32,
    pub message: String,
}

/// Envelope for every error response: `{"error": {...}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl ErrorResponse {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                kind: kind.as_str().to_string(),
                code: error_code(kind),
                message: message.into(),
            },
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                kind: INTERNAL_KIND.to_string(),
                code: codes::INTERNAL,
                message: message.into(),
            },
        }
    }

    pub fn timeout(after_ms: u64) -> Self {
        Self {
            error: ErrorBody {
                kind: TIMEOUT_KIND.to_string(),
                code: codes::DEADLINE_EXCEEDED,
                message: format!("request abandoned after {after_ms} ms"),
            },
        }
    }
}

impl From<&EngineError> for ErrorResponse {
    fn from(err: &EngineError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<&ProtocolError> for ErrorResponse {
    fn from(err: &ProtocolError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

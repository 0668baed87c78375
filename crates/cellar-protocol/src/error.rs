use cellar_engine::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("body is not valid JSON: {0}")]
    MalformedBody(String),

    #[error("body must be a JSON object, got {found}")]
    BodyNotObject { found: &'static str },

    #[error("body cannot be rendered as JSON: {0}")]
    Encoding(String),

    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("invalid added_id {0:?}")]
    InvalidAddedId(String),
}

impl ProtocolError {
    /// Error kind reported to the client when a request fails to convert.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::MalformedBody(_)
            | ProtocolError::BodyNotObject { .. }
            | ProtocolError::Encoding(_) => ErrorKind::MalformedBody,
            ProtocolError::InvalidTimestamp { .. } | ProtocolError::InvalidAddedId(_) => {
                ErrorKind::InvalidArgument
            }
        }
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

use thiserror::Error;

/// Errors produced by type construction and body encoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid namespace {name:?}: {reason}")]
    InvalidNamespace { name: String, reason: String },

    #[error("invalid {field}: {reason}")]
    InvalidKey { field: &'static str, reason: String },

    #[error("ref_key must be a positive integer, got {0}")]
    InvalidRefKey(i64),

    /// Stored or supplied bytes are not a valid encoded document.
    #[error("malformed body: {0}")]
    MalformedBody(String),

    /// The document cannot be represented in the storage encoding.
    #[error("unencodable body: {0}")]
    UnencodableBody(String),
}

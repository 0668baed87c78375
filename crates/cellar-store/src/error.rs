use std::path::PathBuf;

use cellar_types::{CellAddress, Namespace, RefKey};

/// Errors from cell repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The namespace has not been created in this repository.
    #[error("namespace not found: {0}")]
    NamespaceNotFound(Namespace),

    /// No version exists for the requested cell (or the requested version).
    #[error("cell not found: {address} @ {}", fmt_ref(.ref_key, "latest"))]
    CellNotFound {
        address: CellAddress,
        ref_key: Option<RefKey>,
    },

    /// An insert carried a ref_key that is not the successor of the
    /// current maximum for its cell (duplicate or gap).
    #[error("version conflict on {address}: attempted {attempted}, current max {}", fmt_ref(.current, "none"))]
    VersionConflict {
        address: CellAddress,
        attempted: RefKey,
        current: Option<RefKey>,
    },

    /// A segment file failed its integrity check during recovery.
    #[error("corrupt segment {path}: {reason} at offset {offset}")]
    CorruptSegment {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    /// Serialization or deserialization failure of a stored record.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend is otherwise unusable (poisoned lock, lost worker).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns `true` for failures of the storage medium itself, as opposed
    /// to absence or sequencing outcomes.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::CorruptSegment { .. }
                | StoreError::Serialization(_)
                | StoreError::Io(_)
                | StoreError::Unavailable(_)
        )
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

fn fmt_ref(ref_key: &Option<RefKey>, absent: &str) -> String {
    match ref_key {
        Some(r) => r.to_string(),
        None => absent.to_string(),
    }
}

pub(crate) fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Unavailable(format!("lock poisoned: {e}"))
}

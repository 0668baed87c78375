use std::fmt;

use cellar_store::StoreError;
use cellar_types::{CellAddress, Namespace, RefKey, TypeError};

/// The externally visible error categories.
///
/// Every [`EngineError`] maps to exactly one kind; the transport layer maps
/// kinds to its own status signalling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NamespaceNotFound,
    CellNotFound,
    MalformedBody,
    StorageUnavailable,
    Conflict,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::NamespaceNotFound => "NamespaceNotFound",
            ErrorKind::CellNotFound => "CellNotFound",
            ErrorKind::MalformedBody => "MalformedBody",
            ErrorKind::StorageUnavailable => "StorageUnavailable",
            ErrorKind::Conflict => "Conflict",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by [`CellEngine`](crate::CellEngine) operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Caller supplied a malformed argument. Never retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("namespace not found: {0}")]
    NamespaceNotFound(Namespace),

    /// The cell (or the requested version) does not exist.
    #[error("cell not found: {address}{}", .ref_key.map(|r| format!(" @ {r}")).unwrap_or_default())]
    CellNotFound {
        address: CellAddress,
        ref_key: Option<RefKey>,
    },

    /// Body bytes could not be decoded, or a supplied document cannot be
    /// encoded.
    #[error("malformed body: {0}")]
    MalformedBody(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),

    /// Concurrent writers kept winning the race for the next version.
    #[error("write conflict on {address} after {attempts} attempts")]
    Conflict { address: CellAddress, attempts: u32 },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            EngineError::NamespaceNotFound(_) => ErrorKind::NamespaceNotFound,
            EngineError::CellNotFound { .. } => ErrorKind::CellNotFound,
            EngineError::MalformedBody(_) => ErrorKind::MalformedBody,
            EngineError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            EngineError::Conflict { .. } => ErrorKind::Conflict,
        }
    }
}

impl From<TypeError> for EngineError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::MalformedBody(reason) | TypeError::UnencodableBody(reason) => {
                EngineError::MalformedBody(reason)
            }
            other => EngineError::InvalidArgument(other.to_string()),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NamespaceNotFound(ns) => EngineError::NamespaceNotFound(ns),
            StoreError::CellNotFound { address, ref_key } => {
                EngineError::CellNotFound { address, ref_key }
            }
            StoreError::VersionConflict { address, .. } => {
                EngineError::Conflict { address, attempts: 1 }
            }
            other => EngineError::StorageUnavailable(other),
        }
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> CellAddress {
        CellAddress::parse("users", "R1", "BASIC_INFO").unwrap()
    }

    #[test]
    fn type_errors_split_by_kind() {
        let e: EngineError = TypeError::InvalidRefKey(0).into();
        assert_eq!(e.kind(), ErrorKind::InvalidArgument);

        let e: EngineError = TypeError::MalformedBody("eof".into()).into();
        assert_eq!(e.kind(), ErrorKind::MalformedBody);

        let e: EngineError = TypeError::UnencodableBody("nan".into()).into();
        assert_eq!(e.kind(), ErrorKind::MalformedBody);
    }

    #[test]
    fn store_errors_keep_kind() {
        let ns = Namespace::new("users").unwrap();
        let e: EngineError = StoreError::NamespaceNotFound(ns).into();
        assert_eq!(e.kind(), ErrorKind::NamespaceNotFound);

        let e: EngineError = StoreError::CellNotFound {
            address: addr(),
            ref_key: None,
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::CellNotFound);

        let e: EngineError = StoreError::Unavailable("disk gone".into()).into();
        assert_eq!(e.kind(), ErrorKind::StorageUnavailable);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "EIO");
        let e: EngineError = StoreError::Io(io).into();
        assert_eq!(e.kind(), ErrorKind::StorageUnavailable);
    }

    #[test]
    fn display_includes_version() {
        let e = EngineError::CellNotFound {
            address: addr(),
            ref_key: Some(RefKey::new(3).unwrap()),
        };
        assert_eq!(e.to_string(), "cell not found: users/R1/BASIC_INFO @ 3");
        assert_eq!(ErrorKind::Conflict.to_string(), "Conflict");
    }
}

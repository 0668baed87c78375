use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cellar_types::{AddedId, ColumnKey, RefKey, RowKey};

/// One immutable, stored version of a cell.
///
/// `body` is kept in its opaque encoded form; decoding happens above the
/// repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellVersion {
    pub added_id: AddedId,
    pub row_key: RowKey,
    pub column_key: ColumnKey,
    pub ref_key: RefKey,
    pub body: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl CellVersion {
    /// Size of the encoded body in bytes.
    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}

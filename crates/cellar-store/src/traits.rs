use async_trait::async_trait;

use cellar_types::{CellAddress, Namespace, RefKey};

use crate::cell::CellVersion;
use crate::error::StoreResult;
use crate::locks::PairGuard;

/// Durable, ordered storage of cell versions, partitioned by namespace.
///
/// All implementations must satisfy these invariants:
/// - Versions are immutable once inserted. There is no update or delete.
/// - For every cell, stored ref_keys form the gapless sequence 1, 2, 3, ...
///   `insert` rejects any ref_key that is not the successor of the current
///   maximum with [`StoreError::VersionConflict`](crate::StoreError).
/// - `added_id` is strictly increasing per namespace and never reused.
/// - A successful `insert` is visible to every later read in the namespace.
/// - A failed or abandoned `insert` leaves nothing behind.
/// - Operations on an unknown namespace fail with `NamespaceNotFound`.
#[async_trait]
pub trait CellRepository: Send + Sync {
    /// Append a new version of `address` with the given `ref_key`.
    ///
    /// The repository assigns `added_id` and `created_at`.
    async fn insert(
        &self,
        address: &CellAddress,
        ref_key: RefKey,
        body: Vec<u8>,
    ) -> StoreResult<CellVersion>;

    /// Look up one exact version. `CellNotFound` if it does not exist.
    async fn find_exact(&self, address: &CellAddress, ref_key: RefKey) -> StoreResult<CellVersion>;

    /// The version with the highest ref_key. `CellNotFound` if the cell has
    /// never been written.
    async fn find_latest(&self, address: &CellAddress) -> StoreResult<CellVersion>;

    /// Highest existing ref_key of the cell, or `None` when it has no
    /// versions.
    async fn max_ref_key(&self, address: &CellAddress) -> StoreResult<Option<RefKey>>;

    /// Open the write scope for one cell.
    ///
    /// While the returned guard is alive, no other caller holding a guard
    /// for the same address can run its `max_ref_key` + `insert` sequence.
    /// Backends without a lock table keep the default, which returns an
    /// unlocked guard and leaves serialization to the `insert` check.
    async fn lock_pair(&self, _address: &CellAddress) -> StoreResult<PairGuard> {
        Ok(PairGuard::unlocked())
    }

    /// Create a namespace. Returns `false` if it already existed.
    async fn create_namespace(&self, namespace: &Namespace) -> StoreResult<bool>;

    /// All namespaces, sorted by name.
    async fn namespaces(&self) -> StoreResult<Vec<Namespace>>;
}

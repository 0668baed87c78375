use std::collections::HashMap;

use chrono::{DateTime, Utc};

use cellar_types::{AddedId, CellAddress, ColumnKey, Namespace, RefKey, RowKey};

use crate::cell::CellVersion;
use crate::error::{StoreError, StoreResult};

type PairKey = (RowKey, ColumnKey);

/// Ordered, append-only version table for a single namespace.
///
/// Shared by every backend: the in-memory repository uses it as its only
/// copy, the file repository rebuilds it from the segment log on open.
#[derive(Debug)]
pub(crate) struct NamespaceTable {
    namespace: Namespace,
    /// Versions per cell, sorted by ref_key, gapless from 1.
    cells: HashMap<PairKey, Vec<CellVersion>>,
    last_added_id: AddedId,
    last_created_at: Option<DateTime<Utc>>,
    version_count: u64,
}

impl NamespaceTable {
    pub(crate) fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            cells: HashMap::new(),
            last_added_id: AddedId::new(0),
            last_created_at: None,
            version_count: 0,
        }
    }

    fn versions(&self, address: &CellAddress) -> Option<&Vec<CellVersion>> {
        self.cells
            .get(&(address.row_key.clone(), address.column_key.clone()))
    }

    pub(crate) fn max_ref_key(&self, address: &CellAddress) -> Option<RefKey> {
        self.versions(address)
            .and_then(|versions| versions.last())
            .map(|v| v.ref_key)
    }

    pub(crate) fn find_latest(&self, address: &CellAddress) -> StoreResult<CellVersion> {
        self.versions(address)
            .and_then(|versions| versions.last())
            .cloned()
            .ok_or_else(|| StoreError::CellNotFound {
                address: address.clone(),
                ref_key: None,
            })
    }

    pub(crate) fn find_exact(
        &self,
        address: &CellAddress,
        ref_key: RefKey,
    ) -> StoreResult<CellVersion> {
        self.versions(address)
            .and_then(|versions| {
                versions
                    .binary_search_by_key(&ref_key, |v| v.ref_key)
                    .ok()
                    .map(|idx| versions[idx].clone())
            })
            .ok_or_else(|| StoreError::CellNotFound {
                address: address.clone(),
                ref_key: Some(ref_key),
            })
    }

    /// Build the next version for `address` without recording it.
    ///
    /// Fails with `VersionConflict` unless `ref_key` is exactly the
    /// successor of the cell's current maximum.
    pub(crate) fn prepare(
        &self,
        address: &CellAddress,
        ref_key: RefKey,
        body: Vec<u8>,
    ) -> StoreResult<CellVersion> {
        let current = self.max_ref_key(address);
        if ref_key != RefKey::successor(current) {
            return Err(StoreError::VersionConflict {
                address: address.clone(),
                attempted: ref_key,
                current,
            });
        }

        let now = Utc::now();
        let created_at = match self.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };

        Ok(CellVersion {
            added_id: self.last_added_id.next(),
            row_key: address.row_key.clone(),
            column_key: address.column_key.clone(),
            ref_key,
            body,
            created_at,
        })
    }

    /// Record a version produced by [`prepare`](Self::prepare) or read back
    /// from durable storage, re-checking the table invariants.
    pub(crate) fn commit(&mut self, version: CellVersion) -> StoreResult<()> {
        if version.added_id <= self.last_added_id {
            return Err(StoreError::Unavailable(format!(
                "{}: added_id {} is not after {}",
                self.namespace, version.added_id, self.last_added_id
            )));
        }

        let key = (version.row_key.clone(), version.column_key.clone());
        let current = self
            .cells
            .get(&key)
            .and_then(|versions| versions.last())
            .map(|v| v.ref_key);
        if version.ref_key != RefKey::successor(current) {
            return Err(StoreError::VersionConflict {
                address: CellAddress::new(
                    self.namespace.clone(),
                    version.row_key.clone(),
                    version.column_key.clone(),
                ),
                attempted: version.ref_key,
                current,
            });
        }

        self.last_added_id = version.added_id;
        self.last_created_at = Some(match self.last_created_at {
            Some(last) if last > version.created_at => last,
            _ => version.created_at,
        });
        self.version_count += 1;
        self.cells.entry(key).or_default().push(version);
        Ok(())
    }

    pub(crate) fn version_count(&self) -> u64 {
        self.version_count
    }

    pub(crate) fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

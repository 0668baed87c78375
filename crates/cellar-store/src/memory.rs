use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use cellar_types::{CellAddress, Namespace, RefKey};

use crate::cell::CellVersion;
use crate::error::{poisoned, StoreError, StoreResult};
use crate::locks::{PairGuard, PairLocks};
use crate::table::NamespaceTable;
use crate::traits::CellRepository;

/// In-memory cell repository.
///
/// Intended for tests and embedding. Each namespace is a table behind its
/// own `RwLock`; writes to one namespace never wait on another. Data is lost
/// when the repository is dropped.
pub struct InMemoryCellRepository {
    tables: RwLock<HashMap<Namespace, Arc<RwLock<NamespaceTable>>>>,
    locks: PairLocks,
}

impl InMemoryCellRepository {
    /// Create a repository with no namespaces.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            locks: PairLocks::new(),
        }
    }

    /// Create a repository with the given namespaces already provisioned.
    pub fn with_namespaces<I>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = Namespace>,
    {
        let tables = namespaces
            .into_iter()
            .map(|ns| {
                let table = Arc::new(RwLock::new(NamespaceTable::new(ns.clone())));
                (ns, table)
            })
            .collect();
        Self {
            tables: RwLock::new(tables),
            locks: PairLocks::new(),
        }
    }

    /// Total versions stored across all namespaces.
    pub fn version_count(&self) -> u64 {
        let Ok(tables) = self.tables.read() else {
            return 0;
        };
        tables
            .values()
            .filter_map(|t| t.read().ok().map(|t| t.version_count()))
            .sum()
    }

    fn table(&self, namespace: &Namespace) -> StoreResult<Arc<RwLock<NamespaceTable>>> {
        let tables = self.tables.read().map_err(poisoned)?;
        tables
            .get(namespace)
            .cloned()
            .ok_or_else(|| StoreError::NamespaceNotFound(namespace.clone()))
    }
}

impl Default for InMemoryCellRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CellRepository for InMemoryCellRepository {
    async fn insert(
        &self,
        address: &CellAddress,
        ref_key: RefKey,
        body: Vec<u8>,
    ) -> StoreResult<CellVersion> {
        let table = self.table(&address.namespace)?;
        let mut table = table.write().map_err(poisoned)?;
        let version = table.prepare(address, ref_key, body)?;
        table.commit(version.clone())?;
        Ok(version)
    }

    async fn find_exact(&self, address: &CellAddress, ref_key: RefKey) -> StoreResult<CellVersion> {
        let table = self.table(&address.namespace)?;
        let table = table.read().map_err(poisoned)?;
        table.find_exact(address, ref_key)
    }

    async fn find_latest(&self, address: &CellAddress) -> StoreResult<CellVersion> {
        let table = self.table(&address.namespace)?;
        let table = table.read().map_err(poisoned)?;
        table.find_latest(address)
    }

    async fn max_ref_key(&self, address: &CellAddress) -> StoreResult<Option<RefKey>> {
        let table = self.table(&address.namespace)?;
        let table = table.read().map_err(poisoned)?;
        Ok(table.max_ref_key(address))
    }

    async fn lock_pair(&self, address: &CellAddress) -> StoreResult<PairGuard> {
        // Fail fast on unknown namespaces instead of allocating a slot.
        self.table(&address.namespace)?;
        Ok(self.locks.acquire(address).await)
    }

    async fn create_namespace(&self, namespace: &Namespace) -> StoreResult<bool> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        if tables.contains_key(namespace) {
            return Ok(false);
        }
        tables.insert(
            namespace.clone(),
            Arc::new(RwLock::new(NamespaceTable::new(namespace.clone()))),
        );
        tracing::debug!(%namespace, "namespace created");
        Ok(true)
    }

    async fn namespaces(&self) -> StoreResult<Vec<Namespace>> {
        let tables = self.tables.read().map_err(poisoned)?;
        let mut names: Vec<Namespace> = tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl std::fmt::Debug for InMemoryCellRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCellRepository")
            .field("version_count", &self.version_count())
            .finish()
    }
}

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{info, warn};

use cellar_types::{CellAddress, Namespace, RefKey};

use crate::cell::CellVersion;
use crate::error::{poisoned, StoreError, StoreResult};
use crate::locks::{PairGuard, PairLocks};
use crate::segment::{SegmentLog, SyncMode};
use crate::table::NamespaceTable;
use crate::traits::CellRepository;

/// File extension of namespace segment files.
pub const SEGMENT_EXTENSION: &str = "cells";

/// Configuration for [`FileCellRepository`].
#[derive(Clone, Debug, Default)]
pub struct FileRepositoryConfig {
    pub sync_mode: SyncMode,
}

/// One namespace: its segment on disk and the index rebuilt from it.
struct NamespaceStore {
    log: SegmentLog,
    table: RwLock<NamespaceTable>,
}

/// Durable cell repository backed by one segment file per namespace.
///
/// Layout: `<root>/<namespace>.cells`. Every segment is replayed into an
/// in-memory index when the repository is opened, so reads never touch the
/// disk. Inserts append to the segment first and only then publish the
/// version to readers.
pub struct FileCellRepository {
    root: PathBuf,
    config: FileRepositoryConfig,
    namespaces: RwLock<HashMap<Namespace, Arc<NamespaceStore>>>,
    /// Serializes namespace creation; segment files are opened outside
    /// the `namespaces` lock.
    creating: tokio::sync::Mutex<()>,
    locks: PairLocks,
}

impl FileCellRepository {
    /// Open the repository rooted at `root`, creating the directory if
    /// needed and recovering every existing namespace.
    pub fn open(root: impl AsRef<Path>, config: FileRepositoryConfig) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let mut namespaces = HashMap::new();
        for entry in fs::read_dir(&root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SEGMENT_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let namespace = match Namespace::new(stem) {
                Ok(ns) => ns,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring segment with invalid name");
                    continue;
                }
            };
            let store = Self::load(&path, namespace.clone(), config.sync_mode)?;
            namespaces.insert(namespace, Arc::new(store));
        }

        info!(root = %root.display(), namespaces = namespaces.len(), "file repository opened");
        Ok(Self {
            root,
            config,
            namespaces: RwLock::new(namespaces),
            creating: tokio::sync::Mutex::new(()),
            locks: PairLocks::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn segment_path(&self, namespace: &Namespace) -> PathBuf {
        self.root
            .join(format!("{}.{SEGMENT_EXTENSION}", namespace.as_str()))
    }

    fn load(path: &Path, namespace: Namespace, sync_mode: SyncMode) -> StoreResult<NamespaceStore> {
        let (log, versions) = SegmentLog::open(path, sync_mode)?;
        let mut table = NamespaceTable::new(namespace);
        for (offset, version) in versions {
            table.commit(version).map_err(|e| StoreError::CorruptSegment {
                path: path.to_path_buf(),
                offset,
                reason: format!("record breaks the version sequence: {e}"),
            })?;
        }
        Ok(NamespaceStore {
            log,
            table: RwLock::new(table),
        })
    }

    fn store(&self, namespace: &Namespace) -> StoreResult<Arc<NamespaceStore>> {
        let namespaces = self.namespaces.read().map_err(poisoned)?;
        namespaces
            .get(namespace)
            .cloned()
            .ok_or_else(|| StoreError::NamespaceNotFound(namespace.clone()))
    }

    /// Write path: prepare, append durably, then publish. Runs on a
    /// blocking thread so it completes even if the caller goes away.
    ///
    /// The segment's append lock orders writers of the namespace. The
    /// index is locked only for the in-memory steps, never across the
    /// file write.
    fn append_blocking(
        store: &NamespaceStore,
        address: &CellAddress,
        ref_key: RefKey,
        body: Vec<u8>,
    ) -> StoreResult<CellVersion> {
        let mut appender = store.log.appender()?;
        let version = store
            .table
            .read()
            .map_err(poisoned)?
            .prepare(address, ref_key, body)?;
        appender.append(&version)?;
        store.table.write().map_err(poisoned)?.commit(version.clone())?;
        Ok(version)
    }
}

#[async_trait]
impl CellRepository for FileCellRepository {
    async fn insert(
        &self,
        address: &CellAddress,
        ref_key: RefKey,
        body: Vec<u8>,
    ) -> StoreResult<CellVersion> {
        let store = self.store(&address.namespace)?;
        let address = address.clone();
        tokio::task::spawn_blocking(move || Self::append_blocking(&store, &address, ref_key, body))
            .await
            .map_err(|e| StoreError::Unavailable(format!("insert worker failed: {e}")))?
    }

    async fn find_exact(&self, address: &CellAddress, ref_key: RefKey) -> StoreResult<CellVersion> {
        let store = self.store(&address.namespace)?;
        let table = store.table.read().map_err(poisoned)?;
        table.find_exact(address, ref_key)
    }

    async fn find_latest(&self, address: &CellAddress) -> StoreResult<CellVersion> {
        let store = self.store(&address.namespace)?;
        let table = store.table.read().map_err(poisoned)?;
        table.find_latest(address)
    }

    async fn max_ref_key(&self, address: &CellAddress) -> StoreResult<Option<RefKey>> {
        let store = self.store(&address.namespace)?;
        let table = store.table.read().map_err(poisoned)?;
        Ok(table.max_ref_key(address))
    }

    async fn lock_pair(&self, address: &CellAddress) -> StoreResult<PairGuard> {
        self.store(&address.namespace)?;
        Ok(self.locks.acquire(address).await)
    }

    async fn create_namespace(&self, namespace: &Namespace) -> StoreResult<bool> {
        let _creating = self.creating.lock().await;
        if self.namespaces.read().map_err(poisoned)?.contains_key(namespace) {
            return Ok(false);
        }

        let path = self.segment_path(namespace);
        let store = {
            let (path, namespace) = (path.clone(), namespace.clone());
            let sync_mode = self.config.sync_mode;
            tokio::task::spawn_blocking(move || Self::load(&path, namespace, sync_mode))
                .await
                .map_err(|e| StoreError::Unavailable(format!("namespace worker failed: {e}")))??
        };

        self.namespaces
            .write()
            .map_err(poisoned)?
            .insert(namespace.clone(), Arc::new(store));
        info!(%namespace, path = %path.display(), "namespace created");
        Ok(true)
    }

    async fn namespaces(&self) -> StoreResult<Vec<Namespace>> {
        let namespaces = self.namespaces.read().map_err(poisoned)?;
        let mut names: Vec<Namespace> = namespaces.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl std::fmt::Debug for FileCellRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCellRepository")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish()
    }
}

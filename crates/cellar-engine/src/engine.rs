use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use cellar_store::{CellRepository, CellVersion, StoreError};
use cellar_types::{decode_body, encode_body, CellAddress, Document, RefKey};

use crate::error::{EngineError, EngineResult};

/// Tuning for the put path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Attempts per put before a lost race is surfaced as `Conflict`.
    pub max_put_attempts: u32,
    /// Base pause between attempts; attempt `n` waits `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_put_attempts: 4,
            retry_backoff_ms: 2,
        }
    }
}

/// A stored version together with its decoded body.
#[derive(Clone, Debug, PartialEq)]
pub struct CellRecord {
    pub version: CellVersion,
    pub body: Document,
}

impl CellRecord {
    fn decode(version: CellVersion) -> EngineResult<Self> {
        let body = decode_body(&version.body)?;
        Ok(Self { version, body })
    }

    pub fn ref_key(&self) -> RefKey {
        self.version.ref_key
    }
}

/// Turns logical cell operations into repository calls.
///
/// Reads resolve "latest" or an exact version; writes assign the next
/// per-cell version number. The engine holds no state of its own besides the
/// repository handle, so one instance can serve any number of concurrent
/// callers.
#[derive(Clone)]
pub struct CellEngine {
    repo: Arc<dyn CellRepository>,
    config: EngineConfig,
}

impl CellEngine {
    pub fn new(repo: Arc<dyn CellRepository>) -> Self {
        Self::with_config(repo, EngineConfig::default())
    }

    pub fn with_config(repo: Arc<dyn CellRepository>, config: EngineConfig) -> Self {
        Self { repo, config }
    }

    pub fn repository(&self) -> &Arc<dyn CellRepository> {
        &self.repo
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Latest version of a cell, decoded.
    pub async fn get_latest(
        &self,
        namespace: &str,
        row_key: &str,
        column_key: &str,
    ) -> EngineResult<CellRecord> {
        let address = CellAddress::parse(namespace, row_key, column_key)?;
        self.latest_at(&address).await
    }

    /// One exact version of a cell, decoded.
    ///
    /// `ref_key` must be positive; anything else is rejected before the
    /// repository is consulted.
    pub async fn get_exact(
        &self,
        namespace: &str,
        row_key: &str,
        column_key: &str,
        ref_key: i64,
    ) -> EngineResult<CellRecord> {
        let address = CellAddress::parse(namespace, row_key, column_key)?;
        let ref_key = RefKey::new(ref_key)?;
        self.exact_at(&address, ref_key).await
    }

    /// Store `body` as the next version of a cell.
    ///
    /// Returns the new version with its body decoded back from storage.
    pub async fn put(
        &self,
        namespace: &str,
        row_key: &str,
        column_key: &str,
        body: &Document,
    ) -> EngineResult<CellRecord> {
        let address = CellAddress::parse(namespace, row_key, column_key)?;
        self.put_at(&address, body).await
    }

    pub async fn latest_at(&self, address: &CellAddress) -> EngineResult<CellRecord> {
        let version = self.repo.find_latest(address).await?;
        CellRecord::decode(version)
    }

    pub async fn exact_at(&self, address: &CellAddress, ref_key: RefKey) -> EngineResult<CellRecord> {
        let version = self.repo.find_exact(address, ref_key).await?;
        CellRecord::decode(version)
    }

    pub async fn put_at(&self, address: &CellAddress, body: &Document) -> EngineResult<CellRecord> {
        let encoded = encode_body(body)?;
        let max_attempts = self.config.max_put_attempts.max(1);

        let mut attempt = 1;
        loop {
            match self.try_append(address, encoded.clone()).await {
                Ok(version) => return CellRecord::decode(version),
                Err(StoreError::VersionConflict {
                    attempted, current, ..
                }) if attempt < max_attempts => {
                    debug!(
                        %address,
                        attempt,
                        %attempted,
                        current = current.map(RefKey::get),
                        "lost version race; retrying"
                    );
                    let pause = self.config.retry_backoff_ms.saturating_mul(u64::from(attempt));
                    if pause > 0 {
                        tokio::time::sleep(Duration::from_millis(pause)).await;
                    }
                    attempt += 1;
                }
                Err(StoreError::VersionConflict { .. }) => {
                    return Err(EngineError::Conflict {
                        address: address.clone(),
                        attempts: attempt,
                    });
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// One round of the versioning protocol: read the cell's current max and
    /// insert its successor, inside the cell's write scope.
    async fn try_append(
        &self,
        address: &CellAddress,
        encoded: Vec<u8>,
    ) -> Result<CellVersion, StoreError> {
        let _guard = self.repo.lock_pair(address).await?;
        let current = self.repo.max_ref_key(address).await?;
        self.repo
            .insert(address, RefKey::successor(current), encoded)
            .await
    }
}

impl std::fmt::Debug for CellEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellEngine")
            .field("config", &self.config)
            .finish()
    }
}

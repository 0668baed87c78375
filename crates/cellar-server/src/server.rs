use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use cellar_engine::CellEngine;
use cellar_store::{
    CellRepository, FileCellRepository, FileRepositoryConfig, InMemoryCellRepository,
};

use crate::config::{ServerConfig, StorageBackend, StorageConfig};
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Open the repository selected by `storage`.
pub fn open_repository(storage: &StorageConfig) -> ServerResult<Arc<dyn CellRepository>> {
    match storage.backend {
        StorageBackend::Memory => Ok(Arc::new(InMemoryCellRepository::new())),
        StorageBackend::File => {
            let config = FileRepositoryConfig {
                sync_mode: storage.sync.into(),
            };
            Ok(Arc::new(FileCellRepository::open(&storage.data_dir, config)?))
        }
    }
}

/// Cellar HTTP server.
pub struct CellarServer {
    config: ServerConfig,
}

impl CellarServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open storage, provision the configured namespaces and assemble the
    /// handler state.
    pub async fn build_state(&self) -> ServerResult<AppState> {
        self.config.validate()?;
        let repo = open_repository(&self.config.storage)?;
        for namespace in self.config.namespace_list()? {
            if repo.create_namespace(&namespace).await? {
                info!(%namespace, "namespace provisioned");
            }
        }
        let engine = CellEngine::with_config(repo, self.config.engine.clone());
        Ok(AppState {
            engine,
            backend: self.config.storage.backend,
            request_timeout: Duration::from_millis(self.config.request_timeout_ms),
            max_body_bytes: self.config.max_body_bytes,
        })
    }

    /// Build the router (useful for testing).
    pub async fn router(&self) -> ServerResult<axum::Router> {
        Ok(build_router(self.build_state().await?))
    }

    /// Start serving requests until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router().await?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(
            addr = %self.config.bind_addr,
            backend = self.config.storage.backend.as_str(),
            "cellar server listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

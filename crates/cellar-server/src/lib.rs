//! HTTP server for Cellar.
//!
//! Exposes the three cell calls (GetLatestCell, GetCell, PutCell) as JSON
//! over HTTP, together with health, info and namespace listing. Storage is
//! either in-memory or the durable file backend, chosen by [`ServerConfig`].

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::{ServerConfig, StorageBackend, StorageConfig, SyncPolicy};
pub use error::{status_for, ServerError, ServerResult};
pub use handler::AppState;
pub use router::build_router;
pub use server::{open_repository, CellarServer};

//! Addressing and versioning engine for Cellar.
//!
//! This crate sits between the transport layers and a [`CellRepository`]:
//! - `get_latest` / `get_exact` resolve a cell address to one decoded version
//! - `put` encodes a document and appends it as the cell's next version
//! - [`ErrorKind`] is the stable error taxonomy exposed to clients
//!
//! Per-cell version numbers are gapless. A put holds the cell's write scope
//! while it reads the current maximum and inserts its successor; if the
//! repository still reports a lost race, the put is retried a bounded number
//! of times before failing with [`ErrorKind::Conflict`].
//!
//! [`CellRepository`]: cellar_store::CellRepository

pub mod engine;
pub mod error;

pub use engine::{CellEngine, CellRecord, EngineConfig};
pub use error::{EngineError, EngineResult, ErrorKind};

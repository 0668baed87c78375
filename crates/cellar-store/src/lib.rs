//! Cell repository backends for Cellar.
//!
//! A repository stores immutable [`CellVersion`]s in an append-only table per
//! namespace and exposes the small set of primitives the versioning engine
//! needs: insert a version, find an exact version, find the latest version,
//! and read the current maximum ref_key of a cell.
//!
//! # Storage Backends
//!
//! All backends implement the [`CellRepository`] trait:
//!
//! - [`InMemoryCellRepository`] -- `HashMap`-based store for tests and embedding
//! - [`FileCellRepository`] -- one CRC-framed segment file per namespace
//!
//! # Design Rules
//!
//! 1. Versions are immutable once written. There is no update or delete.
//! 2. `insert` accepts only the successor of a cell's current max ref_key.
//! 3. Writes to one cell are serialized through [`PairLocks`]; writes to
//!    different cells proceed independently.
//! 4. Durable backends append before publishing, and a failed append leaves
//!    no trace.
//! 5. The store never interprets record bodies.
//! 6. All I/O errors are propagated, never silently ignored.

pub mod cell;
pub mod error;
pub mod file;
pub mod locks;
pub mod memory;
pub mod segment;
mod table;
pub mod traits;

pub use cell::CellVersion;
pub use error::{StoreError, StoreResult};
pub use file::{FileCellRepository, FileRepositoryConfig, SEGMENT_EXTENSION};
pub use locks::{PairGuard, PairLocks};
pub use memory::InMemoryCellRepository;
pub use segment::SyncMode;
pub use traits::CellRepository;

//! Foundation types for Cellar, a store of versioned, semi-structured records.
//!
//! Every record ("cell") is addressed by a namespace, a row key and a column
//! key. Each write to a cell creates a new immutable version numbered by a
//! per-cell [`RefKey`] starting at 1. Every other Cellar crate depends on
//! `cellar-types`.
//!
//! # Key Types
//!
//! - [`Namespace`] -- named logical partition of the store
//! - [`RowKey`] / [`ColumnKey`] -- the two halves of a cell key
//! - [`CellAddress`] -- fully qualified cell address (namespace + pair)
//! - [`RefKey`] -- per-cell version number (1, 2, 3, ...)
//! - [`AddedId`] -- namespace-wide physical insertion id
//! - [`Document`] -- the record body as a tagged union
//!
//! The [`codec`] module converts documents to and from their opaque stored
//! byte form.

pub mod address;
pub mod codec;
pub mod document;
pub mod error;
pub mod version;

pub use address::{CellAddress, ColumnKey, Namespace, RowKey, MAX_KEY_LEN, MAX_NAMESPACE_LEN};
pub use codec::{decode_body, encode_body};
pub use document::Document;
pub use error::TypeError;
pub use version::{AddedId, RefKey};

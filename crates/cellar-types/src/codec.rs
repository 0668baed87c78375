//! Body encoding: [`Document`] ⇄ opaque stored bytes.
//!
//! The stored form is compact UTF-8 JSON. Decoding never falls back to an
//! empty document: bytes that are not valid JSON are a
//! [`TypeError::MalformedBody`].

use serde_json::Value;

use crate::document::Document;
use crate::error::TypeError;

/// Encode a document into its stored byte form.
pub fn encode_body(doc: &Document) -> Result<Vec<u8>, TypeError> {
    let value = Value::try_from(doc)?;
    serde_json::to_vec(&value).map_err(|e| TypeError::UnencodableBody(e.to_string()))
}

/// Decode stored bytes back into a document.
pub fn decode_body(bytes: &[u8]) -> Result<Document, TypeError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| TypeError::MalformedBody(e.to_string()))?;
    Ok(Document::from(value))
}

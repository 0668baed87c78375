//! The record body model.
//!
//! A [`Document`] is a schema-less tree of maps, lists and scalars. The store
//! never looks inside it; it only crosses the encoding boundary in
//! [`crate::codec`] and the text form used by the transport layer.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

use crate::error::TypeError;

/// Structured record body.
#[derive(Clone, Debug, PartialEq)]
pub enum Document {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Document>),
    Map(BTreeMap<String, Document>),
}

impl Document {
    /// Build a map document from key/value pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Document)>,
    {
        Document::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Look up a key when this document is a map.
    pub fn get(&self, key: &str) -> Option<&Document> {
        match self {
            Document::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Document::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Document::Map(_))
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Document::Null => "null",
            Document::Bool(_) => "bool",
            Document::Integer(_) | Document::Float(_) => "number",
            Document::String(_) => "string",
            Document::List(_) => "list",
            Document::Map(_) => "map",
        }
    }

    /// Parse a document from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, TypeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| TypeError::MalformedBody(e.to_string()))?;
        Ok(Document::from(value))
    }

    /// Render the document as compact JSON text.
    ///
    /// Map keys come out in sorted order.
    pub fn to_json_string(&self) -> Result<String, TypeError> {
        let value = Value::try_from(self)?;
        serde_json::to_string(&value).map_err(|e| TypeError::UnencodableBody(e.to_string()))
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Document::Null,
            Value::Bool(b) => Document::Bool(b),
            Value::Number(n) => number_to_document(&n),
            Value::String(s) => Document::String(s),
            Value::Array(items) => Document::List(items.into_iter().map(Document::from).collect()),
            Value::Object(entries) => Document::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Document::from(v)))
                    .collect(),
            ),
        }
    }
}

fn number_to_document(n: &Number) -> Document {
    if let Some(i) = n.as_i64() {
        Document::Integer(i)
    } else {
        // u64 above i64::MAX and all non-integral numbers
        Document::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

impl TryFrom<&Document> for Value {
    type Error = TypeError;

    fn try_from(doc: &Document) -> Result<Self, Self::Error> {
        Ok(match doc {
            Document::Null => Value::Null,
            Document::Bool(b) => Value::Bool(*b),
            Document::Integer(i) => Value::Number(Number::from(*i)),
            Document::Float(f) => Value::Number(Number::from_f64(*f).ok_or_else(|| {
                TypeError::UnencodableBody(format!("non-finite number {f}"))
            })?),
            Document::String(s) => Value::String(s.clone()),
            Document::List(items) => Value::Array(
                items
                    .iter()
                    .map(Value::try_from)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Document::Map(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (k, v) in entries {
                    map.insert(k.clone(), Value::try_from(v)?);
                }
                Value::Object(map)
            }
        })
    }
}

impl From<&str> for Document {
    fn from(s: &str) -> Self {
        Document::String(s.to_string())
    }
}

impl From<String> for Document {
    fn from(s: String) -> Self {
        Document::String(s)
    }
}

impl From<i64> for Document {
    fn from(i: i64) -> Self {
        Document::Integer(i)
    }
}

impl From<f64> for Document {
    fn from(f: f64) -> Self {
        Document::Float(f)
    }
}

impl From<bool> for Document {
    fn from(b: bool) -> Self {
        Document::Bool(b)
    }
}

impl From<Vec<Document>> for Document {
    fn from(items: Vec<Document>) -> Self {
        Document::List(items)
    }
}

impl From<BTreeMap<String, Document>> for Document {
    fn from(entries: BTreeMap<String, Document>) -> Self {
        Document::Map(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zelda() -> Document {
        Document::map([
            ("first_name", Document::from("Zelda")),
            ("last_name", Document::from("Princess")),
        ])
    }

    #[test]
    fn parse_object() {
        let doc = Document::from_json_str(r#"{"first_name":"Zelda","last_name":"Princess"}"#)
            .unwrap();
        assert_eq!(doc, zelda());
        assert_eq!(doc.get("first_name").and_then(Document::as_str), Some("Zelda"));
    }

    #[test]
    fn render_sorts_keys() {
        let doc = Document::map([("zip", Document::from(105245621i64)), ("street", "Sunset".into())]);
        assert_eq!(
            doc.to_json_string().unwrap(),
            r#"{"street":"Sunset","zip":105245621}"#
        );
    }

    #[test]
    fn integers_and_floats_stay_distinct() {
        let doc = Document::from_json_str("[1, 1.0, -7, 2.5]").unwrap();
        assert_eq!(
            doc,
            Document::List(vec![
                Document::Integer(1),
                Document::Float(1.0),
                Document::Integer(-7),
                Document::Float(2.5),
            ])
        );
    }

    #[test]
    fn large_unsigned_becomes_float() {
        let doc = Document::from_json_str("18446744073709551615").unwrap();
        assert!(matches!(doc, Document::Float(_)));
    }

    #[test]
    fn nested_structures() {
        let text = r#"{"meta":{"active":true,"score":null},"tags":["a","b"]}"#;
        let doc = Document::from_json_str(text).unwrap();
        assert_eq!(doc.type_name(), "map");
        let meta = doc.get("meta").unwrap();
        assert_eq!(meta.get("active"), Some(&Document::Bool(true)));
        assert_eq!(meta.get("score"), Some(&Document::Null));
        assert_eq!(doc.to_json_string().unwrap(), text);
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = Document::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, TypeError::MalformedBody(_)));
    }

    #[test]
    fn non_finite_float_is_unencodable() {
        let doc = Document::List(vec![Document::Float(f64::INFINITY)]);
        assert!(matches!(
            doc.to_json_string(),
            Err(TypeError::UnencodableBody(_))
        ));
    }
}

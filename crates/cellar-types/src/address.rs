//! Cell addressing: namespaces, row keys, column keys.
//!
//! Namespace names double as segment file names in durable backends, so they
//! are restricted to a conservative character set:
//! - 1 to [`MAX_NAMESPACE_LEN`] characters
//! - ASCII letters, digits, `_` and `-` only
//! - Must not start with `-`
//!
//! Row and column keys are free-form strings, but must be non-empty, at most
//! [`MAX_KEY_LEN`] bytes, and free of control characters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Maximum namespace name length in characters.
pub const MAX_NAMESPACE_LEN: usize = 64;

/// Maximum row/column key length in bytes.
pub const MAX_KEY_LEN: usize = 255;

/// A named logical collection of cells.
///
/// Construction only checks the name's syntax. Whether the namespace exists
/// is decided by the repository on first access.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// Validate and wrap a namespace name.
    ///
    /// ```
    /// use cellar_types::Namespace;
    ///
    /// assert!(Namespace::new("users").is_ok());
    /// assert!(Namespace::new("audit_log-2024").is_ok());
    /// assert!(Namespace::new("").is_err());
    /// assert!(Namespace::new("../etc").is_err());
    /// ```
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        validate_namespace(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_namespace(name: &str) -> Result<(), TypeError> {
    let invalid = |reason: String| TypeError::InvalidNamespace {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("namespace must not be empty".into()));
    }
    if name.chars().count() > MAX_NAMESPACE_LEN {
        return Err(invalid(format!(
            "namespace longer than {MAX_NAMESPACE_LEN} characters"
        )));
    }
    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }
    if name.starts_with('-') {
        return Err(invalid("must not start with '-'".into()));
    }
    Ok(())
}

fn validate_key(field: &'static str, key: &str) -> Result<(), TypeError> {
    if key.is_empty() {
        return Err(TypeError::InvalidKey {
            field,
            reason: "must not be empty".into(),
        });
    }
    if key.len() > MAX_KEY_LEN {
        return Err(TypeError::InvalidKey {
            field,
            reason: format!("{} bytes exceeds the {MAX_KEY_LEN} byte limit", key.len()),
        });
    }
    if let Some(ch) = key.chars().find(|c| c.is_control()) {
        return Err(TypeError::InvalidKey {
            field,
            reason: format!("contains control character {ch:?}"),
        });
    }
    Ok(())
}

macro_rules! key_type {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(key: impl Into<String>) -> Result<Self, TypeError> {
                let key = key.into();
                validate_key($field, &key)?;
                Ok(Self(key))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

key_type!(
    /// Identifies the logical entity a cell belongs to (often a UUID).
    RowKey,
    "row_key"
);

key_type!(
    /// Identifies the attribute slot within an entity.
    ColumnKey,
    "column_key"
);

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({:?})", self.0)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully qualified address of a cell: `(namespace, row_key, column_key)`.
///
/// All versions of a cell share one address. The address is the unit of
/// write serialization: puts to the same address are linearized, puts to
/// different addresses never wait on each other.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    pub namespace: Namespace,
    pub row_key: RowKey,
    pub column_key: ColumnKey,
}

impl CellAddress {
    pub fn new(namespace: Namespace, row_key: RowKey, column_key: ColumnKey) -> Self {
        Self {
            namespace,
            row_key,
            column_key,
        }
    }

    /// Validate all three parts from raw strings.
    pub fn parse(namespace: &str, row_key: &str, column_key: &str) -> Result<Self, TypeError> {
        Ok(Self {
            namespace: Namespace::new(namespace)?,
            row_key: RowKey::new(row_key)?,
            column_key: ColumnKey::new(column_key)?,
        })
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.row_key, self.column_key)
    }
}

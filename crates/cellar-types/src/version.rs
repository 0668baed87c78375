use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Per-cell version number.
///
/// The first write to a cell gets `RefKey(1)`; each later write to the same
/// cell gets the next integer. Values are always `>= 1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefKey(u64);

impl RefKey {
    /// The version assigned to the first write of a cell.
    pub const FIRST: RefKey = RefKey(1);

    /// Build a ref key from a caller-supplied integer.
    ///
    /// Zero and negative values are rejected.
    pub fn new(value: i64) -> Result<Self, TypeError> {
        if value < 1 {
            return Err(TypeError::InvalidRefKey(value));
        }
        Ok(Self(value as u64))
    }

    /// Build a ref key from an unsigned value, rejecting zero.
    pub fn from_u64(value: u64) -> Result<Self, TypeError> {
        if value == 0 {
            return Err(TypeError::InvalidRefKey(0));
        }
        Ok(Self(value))
    }

    /// The version that follows `current`, or [`RefKey::FIRST`] when the
    /// cell has no versions yet.
    pub fn successor(current: Option<RefKey>) -> RefKey {
        match current {
            Some(RefKey(n)) => RefKey(n + 1),
            None => RefKey::FIRST,
        }
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r#{}", self.0)
    }
}

impl fmt::Display for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Namespace-wide physical insertion id.
///
/// Assigned by the repository, strictly increasing with insertion order and
/// never reused. Unrelated to [`RefKey`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddedId(u64);

impl AddedId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for AddedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

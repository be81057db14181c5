//! Position key newtype.
//!
//! A `FractionalIndex` is an opaque string whose lexicographic byte order
//! defines an element's place in the scene. Generation and validation of the
//! key format live in `tessera-crdt`; this crate only carries the value.

use std::fmt;

use serde::{Deserialize, Serialize};

/// String-valued position key (fractional index).
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FractionalIndex(String);

impl FractionalIndex {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for FractionalIndex {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FractionalIndex {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for FractionalIndex {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FractionalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for FractionalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FractionalIndex({:?})", self.0)
    }
}

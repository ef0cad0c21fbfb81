//! Slice routing keys

use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusive lower bound of a slice's value range
///
/// A value belongs to the slice with the greatest key `<=` the value.
/// The empty key starts the first range, so any index containing it
/// covers the whole key space.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct DictSliceKey(Vec<u8>);

impl DictSliceKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Key of the range that starts at the beginning of the key space
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for DictSliceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "<root>");
        }
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

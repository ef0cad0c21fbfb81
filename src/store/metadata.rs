//! Version metadata
//!
//! The manifest of one immutable version.
//!
//! ## File Format
//! ```text
//! ┌──────────┬────────────┬──────────────┬───────────┬──────────────────┐
//! │Magic (4) │ Version(2) │ PayloadLen(4)│ CRC32 (4) │ Payload (bincode)│
//! └──────────┴────────────┴──────────────┴───────────┴──────────────────┘
//! ```

use std::collections::{BTreeMap, HashSet};

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{DictError, Result};
use crate::slice::{DictId, DictSliceKey};

/// Magic bytes identifying a metadata file
const MAGIC: &[u8; 4] = b"GDMT";

/// Current metadata format version
const FORMAT_VERSION: u16 = 1;

/// Magic (4) + Version (2) + PayloadLen (4) + CRC (4)
const HEADER_SIZE: usize = 14;

/// Prefix of every slice file name
const SLICE_FILE_PREFIX: &str = "slice-";

/// Longest slice file name a manifest may reference
///
/// Well under the 255-byte component limit of common filesystems.
pub const MAX_SLICE_FILE_NAME_LEN: usize = 64;

/// File name of the slice at `ordinal` in key order
///
/// Names depend only on position, never on key length: "slice-00000",
/// "slice-00001", ...
pub fn slice_file_name(ordinal: usize) -> String {
    format!("{}{:05}", SLICE_FILE_PREFIX, ordinal)
}

/// Per-version manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalDictMetadata {
    /// Version number; must match the version directory name
    pub version: u64,

    /// Next unused surrogate ID
    pub next_id: DictId,

    /// Number of stored values (equals `next_id`; IDs are dense)
    pub value_count: u64,

    /// Version the writer started from, `None` for the first version
    pub previous_version: Option<u64>,

    /// Creation time (unix millis)
    pub created_at_ms: u64,

    /// Range lower bound → slice file name
    pub slices: BTreeMap<DictSliceKey, String>,
}

impl GlobalDictMetadata {
    /// Metadata of a dictionary with no values yet
    pub fn empty() -> Self {
        let mut slices = BTreeMap::new();
        slices.insert(DictSliceKey::root(), slice_file_name(0));
        Self {
            version: 0,
            next_id: 0,
            value_count: 0,
            previous_version: None,
            created_at_ms: 0,
            slices,
        }
    }

    /// File holding the slice for `key`
    pub fn slice_file(&self, key: &DictSliceKey) -> Option<&str> {
        self.slices.get(key).map(String::as_str)
    }

    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    /// Check the invariants every published manifest satisfies
    pub fn validate(&self) -> Result<()> {
        if !self.slices.contains_key(&DictSliceKey::root()) {
            return Err(DictError::CorruptVersion(format!(
                "version {}: slice index does not cover the start of the key space",
                self.version
            )));
        }
        let mut seen = HashSet::with_capacity(self.slices.len());
        for (key, file) in &self.slices {
            let well_formed = file.len() > SLICE_FILE_PREFIX.len()
                && file.len() <= MAX_SLICE_FILE_NAME_LEN
                && file.starts_with(SLICE_FILE_PREFIX)
                && !file.contains(['/', '\\']);
            if !well_formed {
                return Err(DictError::CorruptVersion(format!(
                    "version {}: slice {} has invalid file name {:?}",
                    self.version, key, file
                )));
            }
            if !seen.insert(file.as_str()) {
                return Err(DictError::CorruptVersion(format!(
                    "version {}: file {} is shared by several slices",
                    self.version, file
                )));
            }
        }
        if self.value_count != u64::from(self.next_id) {
            return Err(DictError::CorruptVersion(format!(
                "version {}: value count {} does not match next id {}",
                self.version, self.value_count, self.next_id
            )));
        }
        Ok(())
    }

    /// Serialize to the on-disk format
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload =
            bincode::serialize(self).map_err(|e| DictError::Serialization(e.to_string()))?;

        let mut out = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        out.put_slice(MAGIC);
        out.put_u16_le(FORMAT_VERSION);
        out.put_u32_le(payload.len() as u32);
        out.put_u32_le(crc32fast::hash(&payload));
        out.put_slice(&payload);
        Ok(out.to_vec())
    }

    /// Parse the on-disk format; any inconsistency is `CorruptVersion`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(DictError::CorruptVersion(format!(
                "metadata truncated: {} bytes",
                bytes.len()
            )));
        }

        let mut header = &bytes[..HEADER_SIZE];
        if &header[..4] != MAGIC {
            return Err(DictError::CorruptVersion(format!(
                "invalid metadata magic: expected GDMT, got {:?}",
                &header[..4]
            )));
        }
        header.advance(4);

        let format = header.get_u16_le();
        if format != FORMAT_VERSION {
            return Err(DictError::CorruptVersion(format!(
                "unsupported metadata format: {}",
                format
            )));
        }

        let len = header.get_u32_le() as usize;
        let crc = header.get_u32_le();
        let payload = &bytes[HEADER_SIZE..];
        if payload.len() != len {
            return Err(DictError::CorruptVersion(format!(
                "metadata payload is {} bytes, header says {}",
                payload.len(),
                len
            )));
        }
        if crc32fast::hash(payload) != crc {
            return Err(DictError::CorruptVersion(
                "metadata checksum mismatch".to_string(),
            ));
        }

        bincode::deserialize(payload)
            .map_err(|e| DictError::CorruptVersion(format!("metadata payload: {}", e)))
    }
}

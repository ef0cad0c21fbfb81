//! Slice Module
//!
//! One bounded partition of the global dictionary: a compact trie mapping
//! raw values to their permanent surrogate IDs.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "GDSL" (4) | Version: u16 (2)                  │
//! │   NodeCount: u32 (4) | EntryCount: u32 (4)              │
//! ├─────────────────────────────────────────────────────────┤
//! │ Body (variable, pre-order)                              │
//! │   [LabelLen: u32][Label][Flags: u8][Id: u32]?           │
//! │   [ChildCount: u32]                                     │
//! │   ... repeated for each node, parent before children ...│
//! │   (Flags bit 0 set = terminal node, Id follows)         │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (4 bytes)                                        │
//! │   BodyCRC: u32                                          │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod codec;
mod key;
mod trie;

pub use codec::{decode, encode};
pub use key::DictSliceKey;
pub use trie::{DictNode, DictSlice, NodeIndex};

// =============================================================================
// Shared Constants (used by codec)
// =============================================================================

/// Magic bytes identifying a slice file
pub(crate) const MAGIC: &[u8; 4] = b"GDSL";

/// Current slice format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + NodeCount (4) + EntryCount (4) = 14 bytes
pub(crate) const HEADER_SIZE: usize = 14;

/// Footer size: BodyCRC (4)
pub(crate) const FOOTER_SIZE: usize = 4;

/// Flag bit marking a node that terminates a stored value
pub(crate) const FLAG_TERMINAL: u8 = 0x01;

/// Surrogate ID assigned to a raw value
pub type DictId = u32;

//! # slicedict
//!
//! A versioned, slice-partitioned global dictionary with:
//! - Stable surrogate IDs for arbitrary byte values (never reused or renumbered)
//! - Bounded-size trie slices that split as cardinality grows
//! - Staged commits published by a single atomic rename
//! - Count/age retention of old versions
//! - Copying the latest version into another environment
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     GlobalDictStore                          │
//! │          (Single Writer / Multi Reader per base dir)         │
//! └──────┬──────────────────┬─────────────────────┬─────────────┘
//!        │                  │                     │
//!        ▼                  ▼                     ▼
//!  ┌────────────┐   ┌───────────────┐     ┌──────────────┐
//!  │ DictWriter │   │VersionSnapshot│     │  Retention / │
//!  │  (staging) │   │   (readers)   │     │  Replication │
//!  └─────┬──────┘   └───────┬───────┘     └──────┬───────┘
//!        │                  │                    │
//!        ▼                  ▼                    │
//!  ┌────────────┐   ┌───────────────┐            │
//!  │SliceRouter │   │  Slice Codec  │            │
//!  └────────────┘   └───────┬───────┘            │
//!                           ▼                    ▼
//!                   ┌─────────────────────────────────┐
//!                   │   FileStore (local / memory)    │
//!                   └─────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod fs;
pub mod slice;
pub mod router;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DictError, Result};
pub use config::DictConfig;
pub use slice::{DictId, DictSlice, DictSliceKey};
pub use store::{CommitState, DictWriter, GlobalDictMetadata, GlobalDictStore, VersionSnapshot};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of slicedict
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Error types for slicedict
//!
//! Provides a unified error type for all dictionary operations.

use thiserror::Error;

/// Result type alias using DictError
pub type Result<T> = std::result::Result<T, DictError>;

/// Unified error type for dictionary operations
#[derive(Debug, Error)]
pub enum DictError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    /// Underlying storage unreachable or denied
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    /// Slice bytes are not a well-formed trie
    #[error("Corrupt slice: {0}")]
    CorruptSlice(String),

    /// Version directory or metadata is inconsistent
    #[error("Corrupt version: {0}")]
    CorruptVersion(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Version Errors
    // -------------------------------------------------------------------------
    /// Requested version has no directory (pruned or never existed)
    #[error("Version not found: {0}")]
    VersionNotFound(u64),

    // -------------------------------------------------------------------------
    // ID Assignment Errors
    // -------------------------------------------------------------------------
    /// The single-writer invariant was observed to be violated
    #[error("ID assignment conflict: {0}")]
    IdAssignmentConflict(String),

    #[error("Surrogate ID space exhausted")]
    IdSpaceExhausted,

    // -------------------------------------------------------------------------
    // Usage Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl DictError {
    /// True when the error means the version was never there or is gone,
    /// so the caller should re-resolve the latest version.
    pub fn is_version_not_found(&self) -> bool {
        matches!(self, DictError::VersionNotFound(_))
    }
}

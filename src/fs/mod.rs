//! Storage Driver Module
//!
//! The path-addressable store the dictionary persists into.
//!
//! ## Responsibilities
//! - Whole-file reads and durable writes
//! - Atomic rename (files and directories), the basis of every publish
//! - Directory listing and recursive deletion
//!
//! Drivers are chosen when the dictionary is constructed:
//! - `LocalFileStore`: local filesystem, fsync on write and rename
//! - `MemoryFileStore`: in-process tree, for tests and tooling

mod local;
mod memory;

use std::path::Path;

use crate::error::Result;

pub use local::LocalFileStore;
pub use memory::MemoryFileStore;

/// Capability interface of a storage driver
///
/// Paths are absolute or relative to whatever root the driver uses; the
/// dictionary never interprets them beyond joining components.
///
/// Missing paths surface as `std::io::ErrorKind::NotFound` inside
/// `DictError::Io`, so callers can tell "absent" from "unreachable".
pub trait FileStore: Send + Sync {
    /// Read a whole file
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create or replace a file; durable once this returns
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// Atomically move a file or directory; fails if `to` already exists
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Delete a single file
    fn delete(&self, path: &Path) -> Result<()>;

    /// Delete a directory and everything under it (no-op if absent)
    fn delete_dir_all(&self, path: &Path) -> Result<()>;

    /// Create a directory and any missing parents
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Names of the direct children of a directory, sorted
    fn list(&self, dir: &Path) -> Result<Vec<String>>;

    /// Whether a file or directory exists
    fn exists(&self, path: &Path) -> Result<bool>;
}

/// Build the `NotFound` error drivers return for missing paths
pub(crate) fn not_found(path: &Path) -> crate::DictError {
    crate::DictError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    ))
}

/// True if the error is a driver-level "path does not exist"
pub(crate) fn is_not_found(err: &crate::DictError) -> bool {
    matches!(err, crate::DictError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
}

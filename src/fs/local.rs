//! Local filesystem driver
//!
//! Writes are fsynced before returning. Renames fsync the parent
//! directory so a published version survives a power loss; once the rename
//! itself has happened, a failed directory fsync is only logged.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use tracing::warn;

use crate::error::{DictError, Result};

use super::{not_found, FileStore};

/// `FileStore` backed by `std::fs`
#[derive(Debug, Default, Clone)]
pub struct LocalFileStore;

impl LocalFileStore {
    pub fn new() -> Self {
        Self
    }

    /// fsync a directory so entries created/renamed in it are durable
    fn sync_dir(dir: &Path) -> Result<()> {
        // Directories cannot be opened for syncing on every platform
        #[cfg(unix)]
        {
            File::open(dir)?.sync_all()?;
        }
        #[cfg(not(unix))]
        {
            let _ = dir;
        }
        Ok(())
    }
}

impl FileStore for LocalFileStore {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(path)?)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        // fs::rename silently replaces files on unix; refuse instead
        if to.exists() {
            return Err(DictError::Io(std::io::Error::new(
                ErrorKind::AlreadyExists,
                format!("rename target {} already exists", to.display()),
            )));
        }
        if !from.exists() {
            return Err(not_found(from));
        }

        fs::rename(from, to)?;

        // The rename is visible from here on and must not be reported as failed
        if let Some(parent) = to.parent() {
            if let Err(e) = Self::sync_dir(parent) {
                warn!(dir = %parent.display(), error = %e, "Directory fsync after rename failed");
            }
        }
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<()> {
        Ok(fs::remove_file(path)?)
    }

    fn delete_dir_all(&self, path: &Path) -> Result<()> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        Ok(fs::create_dir_all(path)?)
    }

    fn list(&self, dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        match fs::metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

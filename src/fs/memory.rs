//! In-memory driver
//!
//! Keeps a directory tree in a single map behind a RwLock, so every rename
//! is atomic with respect to concurrent readers.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{DictError, Result};

use super::{not_found, FileStore};

#[derive(Debug, Clone)]
enum Entry {
    Dir,
    File(Bytes),
}

/// `FileStore` that lives entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    entries: RwLock<BTreeMap<PathBuf, Entry>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files currently stored (directories excluded)
    pub fn file_count(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|e| matches!(e, Entry::File(_)))
            .count()
    }

    fn already_exists(path: &Path) -> DictError {
        DictError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        ))
    }

    fn parent_is_dir(entries: &BTreeMap<PathBuf, Entry>, path: &Path) -> bool {
        match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => matches!(entries.get(p), Some(Entry::Dir)),
            _ => true,
        }
    }
}

impl FileStore for MemoryFileStore {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        match self.entries.read().get(path) {
            Some(Entry::File(bytes)) => Ok(bytes.to_vec()),
            _ => Err(not_found(path)),
        }
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut entries = self.entries.write();
        if !Self::parent_is_dir(&entries, path) {
            return Err(not_found(path.parent().unwrap_or(path)));
        }
        if let Some(Entry::Dir) = entries.get(path) {
            return Err(Self::already_exists(path));
        }
        entries.insert(path.to_path_buf(), Entry::File(Bytes::copy_from_slice(bytes)));
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut entries = self.entries.write();
        if !entries.contains_key(from) {
            return Err(not_found(from));
        }
        if entries.contains_key(to) {
            return Err(Self::already_exists(to));
        }
        if !Self::parent_is_dir(&entries, to) {
            return Err(not_found(to.parent().unwrap_or(to)));
        }

        // Move the entry and everything below it under one write lock
        let moved: Vec<PathBuf> = entries
            .keys()
            .filter(|k| k.starts_with(from))
            .cloned()
            .collect();
        for old in moved {
            if let Some(entry) = entries.remove(&old) {
                let suffix = old.strip_prefix(from).unwrap_or(Path::new(""));
                let new = if suffix.as_os_str().is_empty() {
                    to.to_path_buf()
                } else {
                    to.join(suffix)
                };
                entries.insert(new, entry);
            }
        }
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let mut entries = self.entries.write();
        match entries.get(path) {
            Some(Entry::File(_)) => {
                entries.remove(path);
                Ok(())
            }
            _ => Err(not_found(path)),
        }
    }

    fn delete_dir_all(&self, path: &Path) -> Result<()> {
        self.entries.write().retain(|k, _| !k.starts_with(path));
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut entries = self.entries.write();
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            match entries.get(ancestor) {
                Some(Entry::Dir) => {}
                Some(Entry::File(_)) => return Err(Self::already_exists(ancestor)),
                None => {
                    entries.insert(ancestor.to_path_buf(), Entry::Dir);
                }
            }
        }
        Ok(())
    }

    fn list(&self, dir: &Path) -> Result<Vec<String>> {
        let entries = self.entries.read();
        if !matches!(entries.get(dir), Some(Entry::Dir)) {
            return Err(not_found(dir));
        }
        // BTreeMap order keeps the result sorted
        Ok(entries
            .keys()
            .filter(|k| k.parent() == Some(dir))
            .filter_map(|k| k.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect())
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.entries.read().contains_key(path))
    }
}

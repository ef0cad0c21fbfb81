//! Tests for replication between environments
//!
//! These tests verify:
//! - The copy is byte-identical and resolves the same IDs
//! - Destination paths follow the source layout under the new root
//! - Version numbering when the destination is already ahead
//! - An interrupted copy publishes nothing and is cleaned up

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use slicedict::fs::{FileStore, LocalFileStore, MemoryFileStore};
use slicedict::store::{MetaEnvironment, METADATA_FILE};
use slicedict::{DictConfig, DictError, GlobalDictStore, Result};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const SRC_ROOT: &str = "/src";
const SRC_BASE: &str = "/src/dicts/d1";
const DST_ROOT: &str = "/dst";

/// Memory driver whose renames can be made to fail, before or after moving
#[derive(Default)]
struct CrashingFileStore {
    inner: MemoryFileStore,
    fail_rename: AtomicBool,
    fail_after_rename: AtomicBool,
}

impl FileStore for CrashingFileStore {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.inner.write(path, bytes)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        if self.fail_rename.load(Ordering::SeqCst) {
            return Err(DictError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected crash before publish",
            )));
        }
        self.inner.rename(from, to)?;
        if self.fail_after_rename.load(Ordering::SeqCst) {
            return Err(DictError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected directory sync failure",
            )));
        }
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<()> {
        self.inner.delete(path)
    }

    fn delete_dir_all(&self, path: &Path) -> Result<()> {
        self.inner.delete_dir_all(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.inner.create_dir_all(path)
    }

    fn list(&self, dir: &Path) -> Result<Vec<String>> {
        self.inner.list(dir)
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path)
    }
}

fn open_store(base: impl Into<PathBuf>, fs: Arc<dyn FileStore>) -> GlobalDictStore {
    let config = DictConfig::builder()
        .base_dir(base)
        .max_slice_entries(3)
        .copy_threads(2)
        .build();
    GlobalDictStore::open(config, fs).unwrap()
}

fn commit_values(store: &GlobalDictStore, work: &str, values: &[&str]) -> u64 {
    let mut writer = store.begin_write(work).unwrap();
    for v in values {
        writer.lookup_or_assign(v.as_bytes()).unwrap();
    }
    writer.commit().unwrap()
}

fn populated_source() -> (Arc<MemoryFileStore>, GlobalDictStore, u64) {
    let fs = Arc::new(MemoryFileStore::new());
    let store = open_store(SRC_BASE, fs.clone());
    commit_values(&store, "/src/work", &["pear", "apple", "fig", "kiwi"]);
    let version = commit_values(&store, "/src/work", &["banana", "cherry", "apple", "lime"]);
    (fs, store, version)
}

// =============================================================================
// Copy Tests
// =============================================================================

#[test]
fn test_copy_is_faithful() {
    let (src_fs, src, version) = populated_source();
    let dst_fs = Arc::new(MemoryFileStore::new());
    let env = MetaEnvironment::new(DST_ROOT, dst_fs.clone());

    let dst_base = src.copy_to_another_meta(Path::new(SRC_ROOT), &env).unwrap();
    assert_eq!(dst_base, PathBuf::from("/dst/dicts/d1"));

    let dst = open_store(&dst_base, dst_fs.clone());
    assert_eq!(dst.list_all_versions().unwrap(), vec![version]);

    let src_snapshot = src.open_version(version).unwrap();
    let dst_snapshot = dst.open_version(version).unwrap();
    assert_eq!(dst_snapshot.entries(), src_snapshot.entries());
    assert_eq!(dst_snapshot.next_id(), src_snapshot.next_id());
    assert_eq!(dst_snapshot.lookup_id(b"lime"), Some(6));

    // Slice files are byte-identical
    let src_dir = src.version_dir(version);
    let dst_dir = dst.version_dir(version);
    for file in src_snapshot.metadata().slices.values() {
        assert_eq!(
            dst_fs.read(&dst_dir.join(file)).unwrap(),
            src_fs.read(&src_dir.join(file)).unwrap()
        );
    }
}

#[test]
fn test_copy_leaves_source_untouched() {
    let (src_fs, src, version) = populated_source();
    let files_before = src_fs.file_count();
    let env = MetaEnvironment::new(DST_ROOT, Arc::new(MemoryFileStore::new()));

    src.copy_to_another_meta(Path::new(SRC_ROOT), &env).unwrap();

    assert_eq!(src_fs.file_count(), files_before);
    assert_eq!(src.latest_version().unwrap(), Some(version));
}

#[test]
fn test_copy_only_latest_version() {
    let (_src_fs, src, version) = populated_source();
    let dst_fs = Arc::new(MemoryFileStore::new());
    let env = MetaEnvironment::new(DST_ROOT, dst_fs.clone());

    let dst_base = src.copy_to_another_meta(Path::new(SRC_ROOT), &env).unwrap();

    let dst = open_store(dst_base, dst_fs);
    assert_eq!(dst.list_all_versions().unwrap(), vec![version]);
}

#[test]
fn test_copy_within_same_driver() {
    let (src_fs, src, version) = populated_source();
    let env = MetaEnvironment::new("/mirror", src_fs.clone());

    let dst_base = src.copy_to_another_meta(Path::new(SRC_ROOT), &env).unwrap();

    let dst = open_store(&dst_base, src_fs);
    assert_eq!(dst.lookup_id(version, b"banana").unwrap(), Some(4));
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_base_outside_root_rejected() {
    let (_src_fs, src, _) = populated_source();
    let env = MetaEnvironment::new(DST_ROOT, Arc::new(MemoryFileStore::new()));

    let result = src.copy_to_another_meta(Path::new("/elsewhere"), &env);

    assert!(matches!(result, Err(DictError::Config(_))));
}

#[test]
fn test_copy_onto_itself_rejected() {
    let (src_fs, src, _) = populated_source();
    let env = MetaEnvironment::new(SRC_ROOT, src_fs);

    let result = src.copy_to_another_meta(Path::new(SRC_ROOT), &env);

    assert!(matches!(result, Err(DictError::Config(_))));
}

#[test]
fn test_empty_source_rejected() {
    let src = open_store(SRC_BASE, Arc::new(MemoryFileStore::new()));
    let dst_fs = Arc::new(MemoryFileStore::new());
    let env = MetaEnvironment::new(DST_ROOT, dst_fs.clone());

    let result = src.copy_to_another_meta(Path::new(SRC_ROOT), &env);

    assert!(matches!(result, Err(DictError::InvalidState(_))));
    assert!(!dst_fs.exists(Path::new("/dst/dicts/d1")).unwrap());
}

// =============================================================================
// Numbering Tests
// =============================================================================

#[test]
fn test_destination_ahead_gets_next_number() {
    let (_src_fs, src, version) = populated_source();
    let dst_fs = Arc::new(MemoryFileStore::new());
    let env = MetaEnvironment::new(DST_ROOT, dst_fs.clone());

    // First copy lands at the source number; a second copy must move past it
    src.copy_to_another_meta(Path::new(SRC_ROOT), &env).unwrap();
    let dst_base = src.copy_to_another_meta(Path::new(SRC_ROOT), &env).unwrap();

    let dst = open_store(dst_base, dst_fs);
    assert_eq!(dst.list_all_versions().unwrap(), vec![version, version + 1]);

    let metadata = dst.get_metadata(version + 1).unwrap();
    assert_eq!(metadata.version, version + 1);
    assert_eq!(metadata.previous_version, Some(version));
    assert_eq!(
        dst.open_version(version + 1).unwrap().entries(),
        src.open_version(version).unwrap().entries()
    );
}

#[test]
fn test_destination_accepts_later_commits() {
    let (_src_fs, src, _) = populated_source();
    let dst_fs = Arc::new(MemoryFileStore::new());
    let env = MetaEnvironment::new(DST_ROOT, dst_fs.clone());
    let dst_base = src.copy_to_another_meta(Path::new(SRC_ROOT), &env).unwrap();

    let dst = open_store(dst_base, dst_fs);
    let version = commit_values(&dst, "/dst/work", &["apple", "mango"]);

    let snapshot = dst.open_version(version).unwrap();
    assert_eq!(snapshot.lookup_id(b"apple"), Some(1));
    assert_eq!(snapshot.lookup_id(b"mango"), Some(7));
}

// =============================================================================
// Crash Tests
// =============================================================================

#[test]
fn test_interrupted_copy_publishes_nothing() {
    let (_src_fs, src, _) = populated_source();
    let dst_fs = Arc::new(CrashingFileStore::default());
    dst_fs.fail_rename.store(true, Ordering::SeqCst);
    let env = MetaEnvironment::new(DST_ROOT, dst_fs.clone());

    assert!(src.copy_to_another_meta(Path::new(SRC_ROOT), &env).is_err());

    dst_fs.fail_rename.store(false, Ordering::SeqCst);
    let dst = open_store("/dst/dicts/d1", dst_fs.clone());
    assert!(dst.list_all_versions().unwrap().is_empty());
    assert!(dst.latest_snapshot().unwrap().is_none());

    assert_eq!(dst.clean_stale_copies().unwrap(), 1);
    assert!(dst_fs.list(Path::new("/dst/dicts/d1")).unwrap().is_empty());

    // Retrying after the crash succeeds
    src.copy_to_another_meta(Path::new(SRC_ROOT), &env).unwrap();
    assert_eq!(dst.list_all_versions().unwrap().len(), 1);
}

#[test]
fn test_failure_after_rename_still_copies() {
    let (_src_fs, src, version) = populated_source();
    let dst_fs = Arc::new(CrashingFileStore::default());
    dst_fs.fail_after_rename.store(true, Ordering::SeqCst);
    let env = MetaEnvironment::new(DST_ROOT, dst_fs.clone());

    let dst_base = src.copy_to_another_meta(Path::new(SRC_ROOT), &env).unwrap();

    let dst = open_store(dst_base, dst_fs);
    assert_eq!(dst.list_all_versions().unwrap(), vec![version]);
    assert_eq!(dst.lookup_id(version, b"kiwi").unwrap(), Some(3));
}

#[test]
fn test_staging_holds_metadata_only_at_the_end() {
    let (_src_fs, src, version) = populated_source();
    let dst_fs = Arc::new(CrashingFileStore::default());
    dst_fs.fail_rename.store(true, Ordering::SeqCst);
    let env = MetaEnvironment::new(DST_ROOT, dst_fs.clone());

    let _ = src.copy_to_another_meta(Path::new(SRC_ROOT), &env);

    // The staging directory is complete but was never published
    let staging = PathBuf::from(format!("/dst/dicts/d1/.copy-{}", version));
    let staged = dst_fs.list(&staging).unwrap();
    assert!(staged.iter().any(|n| n == METADATA_FILE));
    assert_eq!(
        staged.len(),
        src.get_metadata(version).unwrap().slice_count() + 1
    );
}

// =============================================================================
// Local Filesystem Tests
// =============================================================================

#[test]
fn test_copy_between_local_roots() {
    let temp = TempDir::new().unwrap();
    let src_root = temp.path().join("prod");
    let dst_root = temp.path().join("staging");
    let fs: Arc<dyn FileStore> = Arc::new(LocalFileStore::new());

    let src = open_store(src_root.join("dict"), Arc::clone(&fs));
    let work = temp.path().join("work");
    let version = commit_values(&src, work.to_str().unwrap(), &["x", "y", "z", "w"]);

    let env = MetaEnvironment::new(&dst_root, Arc::clone(&fs));
    let dst_base = src.copy_to_another_meta(&src_root, &env).unwrap();
    assert_eq!(dst_base, dst_root.join("dict"));

    let dst = open_store(dst_base, fs);
    assert_eq!(dst.lookup_id(version, b"w").unwrap(), Some(3));
    assert_eq!(dst.lookup_value(version, 1).unwrap(), Some(b"y".to_vec()));
}

//! Store Module
//!
//! The versioned global dictionary: immutable version directories, the
//! staged commit protocol that publishes them, retention and replication.
//!
//! ## Layout
//! ```text
//! {base_dir}/
//!   ├── version-1718000000000/
//!   │     ├── metadata          (written last, see `GlobalDictMetadata`)
//!   │     ├── slice-00000       (root range)
//!   │     └── slice-00001       (ranges in key order; keys live in metadata)
//!   ├── version-1718000050000/
//!   └── .copy-<N>/              (replication staging, never read)
//! ```
//!
//! ## Concurrency Model
//! - **Writer**: exactly one per base directory, enforced by the caller
//!   (an external lock). If two writers overlap, ID assignment is undefined;
//!   `commit` detects the overlap on a best-effort basis and fails with
//!   `IdAssignmentConflict`.
//! - **Readers**: unlimited, uncoordinated. A version directory becomes
//!   visible through a single atomic rename and is never modified afterwards.

mod metadata;
mod replicate;
mod retention;
mod snapshot;
mod writer;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::DictConfig;
use crate::error::{DictError, Result};
use crate::fs::{is_not_found, FileStore, LocalFileStore};
use crate::router::SliceRouter;
use crate::slice::{self, DictId, DictSlice};

pub use metadata::{slice_file_name, GlobalDictMetadata, MAX_SLICE_FILE_NAME_LEN};
pub use replicate::MetaEnvironment;
pub use retention::{RetentionPolicy, RetentionReport};
pub use snapshot::VersionSnapshot;
pub use writer::{CommitState, DictWriter};

/// Prefix of published version directories
pub const VERSION_DIR_PREFIX: &str = "version-";

/// Name of the manifest file inside a version directory
pub const METADATA_FILE: &str = "metadata";

/// Prefix of replication staging directories
pub(crate) const COPY_STAGING_PREFIX: &str = ".copy-";

/// A versioned, slice-partitioned global dictionary
///
/// ## Concurrency:
/// - `snapshots`: Protected by RwLock (opened versions, shared by readers)
/// - Everything else is immutable after `open`
/// - All methods use `&self`
pub struct GlobalDictStore {
    /// Dictionary configuration (base dir, retention, split threshold)
    config: DictConfig,

    /// Storage driver chosen at construction
    fs: Arc<dyn FileStore>,

    /// Routing and split policy
    router: SliceRouter,

    /// Opened versions still present in storage
    snapshots: RwLock<HashMap<u64, Arc<VersionSnapshot>>>,
}

impl GlobalDictStore {
    /// Open or create a dictionary on the given driver
    pub fn open(config: DictConfig, fs: Arc<dyn FileStore>) -> Result<Self> {
        config.validate()?;
        fs.create_dir_all(&config.base_dir)?;

        let router = SliceRouter::new(config.max_slice_entries);

        Ok(Self {
            config,
            fs,
            router,
            snapshots: RwLock::new(HashMap::new()),
        })
    }

    /// Open or create a dictionary on the local filesystem
    pub fn open_local(config: DictConfig) -> Result<Self> {
        Self::open(config, Arc::new(LocalFileStore::new()))
    }

    // =========================================================================
    // Versions
    // =========================================================================

    /// All published versions in ascending order
    pub fn list_all_versions(&self) -> Result<Vec<u64>> {
        let names = match self.fs.list(&self.config.base_dir) {
            Ok(names) => names,
            Err(e) if is_not_found(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut versions: Vec<u64> = names
            .iter()
            .filter_map(|name| parse_version_dir(name))
            .collect();
        versions.sort_unstable();
        versions.dedup();
        Ok(versions)
    }

    /// Newest published version, if any
    pub fn latest_version(&self) -> Result<Option<u64>> {
        Ok(self.list_all_versions()?.last().copied())
    }

    /// Path of a version directory
    pub fn version_dir(&self, version: u64) -> PathBuf {
        self.config
            .base_dir
            .join(format!("{}{}", VERSION_DIR_PREFIX, version))
    }

    /// Read and verify the manifest of a version
    pub fn get_metadata(&self, version: u64) -> Result<GlobalDictMetadata> {
        let dir = self.version_dir(version);
        let bytes = match self.fs.read(&dir.join(METADATA_FILE)) {
            Ok(bytes) => bytes,
            Err(e) if is_not_found(&e) => return Err(self.missing_in_version(version, METADATA_FILE)),
            Err(e) => return Err(e),
        };

        let metadata = GlobalDictMetadata::decode(&bytes)?;
        if metadata.version != version {
            return Err(DictError::CorruptVersion(format!(
                "directory {} holds metadata for version {}",
                dir.display(),
                metadata.version
            )));
        }
        metadata.validate()?;
        Ok(metadata)
    }

    // =========================================================================
    // Slices
    // =========================================================================

    /// Read a slice file from a directory
    pub fn read_slice(&self, dir: &Path, file_name: &str) -> Result<DictSlice> {
        let bytes = self.fs.read(&dir.join(file_name))?;
        slice::decode(&bytes).map_err(|e| match e {
            DictError::CorruptSlice(msg) => {
                DictError::CorruptSlice(format!("{}: {}", file_name, msg))
            }
            other => other,
        })
    }

    /// Write a slice into a directory that already exists
    pub fn write_slice(&self, dir: &Path, file_name: &str, slice: &DictSlice) -> Result<()> {
        let bytes = slice::encode(slice);
        self.fs.write(&dir.join(file_name), &bytes)?;
        debug!(
            file = %file_name,
            entries = slice.entry_count(),
            bytes = bytes.len(),
            "Wrote slice"
        );
        Ok(())
    }

    /// Delete a slice file
    pub fn delete_slice(&self, dir: &Path, file_name: &str) -> Result<()> {
        self.fs.delete(&dir.join(file_name))
    }

    // =========================================================================
    // Commit Protocol
    // =========================================================================

    /// Create (or clear) the working area for a new version
    ///
    /// Idempotent: anything left by an aborted commit is discarded.
    pub fn prepare_for_write(&self, working_dir: &Path) -> Result<()> {
        if !working_dir.is_absolute() {
            return Err(DictError::Config(format!(
                "working directory must be absolute: {}",
                working_dir.display()
            )));
        }
        if self.config.base_dir.starts_with(working_dir) {
            return Err(DictError::Config(format!(
                "working directory {} would contain the dictionary itself",
                working_dir.display()
            )));
        }
        if working_dir
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_version_dir)
            .is_some()
            && working_dir.parent() == Some(self.config.base_dir.as_path())
        {
            return Err(DictError::Config(format!(
                "working directory {} collides with a version directory",
                working_dir.display()
            )));
        }

        self.fs.delete_dir_all(working_dir)?;
        self.fs.create_dir_all(working_dir)?;
        debug!(dir = %working_dir.display(), "Prepared working area");
        Ok(())
    }

    /// Start a writer session on top of the latest published version
    ///
    /// The caller must hold the dictionary's external write lock for the
    /// whole session.
    pub fn begin_write(&self, working_dir: impl Into<PathBuf>) -> Result<DictWriter<'_>> {
        let base = self.latest_snapshot()?;
        let mut writer = DictWriter::new(self, working_dir.into(), base);
        writer.prepare()?;
        Ok(writer)
    }

    /// Publish the slices staged in `working_dir` as a new version
    ///
    /// Steps:
    /// 1. Check the manifest and the single-writer invariant
    /// 2. Check every indexed slice file is staged, drop strays
    /// 3. Write the metadata file (last file written)
    /// 4. Atomically rename the working area to `version-<N>`
    /// 5. Run retention (failures are logged, never returned)
    ///
    /// Nothing is visible to readers until step 4 completes.
    pub fn commit(&self, working_dir: &Path, metadata: &GlobalDictMetadata) -> Result<u64> {
        // Step 1: manifest invariants and optimistic writer check
        let mut metadata = metadata.clone();
        metadata.validate()?;

        let latest = self.latest_version()?;
        if latest != metadata.previous_version {
            return Err(DictError::IdAssignmentConflict(format!(
                "writer started from version {:?} but latest is now {:?}",
                metadata.previous_version, latest
            )));
        }
        if let Some(latest) = latest {
            let published = self.get_metadata(latest)?;
            if metadata.next_id < published.next_id {
                return Err(DictError::IdAssignmentConflict(format!(
                    "next id moved backward: {} < {}",
                    metadata.next_id, published.next_id
                )));
            }
        }

        // Step 2: staged files must match the index exactly
        let staged = self.fs.list(working_dir)?;
        for file in metadata.slices.values() {
            if !staged.iter().any(|name| name == file) {
                return Err(DictError::InvalidState(format!(
                    "slice {} missing from working area {}",
                    file,
                    working_dir.display()
                )));
            }
        }
        for name in &staged {
            let indexed = metadata.slices.values().any(|f| f == name);
            if !indexed {
                debug!(file = %name, "Removing unindexed file from working area");
                if name == METADATA_FILE {
                    self.fs.delete(&working_dir.join(name))?;
                } else {
                    self.delete_slice(working_dir, name)?;
                }
            }
        }

        // Step 3: metadata last
        let version = next_version_number(latest);
        metadata.version = version;
        metadata.created_at_ms = now_millis();
        self.fs
            .write(&working_dir.join(METADATA_FILE), &metadata.encode()?)?;

        // Step 4: atomic publish
        let version_dir = self.version_dir(version);
        if let Err(e) = self.fs.rename(working_dir, &version_dir) {
            if !self.rename_landed(working_dir, &version_dir) {
                return Err(e);
            }
            warn!(version, error = %e, "Rename reported failure after publishing");
        }

        info!(
            version,
            next_id = metadata.next_id,
            slices = metadata.slice_count(),
            "Published dictionary version"
        );

        // Step 5: retention never fails a published commit
        if let Err(e) = self.run_retention(Some(version)) {
            warn!(version, error = %e, "Retention after commit failed");
        }

        Ok(version)
    }

    /// Remove the working area of an abandoned commit
    pub fn clean_working_area(&self, working_dir: &Path) -> Result<()> {
        self.fs.delete_dir_all(working_dir)
    }

    // =========================================================================
    // Retention
    // =========================================================================

    /// Apply the retention policy now
    pub fn prune(&self) -> Result<RetentionReport> {
        self.run_retention(None)
    }

    fn run_retention(&self, protect: Option<u64>) -> Result<RetentionReport> {
        let policy = RetentionPolicy::from_config(&self.config);
        retention::run(self, &policy, now_millis(), protect)
    }

    // =========================================================================
    // Replication
    // =========================================================================

    /// Copy the latest version into another environment
    ///
    /// `src_root` is the metadata root this dictionary's base directory lives
    /// under; the destination base is the same relative path under
    /// `dst.root`. Returns the destination base directory. This dictionary
    /// is only read.
    pub fn copy_to_another_meta(&self, src_root: &Path, dst: &MetaEnvironment) -> Result<PathBuf> {
        replicate::copy_latest(self, src_root, dst)
    }

    /// Remove leftovers of replications into this dictionary that crashed
    pub fn clean_stale_copies(&self) -> Result<usize> {
        replicate::clean_stale_copies(self)
    }

    // =========================================================================
    // Readers
    // =========================================================================

    /// Open an immutable view of one version
    ///
    /// All slices are decoded into memory, so the returned snapshot stays
    /// readable even if retention later deletes the version directory.
    /// The cache only holds versions still present in storage; versions
    /// pruned by another process are dropped on the next open.
    pub fn open_version(&self, version: u64) -> Result<Arc<VersionSnapshot>> {
        let cached = self.snapshots.read().get(&version).cloned();
        if let Some(snapshot) = cached {
            if self.fs.exists(&self.version_dir(version))? {
                return Ok(snapshot);
            }
            self.evict_snapshot(version);
            return Err(DictError::VersionNotFound(version));
        }

        let metadata = self.get_metadata(version)?;
        let dir = self.version_dir(version);

        let mut slices = std::collections::BTreeMap::new();
        for (key, file) in &metadata.slices {
            let slice = match self.read_slice(&dir, file) {
                Ok(slice) => slice,
                Err(e) if is_not_found(&e) => return Err(self.missing_in_version(version, file)),
                Err(e) => return Err(e),
            };
            slices.insert(key.clone(), Arc::new(slice));
        }

        let snapshot = Arc::new(VersionSnapshot::new(metadata, slices, self.router.clone()));

        let live = self.list_all_versions()?;
        let mut cache = self.snapshots.write();
        cache.retain(|v, _| live.binary_search(v).is_ok());
        if live.binary_search(&version).is_ok() {
            cache.entry(version).or_insert_with(|| Arc::clone(&snapshot));
        }
        Ok(snapshot)
    }

    /// Open the newest version, if any
    pub fn latest_snapshot(&self) -> Result<Option<Arc<VersionSnapshot>>> {
        match self.latest_version()? {
            Some(version) => self.open_version(version).map(Some),
            None => Ok(None),
        }
    }

    /// ID of `value` in `version`
    pub fn lookup_id(&self, version: u64, value: &[u8]) -> Result<Option<DictId>> {
        Ok(self.open_version(version)?.lookup_id(value))
    }

    /// Value with `id` in `version`
    pub fn lookup_value(&self, version: u64, id: DictId) -> Result<Option<Vec<u8>>> {
        Ok(self.open_version(version)?.lookup_value(id))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn base_dir(&self) -> &Path {
        &self.config.base_dir
    }

    pub fn config(&self) -> &DictConfig {
        &self.config
    }

    pub fn router(&self) -> &SliceRouter {
        &self.router
    }

    pub(crate) fn fs(&self) -> &Arc<dyn FileStore> {
        &self.fs
    }

    /// Number of versions currently held open in memory
    pub fn cached_snapshot_count(&self) -> usize {
        self.snapshots.read().len()
    }

    pub(crate) fn evict_snapshot(&self, version: u64) {
        self.snapshots.write().remove(&version);
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// True if a rename that returned an error has nonetheless moved `from`
    /// to `to` (the driver failed after the atomic step)
    pub(crate) fn rename_landed(&self, from: &Path, to: &Path) -> bool {
        let target = matches!(self.fs.exists(&to.join(METADATA_FILE)), Ok(true));
        let source_gone = matches!(self.fs.exists(from), Ok(false));
        target && source_gone
    }

    /// Error for a file missing from a version: gone version or corrupt one
    fn missing_in_version(&self, version: u64, file: &str) -> DictError {
        match self.fs.exists(&self.version_dir(version)) {
            Ok(true) => DictError::CorruptVersion(format!(
                "version {} is missing {}",
                version, file
            )),
            Ok(false) => DictError::VersionNotFound(version),
            Err(e) => e,
        }
    }
}

/// "version-42" → Some(42)
pub(crate) fn parse_version_dir(name: &str) -> Option<u64> {
    name.strip_prefix(VERSION_DIR_PREFIX)?.parse().ok()
}

/// Version numbers are unix millis, bumped past `latest` if the clock lags
pub(crate) fn next_version_number(latest: Option<u64>) -> u64 {
    let now = now_millis();
    match latest {
        Some(latest) => now.max(latest + 1),
        None => now,
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

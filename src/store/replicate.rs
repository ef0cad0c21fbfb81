//! Replication
//!
//! Copies the latest version of a dictionary into another environment.
//!
//! ## Steps
//! 1. Resolve the destination base: same path relative to the metadata root
//! 2. Copy every slice file byte for byte into `{dst_base}/.copy-<N>/`
//! 3. Write the metadata last
//! 4. Atomically rename the staging directory to `version-<N>`
//!
//! A crash anywhere before step 4 leaves only a `.copy-*` directory, which
//! readers never look at and `clean_stale_copies` removes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{DictError, Result};
use crate::fs::FileStore;

use super::{GlobalDictStore, COPY_STAGING_PREFIX, METADATA_FILE};

/// A metadata environment: where dictionaries live and how to reach them
#[derive(Clone)]
pub struct MetaEnvironment {
    /// Root directory all dictionary base directories live under
    pub root: PathBuf,
    /// Driver for this environment's storage
    pub fs: Arc<dyn FileStore>,
}

impl MetaEnvironment {
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn FileStore>) -> Self {
        Self {
            root: root.into(),
            fs,
        }
    }

    /// Base directory a dictionary at `src_base` (under `src_root`) maps to here
    pub fn resolve_base(&self, src_root: &Path, src_base: &Path) -> Result<PathBuf> {
        let relative = src_base.strip_prefix(src_root).map_err(|_| {
            DictError::Config(format!(
                "dictionary {} is not under source root {}",
                src_base.display(),
                src_root.display()
            ))
        })?;
        Ok(self.root.join(relative))
    }
}

impl std::fmt::Debug for MetaEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaEnvironment")
            .field("root", &self.root)
            .finish()
    }
}

/// Copy the latest version of `store` into `dst`; returns the destination base
pub(crate) fn copy_latest(
    store: &GlobalDictStore,
    src_root: &Path,
    dst: &MetaEnvironment,
) -> Result<PathBuf> {
    // Step 1: resolve both sides
    let dst_base = dst.resolve_base(src_root, store.base_dir())?;
    if dst_base == store.base_dir() {
        return Err(DictError::Config(format!(
            "destination {} is the source dictionary",
            dst_base.display()
        )));
    }
    let version = store.latest_version()?.ok_or_else(|| {
        DictError::InvalidState(format!(
            "dictionary {} has no committed version to copy",
            store.base_dir().display()
        ))
    })?;
    let mut metadata = store.get_metadata(version)?;
    let src_dir = store.version_dir(version);

    let mut dst_config = store.config().clone();
    dst_config.base_dir = dst_base.clone();
    let dst_store = GlobalDictStore::open(dst_config, Arc::clone(&dst.fs))?;

    // Keep the source number unless the destination is already past it
    let dst_latest = dst_store.latest_version()?;
    let dst_version = match dst_latest {
        Some(latest) if latest >= version => latest + 1,
        _ => version,
    };

    // Step 2: slices into a private staging directory
    let staging = dst_base.join(format!("{}{}", COPY_STAGING_PREFIX, dst_version));
    dst.fs.delete_dir_all(&staging)?;
    dst.fs.create_dir_all(&staging)?;

    let files: Vec<&String> = metadata.slices.values().collect();
    copy_files(
        store.fs().as_ref(),
        &src_dir,
        dst.fs.as_ref(),
        &staging,
        &files,
        store.config().copy_threads,
    )?;

    // Step 3: metadata last, renumbered for the destination
    metadata.version = dst_version;
    metadata.previous_version = dst_latest;
    dst.fs.write(&staging.join(METADATA_FILE), &metadata.encode()?)?;

    // Step 4: atomic publish
    let version_dir = dst_store.version_dir(dst_version);
    if let Err(e) = dst.fs.rename(&staging, &version_dir) {
        if !dst_store.rename_landed(&staging, &version_dir) {
            return Err(e);
        }
        warn!(dst_version, error = %e, "Rename reported failure after publishing copy");
    }

    info!(
        src = %store.base_dir().display(),
        dst = %dst_base.display(),
        src_version = version,
        dst_version,
        slices = files.len(),
        "Copied dictionary to another environment"
    );

    Ok(dst_base)
}

/// Delete `.copy-*` directories left by interrupted replications
pub(crate) fn clean_stale_copies(store: &GlobalDictStore) -> Result<usize> {
    let names = store.fs().list(store.base_dir())?;
    let mut removed = 0;
    for name in names.iter().filter(|n| n.starts_with(COPY_STAGING_PREFIX)) {
        store.fs().delete_dir_all(&store.base_dir().join(name))?;
        debug!(dir = %name, "Removed stale copy staging directory");
        removed += 1;
    }
    Ok(removed)
}

/// Copy files verbatim using up to `threads` scoped workers
fn copy_files(
    src_fs: &dyn FileStore,
    src_dir: &Path,
    dst_fs: &dyn FileStore,
    dst_dir: &Path,
    files: &[&String],
    threads: usize,
) -> Result<()> {
    if files.is_empty() {
        return Ok(());
    }
    let chunk_size = files.len().div_ceil(threads.max(1));

    let results = crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = files
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move |_| -> Result<()> {
                    for file in chunk {
                        let bytes = src_fs.read(&src_dir.join(file.as_str()))?;
                        dst_fs.write(&dst_dir.join(file.as_str()), &bytes)?;
                    }
                    Ok(())
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| {
                h.join().unwrap_or_else(|_| {
                    Err(DictError::InvalidState("copy worker panicked".to_string()))
                })
            })
            .collect::<Vec<Result<()>>>()
    })
    .map_err(|_| DictError::InvalidState("copy worker panicked".to_string()))?;

    results.into_iter().collect()
}

//! Writer sessions
//!
//! One `DictWriter` stages one new version.
//!
//! ## State Machine
//! ```text
//!   Idle ──► Preparing ──► Staged ──► Publishing ──► Published
//!               ▲  │          │           │
//!               │  └──────────┴───────────┴──► Failed
//!               └──────────────────────────────────┘  (commit retries)
//! ```
//! Assigning a new value while `Staged` moves the session back to
//! `Preparing`; the next `stage` rewrites the working area.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{DictError, Result};
use crate::router::SplitDecision;
use crate::slice::{DictId, DictSlice, DictSliceKey};

use super::{slice_file_name, GlobalDictMetadata, GlobalDictStore, VersionSnapshot};

/// Commit protocol state of a writer session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    /// Created, working area not prepared yet
    Idle,
    /// Working area ready, values being assigned
    Preparing,
    /// All slices and the manifest are in the working area
    Staged,
    /// Publishing in progress
    Publishing,
    /// New version visible; the session is finished
    Published,
    /// A step failed; `commit` retries from `Preparing`
    Failed,
}

/// A slice as seen by the writer: shared with the base version until touched
#[derive(Debug)]
enum StagedSlice {
    Unchanged(Arc<DictSlice>),
    Dirty(DictSlice),
}

impl StagedSlice {
    fn get(&self) -> &DictSlice {
        match self {
            StagedSlice::Unchanged(slice) => slice.as_ref(),
            StagedSlice::Dirty(slice) => slice,
        }
    }

    /// Copy-on-modify
    fn make_mut(&mut self) -> &mut DictSlice {
        if let StagedSlice::Unchanged(slice) = self {
            *self = StagedSlice::Dirty((**slice).clone());
        }
        match self {
            StagedSlice::Dirty(slice) => slice,
            StagedSlice::Unchanged(_) => unreachable!("converted to Dirty above"),
        }
    }

    fn into_owned(self) -> DictSlice {
        match self {
            StagedSlice::Unchanged(slice) => Arc::try_unwrap(slice).unwrap_or_else(|s| (*s).clone()),
            StagedSlice::Dirty(slice) => slice,
        }
    }
}

/// Stages and publishes one new version of a dictionary
///
/// Only one writer may be active per dictionary at a time; see the
/// module-level docs of `store` for what happens otherwise.
pub struct DictWriter<'a> {
    store: &'a GlobalDictStore,
    working_dir: PathBuf,

    /// Latest published version when the session started
    base: Option<Arc<VersionSnapshot>>,

    /// Staged slice index
    slices: BTreeMap<DictSliceKey, StagedSlice>,

    next_id: DictId,

    /// Values assigned during this session
    assigned: u64,

    state: CommitState,

    /// Manifest produced by the last successful `stage`
    staged: Option<GlobalDictMetadata>,
}

impl<'a> DictWriter<'a> {
    pub(crate) fn new(
        store: &'a GlobalDictStore,
        working_dir: PathBuf,
        base: Option<Arc<VersionSnapshot>>,
    ) -> Self {
        let mut slices = BTreeMap::new();
        let next_id = match &base {
            Some(snapshot) => {
                for (key, slice) in snapshot.slices() {
                    slices.insert(key.clone(), StagedSlice::Unchanged(Arc::clone(slice)));
                }
                snapshot.next_id()
            }
            None => {
                slices.insert(DictSliceKey::root(), StagedSlice::Dirty(DictSlice::new()));
                0
            }
        };

        Self {
            store,
            working_dir,
            base,
            slices,
            next_id,
            assigned: 0,
            state: CommitState::Idle,
            staged: None,
        }
    }

    /// Create or clear the working area (Idle/Failed → Preparing)
    pub fn prepare(&mut self) -> Result<()> {
        self.ensure_not_published()?;
        match self.store.prepare_for_write(&self.working_dir) {
            Ok(()) => {
                self.state = CommitState::Preparing;
                self.staged = None;
                Ok(())
            }
            Err(e) => {
                self.state = CommitState::Failed;
                Err(e)
            }
        }
    }

    /// ID of `value` in the staged state, without assigning
    pub fn lookup(&self, value: &[u8]) -> Option<DictId> {
        let key = self.store.router().route_for_read(&self.slices, value)?;
        self.slices.get(key)?.get().get_id(value)
    }

    /// ID of `value`, assigning the next unused ID if it is new
    pub fn lookup_or_assign(&mut self, value: &[u8]) -> Result<DictId> {
        self.ensure_not_published()?;
        if self.state == CommitState::Idle {
            return Err(DictError::InvalidState(
                "writer used before prepare".to_string(),
            ));
        }

        let (key, decision) = {
            let router = self.store.router();
            let key = router.route_for_read(&self.slices, value).ok_or_else(|| {
                DictError::CorruptVersion("slice index does not cover value".to_string())
            })?;
            let current = &self.slices[key];
            if let Some(id) = current.get().get_id(value) {
                return Ok(id);
            }
            let load = current.get().entry_count();
            match router.route_for_write(&self.slices, value, load) {
                Some((key, decision)) => (key.clone(), decision),
                None => (key.clone(), SplitDecision::Keep),
            }
        };

        let id = self.next_id;
        let next = id.checked_add(1).ok_or(DictError::IdSpaceExhausted)?;

        let staged = self
            .slices
            .get_mut(&key)
            .ok_or_else(|| DictError::InvalidState(format!("slice {} vanished", key)))?;
        if let Some(existing) = staged.make_mut().insert(value, id) {
            return Err(DictError::IdAssignmentConflict(format!(
                "value already resolves to id {} while assigning {}",
                existing, id
            )));
        }

        self.next_id = next;
        self.assigned += 1;

        if decision == SplitDecision::Split {
            self.split_slice(&key);
        }

        // New values invalidate anything already staged
        if self.state == CommitState::Staged {
            self.state = CommitState::Preparing;
            self.staged = None;
        }

        Ok(id)
    }

    /// Write every slice and build the manifest (Preparing → Staged)
    ///
    /// Touched slices are encoded; untouched slices are copied byte for
    /// byte from the base version, so every version directory is complete
    /// on its own.
    pub fn stage(&mut self) -> Result<&GlobalDictMetadata> {
        self.ensure_not_published()?;
        if matches!(self.state, CommitState::Failed | CommitState::Idle) {
            self.prepare()?;
        }
        if self.state != CommitState::Staged {
            match self.stage_inner() {
                Ok(metadata) => {
                    self.staged = Some(metadata);
                    self.state = CommitState::Staged;
                }
                Err(e) => {
                    self.state = CommitState::Failed;
                    return Err(e);
                }
            }
        }
        self.staged
            .as_ref()
            .ok_or_else(|| DictError::InvalidState("nothing staged".to_string()))
    }

    /// Stage if needed, then publish (→ Published)
    ///
    /// Returns the new version number. On failure nothing becomes visible,
    /// the session moves to `Failed` and `commit` may be called again.
    pub fn commit(&mut self) -> Result<u64> {
        self.stage()?;
        let metadata = match &self.staged {
            Some(metadata) => metadata.clone(),
            None => return Err(DictError::InvalidState("nothing staged".to_string())),
        };

        self.state = CommitState::Publishing;
        match self.store.commit(&self.working_dir, &metadata) {
            Ok(version) => {
                self.state = CommitState::Published;
                info!(
                    version,
                    assigned = self.assigned,
                    next_id = self.next_id,
                    "Writer session committed"
                );
                Ok(version)
            }
            Err(e) => {
                self.state = CommitState::Failed;
                Err(e)
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> CommitState {
        self.state
    }

    pub fn next_id(&self) -> DictId {
        self.next_id
    }

    /// Number of new values assigned in this session
    pub fn assigned_count(&self) -> u64 {
        self.assigned
    }

    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Version this session builds on
    pub fn base_version(&self) -> Option<u64> {
        self.base.as_ref().map(|s| s.version())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_not_published(&self) -> Result<()> {
        if self.state == CommitState::Published {
            return Err(DictError::InvalidState(
                "writer session already published".to_string(),
            ));
        }
        Ok(())
    }

    fn split_slice(&mut self, key: &DictSliceKey) {
        let slice = match self.slices.remove(key) {
            Some(staged) => staged.into_owned(),
            None => return,
        };
        let pieces = self.store.router().split_to_fit(key.clone(), slice);
        debug!(range = %key, pieces = pieces.len(), "Slice split");
        for (piece_key, piece) in pieces {
            self.slices.insert(piece_key, StagedSlice::Dirty(piece));
        }
    }

    fn stage_inner(&self) -> Result<GlobalDictMetadata> {
        let mut index = BTreeMap::new();
        let mut total_entries: u64 = 0;

        for (ordinal, (key, staged)) in self.slices.iter().enumerate() {
            let slice = staged.get();
            total_entries += slice.entry_count() as u64;

            if let Some(max) = slice.max_id() {
                if max >= self.next_id {
                    return Err(DictError::IdAssignmentConflict(format!(
                        "slice {} holds id {} but next id is {}",
                        key, max, self.next_id
                    )));
                }
            }

            let file = slice_file_name(ordinal);
            match (staged, &self.base) {
                (StagedSlice::Unchanged(_), Some(base)) => self.copy_unchanged(base, key, &file)?,
                _ => self.store.write_slice(&self.working_dir, &file, slice)?,
            }
            index.insert(key.clone(), file);
        }

        // IDs are dense and never deleted: one value per assigned ID
        if total_entries != u64::from(self.next_id) {
            return Err(DictError::IdAssignmentConflict(format!(
                "{} values staged for {} assigned ids",
                total_entries, self.next_id
            )));
        }

        Ok(GlobalDictMetadata {
            version: 0,
            next_id: self.next_id,
            value_count: total_entries,
            previous_version: self.base_version(),
            created_at_ms: 0,
            slices: index,
        })
    }

    /// Copy an untouched slice file from the base version verbatim
    fn copy_unchanged(&self, base: &VersionSnapshot, key: &DictSliceKey, file: &str) -> Result<()> {
        let base_file = base.metadata().slice_file(key).ok_or_else(|| {
            DictError::CorruptVersion(format!(
                "version {} has no file for slice {}",
                base.version(),
                key
            ))
        })?;
        let src = self.store.version_dir(base.version()).join(base_file);
        let bytes = match self.store.fs().read(&src) {
            Ok(bytes) => bytes,
            Err(e) if crate::fs::is_not_found(&e) => {
                return Err(DictError::VersionNotFound(base.version()));
            }
            Err(e) => return Err(e),
        };
        self.store.fs().write(&self.working_dir.join(file), &bytes)
    }
}

//! Version snapshots
//!
//! Read-only, fully decoded view of one published version.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::router::SliceRouter;
use crate::slice::{DictId, DictSlice, DictSliceKey, NodeIndex};

use super::GlobalDictMetadata;

/// Immutable view of one version
///
/// Holds its own copy of every slice, so it never touches storage again
/// after being opened.
#[derive(Debug)]
pub struct VersionSnapshot {
    metadata: GlobalDictMetadata,
    slices: BTreeMap<DictSliceKey, Arc<DictSlice>>,
    router: SliceRouter,
    /// Reverse index, built once at open
    ids: IdIndex,
}

/// Where each ID's terminal node lives
#[derive(Debug)]
struct IdIndex {
    /// Slices in key order
    slices: Vec<Arc<DictSlice>>,
    /// `parent_links` of each slice, same order
    parents: Vec<Vec<NodeIndex>>,
    /// `(slice position, node)` indexed by ID
    locations: Vec<Option<(u32, u32)>>,
}

impl IdIndex {
    fn build(slices: &BTreeMap<DictSliceKey, Arc<DictSlice>>, next_id: DictId) -> Self {
        let mut index = Self {
            slices: Vec::with_capacity(slices.len()),
            parents: Vec::with_capacity(slices.len()),
            locations: vec![None; next_id as usize],
        };
        for (position, slice) in slices.values().enumerate() {
            for (id, node) in slice.terminals() {
                if let Some(slot) = index.locations.get_mut(id as usize) {
                    *slot = Some((position as u32, node as u32));
                }
            }
            index.parents.push(slice.parent_links());
            index.slices.push(Arc::clone(slice));
        }
        index
    }

    fn value_of(&self, id: DictId) -> Option<Vec<u8>> {
        let (position, node) = (*self.locations.get(id as usize)?)?;
        let position = position as usize;
        self.slices[position].value_at(node as usize, &self.parents[position])
    }
}

impl VersionSnapshot {
    pub(crate) fn new(
        metadata: GlobalDictMetadata,
        slices: BTreeMap<DictSliceKey, Arc<DictSlice>>,
        router: SliceRouter,
    ) -> Self {
        let ids = IdIndex::build(&slices, metadata.next_id);
        Self {
            metadata,
            slices,
            router,
            ids,
        }
    }

    pub fn version(&self) -> u64 {
        self.metadata.version
    }

    pub fn metadata(&self) -> &GlobalDictMetadata {
        &self.metadata
    }

    pub fn next_id(&self) -> DictId {
        self.metadata.next_id
    }

    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    pub fn slice(&self, key: &DictSliceKey) -> Option<&Arc<DictSlice>> {
        self.slices.get(key)
    }

    /// Slices in key order
    pub fn slices(&self) -> impl Iterator<Item = (&DictSliceKey, &Arc<DictSlice>)> {
        self.slices.iter()
    }

    /// ID of `value`, if stored in this version
    pub fn lookup_id(&self, value: &[u8]) -> Option<DictId> {
        let key = self.router.route_for_read(&self.slices, value)?;
        self.slices.get(key)?.get_id(value)
    }

    /// Value stored under `id` in this version
    pub fn lookup_value(&self, id: DictId) -> Option<Vec<u8>> {
        self.ids.value_of(id)
    }

    /// Every `(value, id)` pair in value order
    pub fn entries(&self) -> Vec<(Vec<u8>, DictId)> {
        self.slices.values().flat_map(|slice| slice.entries()).collect()
    }
}

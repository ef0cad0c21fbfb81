//! Slice Router
//!
//! Decides which slice a value belongs to and when a slice must split.
//!
//! ## Routing
//! The slice index is an ordered map from `DictSliceKey` (inclusive lower
//! bound) to slice. A value routes to the greatest key `<=` the value. The
//! answer depends only on the index and the value, never on the order in
//! which values were inserted.
//!
//! ## Splitting
//! ```text
//!   key K: [ v0 v1 v2 | v3 v4 ]          (sorted entries, median cut)
//!                      ^
//!   new key = shortest prefix of v3 that sorts after v2
//!
//!   key K: [ v0 v1 v2 ]   key P: [ v3 v4 ]
//! ```
//! Each value keeps its ID; only slice membership changes.

use std::collections::BTreeMap;
use std::ops::Bound;

use tracing::debug;

use crate::slice::{DictSlice, DictSliceKey};

/// Whether a write requires the target slice to split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitDecision {
    /// Slice stays within its bound after the insert
    Keep,
    /// Slice exceeds its bound after the insert and must be split
    Split,
}

/// Result of splitting one slice into two adjacent ranges
#[derive(Debug)]
pub struct SplitOutcome {
    /// Lower range, keeps the original key
    pub left: (DictSliceKey, DictSlice),
    /// Upper range, starts at the new key
    pub right: (DictSliceKey, DictSlice),
}

/// Routes values to slices and splits oversized slices
#[derive(Debug, Clone)]
pub struct SliceRouter {
    /// Max number of values a slice may hold
    max_slice_entries: usize,
}

impl SliceRouter {
    pub fn new(max_slice_entries: usize) -> Self {
        Self {
            max_slice_entries: max_slice_entries.max(1),
        }
    }

    pub fn max_slice_entries(&self) -> usize {
        self.max_slice_entries
    }

    /// Key of the slice that owns `value`
    ///
    /// Returns `None` only if the index lacks a range covering the value,
    /// which a well-formed index (one containing the root key) never does.
    pub fn route_for_read<'a, T>(
        &self,
        index: &'a BTreeMap<DictSliceKey, T>,
        value: &[u8],
    ) -> Option<&'a DictSliceKey> {
        floor_key(index, value)
    }

    /// Key of the slice a new value goes into, plus whether that slice must
    /// split once the value is added
    ///
    /// `current_load` is the number of values the target slice holds now.
    pub fn route_for_write<'a, T>(
        &self,
        index: &'a BTreeMap<DictSliceKey, T>,
        value: &[u8],
        current_load: usize,
    ) -> Option<(&'a DictSliceKey, SplitDecision)> {
        let key = floor_key(index, value)?;
        let decision = if current_load + 1 > self.max_slice_entries {
            SplitDecision::Split
        } else {
            SplitDecision::Keep
        };
        Some((key, decision))
    }

    /// True if `slice` is over the bound
    pub fn needs_split(&self, slice: &DictSlice) -> bool {
        slice.entry_count() > self.max_slice_entries
    }

    /// Split `slice` (owning range `key`) at its median value
    ///
    /// Returns `None` if the slice holds fewer than two values.
    pub fn split(&self, key: &DictSliceKey, slice: &DictSlice) -> Option<SplitOutcome> {
        let entries = slice.entries();
        if entries.len() < 2 {
            return None;
        }

        let mid = entries.len() / 2;
        let (lower, upper) = entries.split_at(mid);
        let last_left = &lower[lower.len() - 1].0;
        let first_right = &upper[0].0;

        let split_key = DictSliceKey::new(separator(last_left, first_right));

        debug!(
            range = %key,
            split_at = %split_key,
            left = lower.len(),
            right = upper.len(),
            "Splitting slice"
        );

        Some(SplitOutcome {
            left: (
                key.clone(),
                DictSlice::from_entries(lower.iter().map(|(v, id)| (v.as_slice(), *id))),
            ),
            right: (
                split_key,
                DictSlice::from_entries(upper.iter().map(|(v, id)| (v.as_slice(), *id))),
            ),
        })
    }

    /// Split `slice` repeatedly until every piece is within the bound
    pub fn split_to_fit(&self, key: DictSliceKey, slice: DictSlice) -> Vec<(DictSliceKey, DictSlice)> {
        let mut done = Vec::new();
        let mut todo = vec![(key, slice)];

        while let Some((key, slice)) = todo.pop() {
            if !self.needs_split(&slice) {
                done.push((key, slice));
                continue;
            }
            match self.split(&key, &slice) {
                Some(outcome) => {
                    todo.push(outcome.right);
                    todo.push(outcome.left);
                }
                None => done.push((key, slice)),
            }
        }

        done.sort_by(|a, b| a.0.cmp(&b.0));
        done
    }
}

/// Greatest key `<=` value
fn floor_key<'a, T>(index: &'a BTreeMap<DictSliceKey, T>, value: &[u8]) -> Option<&'a DictSliceKey> {
    let target = DictSliceKey::new(value.to_vec());
    index
        .range((Bound::Unbounded, Bound::Included(&target)))
        .next_back()
        .map(|(k, _)| k)
}

/// Shortest prefix of `upper` that sorts strictly after `lower`
///
/// Requires `lower < upper`. The prefix ends at the first byte where the two
/// values differ (or one past the end of `lower` if it is a prefix of `upper`).
fn separator(lower: &[u8], upper: &[u8]) -> Vec<u8> {
    let common = lower.iter().zip(upper).take_while(|(a, b)| a == b).count();
    upper[..(common + 1).min(upper.len())].to_vec()
}

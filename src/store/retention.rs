//! Retention
//!
//! Prunes old versions by count and age after each publish.
//!
//! Every version directory is a full copy (no slice files are shared
//! between versions), so pruning a version deletes its directory outright.
//! Open `VersionSnapshot`s hold decoded slices and are unaffected.

use std::time::Duration;

use tracing::{info, warn};

use crate::config::DictConfig;
use crate::error::Result;

use super::GlobalDictStore;

/// Count and age limits for retained versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Max number of retained versions (at least 1)
    pub max_versions: usize,
    /// Max age of a retained version other than the newest
    pub version_ttl: Duration,
}

/// What one retention pass did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetentionReport {
    /// Versions still present, ascending
    pub retained: Vec<u64>,
    /// Versions deleted, ascending
    pub deleted: Vec<u64>,
    /// Versions whose deletion failed, with the error text
    pub failed: Vec<(u64, String)>,
}

impl RetentionPolicy {
    pub fn new(max_versions: usize, version_ttl: Duration) -> Self {
        Self {
            max_versions: max_versions.max(1),
            version_ttl,
        }
    }

    pub fn from_config(config: &DictConfig) -> Self {
        Self::new(config.max_versions, config.version_ttl)
    }

    /// Versions to delete, ascending
    ///
    /// Version numbers double as creation times in unix millis. The newest
    /// version and `protect` (the version being published) are never
    /// selected.
    pub fn select_expired(&self, versions: &[u64], now_ms: u64, protect: Option<u64>) -> Vec<u64> {
        let mut sorted = versions.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();

        let newest = match sorted.first() {
            Some(&v) => v,
            None => return Vec::new(),
        };
        let pinned = |v: u64| v == newest || Some(v) == protect;
        let ttl_ms = self.version_ttl.as_millis() as u64;

        // Descending; pinned versions always survive
        let mut kept = Vec::new();
        let mut expired = Vec::new();
        for &v in &sorted {
            if !pinned(v) && now_ms.saturating_sub(v) > ttl_ms {
                expired.push(v);
            } else {
                kept.push(v);
            }
        }

        // Drop the oldest until within the count limit
        while kept.len() > self.max_versions {
            match kept.iter().rposition(|&v| !pinned(v)) {
                Some(pos) => expired.push(kept.remove(pos)),
                None => break,
            }
        }

        expired.sort_unstable();
        expired
    }
}

/// Run one retention pass over `store`
///
/// Listing failures are returned; individual delete failures are logged and
/// reported, since a leftover version only wastes space.
pub(crate) fn run(
    store: &GlobalDictStore,
    policy: &RetentionPolicy,
    now_ms: u64,
    protect: Option<u64>,
) -> Result<RetentionReport> {
    let versions = store.list_all_versions()?;
    let expired = policy.select_expired(&versions, now_ms, protect);

    let mut report = RetentionReport::default();
    for version in expired {
        // Forget the cached snapshot first; open Arcs stay valid
        store.evict_snapshot(version);
        match store.fs().delete_dir_all(&store.version_dir(version)) {
            Ok(()) => report.deleted.push(version),
            Err(e) => {
                warn!(version, error = %e, "Failed to delete expired version");
                report.failed.push((version, e.to_string()));
            }
        }
    }

    report.retained = versions
        .into_iter()
        .filter(|v| !report.deleted.contains(v))
        .collect();

    if !report.deleted.is_empty() || !report.failed.is_empty() {
        info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            retained = report.retained.len(),
            "Retention pass finished"
        );
    }

    Ok(report)
}

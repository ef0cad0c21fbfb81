//! Configuration for slicedict
//!
//! Centralized configuration with sensible defaults. Retention limits are
//! injected here instead of being read from a process-wide environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DictError, Result};

/// Main configuration for one global dictionary
#[derive(Debug, Clone)]
pub struct DictConfig {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Base directory holding every version of this dictionary
    /// Internal structure:
    ///   {base_dir}/
    ///     ├── version-<N>/metadata
    ///     └── version-<N>/slice-<key>
    pub base_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Retention Configuration
    // -------------------------------------------------------------------------
    /// Max number of versions kept after a commit (the newest always stays)
    pub max_versions: usize,

    /// Max age of a retained version (the newest always stays)
    pub version_ttl: Duration,

    // -------------------------------------------------------------------------
    // Slice Configuration
    // -------------------------------------------------------------------------
    /// Max number of values in one slice before it is split
    pub max_slice_entries: usize,

    // -------------------------------------------------------------------------
    // Replication Configuration
    // -------------------------------------------------------------------------
    /// Worker threads used to copy slice files between environments
    pub copy_threads: usize,
}

impl Default for DictConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./slicedict_data"),
            max_versions: 3,
            version_ttl: Duration::from_secs(24 * 60 * 60), // 1 day
            max_slice_entries: 100_000,
            copy_threads: 4,
        }
    }
}

impl DictConfig {
    /// Create a new config builder
    pub fn builder() -> DictConfigBuilder {
        DictConfigBuilder::default()
    }

    /// Reject values the store cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_versions == 0 {
            return Err(DictError::Config(
                "max_versions must be at least 1".to_string(),
            ));
        }
        if self.max_slice_entries == 0 {
            return Err(DictError::Config(
                "max_slice_entries must be at least 1".to_string(),
            ));
        }
        if self.copy_threads == 0 {
            return Err(DictError::Config(
                "copy_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for DictConfig
#[derive(Default)]
pub struct DictConfigBuilder {
    config: DictConfig,
}

impl DictConfigBuilder {
    /// Set the base directory (root of all versions)
    pub fn base_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.base_dir = path.into();
        self
    }

    /// Set the maximum number of retained versions
    pub fn max_versions(mut self, count: usize) -> Self {
        self.config.max_versions = count;
        self
    }

    /// Set the maximum age of a retained version
    pub fn version_ttl(mut self, ttl: Duration) -> Self {
        self.config.version_ttl = ttl;
        self
    }

    /// Set the slice split threshold (values per slice)
    pub fn max_slice_entries(mut self, count: usize) -> Self {
        self.config.max_slice_entries = count;
        self
    }

    /// Set the number of replication worker threads
    pub fn copy_threads(mut self, count: usize) -> Self {
        self.config.copy_threads = count;
        self
    }

    pub fn build(self) -> DictConfig {
        self.config
    }
}

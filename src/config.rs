//! Configuration for CaskDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{CaskError, Result};
use crate::storage::{MAX_KEY_SIZE, MAX_VALUE_SIZE};

/// Main configuration for a CaskDB instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Path of the data file (the single append-only log).
    /// When locking is enabled a sibling `{path}.lock` file is created too.
    pub path: PathBuf,

    /// Sync strategy: how often to fsync the log
    pub sync_strategy: SyncStrategy,

    /// Take an exclusive advisory lock on the data file while open
    pub lock_file: bool,

    // -------------------------------------------------------------------------
    // Record Limits
    // -------------------------------------------------------------------------
    /// Largest key accepted by `put`/`delete` (bytes)
    pub max_key_size: u32,

    /// Largest value accepted by `put` (bytes)
    pub max_value_size: u32,
}

/// Log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./caskdb_data/cask.log"),
            sync_strategy: SyncStrategy::EveryWrite,
            lock_file: true,
            max_key_size: MAX_KEY_SIZE,
            max_value_size: MAX_VALUE_SIZE,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Default config pointing at `path`
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Reject settings the engine cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(CaskError::Config("data file path is empty".to_string()));
        }
        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(CaskError::Config(
                "EveryNEntries sync count must be at least 1".to_string(),
            ));
        }
        // max_key_size can't exceed MAX_KEY_SIZE since both are u32::MAX
        if self.max_value_size > MAX_VALUE_SIZE {
            return Err(CaskError::Config(format!(
                "max_value_size {} exceeds the format limit {}",
                self.max_value_size, MAX_VALUE_SIZE
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Enable or disable the exclusive file lock
    pub fn lock_file(mut self, enabled: bool) -> Self {
        self.config.lock_file = enabled;
        self
    }

    /// Set the maximum key size (in bytes)
    pub fn max_key_size(mut self, size: u32) -> Self {
        self.config.max_key_size = size;
        self
    }

    /// Set the maximum value size (in bytes)
    pub fn max_value_size(mut self, size: u32) -> Self {
        self.config.max_value_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

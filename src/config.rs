//! Configuration for segkv
//!
//! Centralized configuration with sensible defaults. Every store takes its
//! settings from a `Config` passed at open time; nothing is read from the
//! process environment.

use crate::error::{Result, SegError};
use crate::index::ENTRY_LEN;

/// Smallest page capacity accepted for journal and log pages.
pub const MIN_PAGE_CAPACITY: u64 = 4096;

const MB: u64 = 1024 * 1024;

/// Main configuration shared by the page log, journal and indexes
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Journal Configuration
    // -------------------------------------------------------------------------
    /// Byte capacity of one journal page before rolling to the next
    pub journal_page_capacity: u64,

    // -------------------------------------------------------------------------
    // Page Log Configuration
    // -------------------------------------------------------------------------
    /// Byte capacity of one byte-addressed log page
    pub log_page_capacity: u64,

    /// Intervals shorter than this are never worth splitting out of a page
    pub min_split_len: u64,

    // -------------------------------------------------------------------------
    // Index Configuration
    // -------------------------------------------------------------------------
    /// Number of hash-range partitions in a fixed index snapshot.
    /// Validated against the on-disk partition count at open.
    pub partition_num: usize,

    /// Entries per partition file of a growable index merger
    pub merger_page_entries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            journal_page_capacity: 64 * MB,
            log_page_capacity: 64 * MB,
            min_split_len: 0,
            partition_num: 128,
            merger_page_entries: (64 * MB) as usize / ENTRY_LEN,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject values no store can work with
    pub fn validate(&self) -> Result<()> {
        if self.journal_page_capacity < MIN_PAGE_CAPACITY {
            return Err(SegError::Config(format!(
                "journal page capacity {} is below minimum {}",
                self.journal_page_capacity, MIN_PAGE_CAPACITY
            )));
        }
        if self.log_page_capacity < MIN_PAGE_CAPACITY {
            return Err(SegError::Config(format!(
                "log page capacity {} is below minimum {}",
                self.log_page_capacity, MIN_PAGE_CAPACITY
            )));
        }
        if self.partition_num == 0 {
            return Err(SegError::Config("partition count must be positive".into()));
        }
        if self.merger_page_entries == 0 {
            return Err(SegError::Config(
                "merger page must hold at least one entry".into(),
            ));
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
    /// Set the journal page capacity (in bytes)
    pub fn journal_page_capacity(mut self, bytes: u64) -> Self {
        self.config.journal_page_capacity = bytes;
        self
    }

    /// Set the log page capacity (in bytes)
    pub fn log_page_capacity(mut self, bytes: u64) -> Self {
        self.config.log_page_capacity = bytes;
        self
    }

    /// Set the minimum interval length for page splits (in bytes)
    pub fn min_split_len(mut self, bytes: u64) -> Self {
        self.config.min_split_len = bytes;
        self
    }

    /// Set the fixed index partition count
    pub fn partition_num(mut self, count: usize) -> Self {
        self.config.partition_num = count;
        self
    }

    /// Set the number of entries per growable merger partition
    pub fn merger_page_entries(mut self, count: usize) -> Self {
        self.config.merger_page_entries = count;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//! Error types for segkv
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using SegError
pub type Result<T> = std::result::Result<T, SegError>;

/// Unified error type for segkv operations
#[derive(Debug, Error)]
pub enum SegError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Page Errors
    // -------------------------------------------------------------------------
    /// An append would exceed a page's fixed capacity.
    #[error("Page overflow: need {needed} bytes, {remaining} remaining")]
    Overflow { needed: u64, remaining: u64 },

    /// Mutation attempted on a sealed page.
    #[error("Page is read-only: {}", .0.display())]
    ReadOnly(PathBuf),

    #[error("Not found: {0}")]
    NotFound(String),

    // -------------------------------------------------------------------------
    // On-disk State Errors
    // -------------------------------------------------------------------------
    /// On-disk state violates a structural invariant; the store refuses to open.
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("Corrupt record in {} at offset {offset}: {reason}", .path.display())]
    CorruptRecord {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SegError {
    /// True for errors caused by a torn or checksum-failing record.
    pub fn is_corruption(&self) -> bool {
        matches!(self, SegError::CorruptRecord { .. })
    }
}

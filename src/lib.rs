//! # segkv
//!
//! An embedded, append-only storage engine with:
//! - A segmented page store of numbered, splittable file segments
//! - A checksum-framed write-ahead journal with checkpointed compaction
//! - A partitioned key index rebuilt by snapshot merges
//! - Single-writer mutation, lock-free reads of immutable snapshots
//!
//! ## Architecture Overview
//!
//! ```text
//!                 append(event)            merge(delta)
//!                      │                        │
//!          ┌───────────▼──────────┐   ┌─────────▼──────────┐
//!          │       Journal        │   │  FixedIndex /      │
//!          │ (Revision-numbered)  │   │  IndexMerger       │
//!          └───────────┬──────────┘   └─────────┬──────────┘
//!                      │                        │
//!          ┌───────────▼────────────────────────▼──────────┐
//!          │          PageStore<P: PagePolicy>              │
//!          │   (sorted pages, binary search, split, roll)   │
//!          └───────────────────────┬───────────────────────┘
//!                                  │
//!                      ┌───────────▼───────────┐
//!                      │  Page (file + mmap)   │
//!                      └───────────────────────┘
//! ```
//!
//! The caller owns the journal → index handoff: fold a checkpoint into the
//! index only after it is durable in the journal, and erase journal pages only
//! after the merge that absorbed them is durable.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod page;
pub mod journal;
pub mod index;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use error::{Result, SegError};
pub use index::{Change, Entry, FixedIndex, IndexMerger, Key, Offset, Range};
pub use journal::{Applicable, Journal, Revision};
pub use page::{Cursor, Page, PageLog, PageStore};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of segkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

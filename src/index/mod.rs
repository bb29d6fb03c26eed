//! Index Module
//!
//! Point lookups from `Key` to a value location (`Offset` or `Range`),
//! rebuilt by sorted merges instead of being mutated in place.
//!
//! ## Strategies
//! - `FixedIndex`: a constant number of equal-width key-range partitions,
//!   rewritten as a new snapshot generation on every merge
//! - `IndexMerger`: a flat sorted run split into partitions on demand, each
//!   named by the first key it holds
//!
//! Both are `PageStore` configurations whose pages hold fixed-length
//! entries, and both merge with the same join.

mod entry;
mod fixed;
mod key;
mod merge;
mod merger;
mod snapshot;

pub(crate) use entry::set_in_place;
pub use entry::{Change, Entry, EntryValue, Offset, Partition, Range, ENTRY_LEN};
pub use fixed::FixedIndex;
pub use key::Key;
pub use merger::{GrowablePolicy, IndexMerger};
pub use snapshot::{PartitionPolicy, Snapshot};

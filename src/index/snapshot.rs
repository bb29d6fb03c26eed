//! Fixed-index snapshots
//!
//! One immutable generation of a `FixedIndex`: exactly `partition_num`
//! partitions, each covering an equal-width slice of the key space.
//!
//! ```text
//!  Key::MIN                                                         Key::MAX
//!     |----------|----------|----------|-- ... --|----------|
//!     |   p[0]   |   p[1]   |   p[2]   |         |  p[n-1]  |
//!                ^
//!          lower key of p[1] = Key::MIN + interval
//! ```

use std::fs;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::error::{Result, SegError};
use crate::page::{Overflow, Page, PagePolicy, PageStore};

use super::{Entry, EntryValue, Key, Partition};

/// Policy for key-numbered, fixed-range partitions
pub struct PartitionPolicy<V> {
    interval: u128,
    _value: PhantomData<fn() -> V>,
}

impl<V> PartitionPolicy<V> {
    pub fn new(partition_num: usize) -> Self {
        Self {
            interval: u128::MAX / partition_num.max(1) as u128,
            _value: PhantomData,
        }
    }
}

impl<V: EntryValue> PagePolicy for PartitionPolicy<V> {
    type Number = Key;
    type Item = Entry<V>;

    /// Partitions are bounded by their key range, not by bytes
    fn capacity(&self) -> u64 {
        u64::MAX
    }

    fn overflow(&self) -> Overflow {
        Overflow::Fail
    }

    fn new_number(&self, last: Option<&Page<Key>>) -> Option<Key> {
        match last {
            None => Some(Key::MIN),
            Some(page) => page.number().checked_add(self.interval),
        }
    }

    fn parse_number(&self, text: &str) -> Option<Key> {
        text.parse().ok()
    }

    fn encode(&self, entry: &Entry<V>) -> Result<Vec<u8>> {
        Ok(entry.encode())
    }

    fn read(&self, page: &Page<Key>, offset: u64) -> Result<(Entry<V>, u64)> {
        Entry::read(page, offset)
    }
}

/// One generation of a fixed index.
///
/// Dropping a retired snapshot unmaps its partitions and deletes its
/// directory.
pub struct Snapshot<V: EntryValue> {
    generation: u64,
    store: PageStore<PartitionPolicy<V>>,
    retired: AtomicBool,
}

impl<V: EntryValue> Snapshot<V> {
    /// Open a published generation read-only
    ///
    /// Only an empty generation 0 is expanded to `partition_num`; any other
    /// count mismatch is an `InvalidLayout`.
    pub fn open(dir: &Path, generation: u64, partition_num: usize) -> Result<Self> {
        let mut snapshot = Self::load(dir, generation, partition_num, generation == 0)?;
        snapshot.store.seal_all()?;
        Ok(snapshot)
    }

    /// Open a published generation for inspection. Never expands.
    pub(crate) fn inspect(dir: &Path, generation: u64, partition_num: usize) -> Result<Self> {
        let mut snapshot = Self::load(dir, generation, partition_num, false)?;
        snapshot.store.seal_all()?;
        Ok(snapshot)
    }

    /// Create an empty, writable generation in `dir`
    pub(crate) fn create(dir: &Path, generation: u64, partition_num: usize) -> Result<Self> {
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Self::load(dir, generation, partition_num, true)
    }

    fn load(dir: &Path, generation: u64, partition_num: usize, expand: bool) -> Result<Self> {
        let mut store = PageStore::open(dir, PartitionPolicy::new(partition_num))?;

        let fresh = store.len() == 1 && store.pages()[0].is_empty();
        if expand && fresh && partition_num > 1 {
            for _ in 1..partition_num {
                store.new_page()?;
            }
            debug!(dir = %dir.display(), partition_num, "expanded snapshot partitions");
        }
        if store.len() != partition_num {
            return Err(SegError::InvalidLayout(format!(
                "snapshot {} has {} partitions, expected {}",
                dir.display(),
                store.len(),
                partition_num
            )));
        }

        Ok(Self {
            generation,
            store,
            retired: AtomicBool::new(false),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn dir(&self) -> &Path {
        self.store.dir()
    }

    pub fn partition_count(&self) -> usize {
        self.store.len()
    }

    /// Index of the partition whose key range contains `key`
    pub fn partition_of(&self, key: &Key) -> usize {
        self.store.binary_search_page_index(key).unwrap_or(0)
    }

    /// Inclusive lower key of partition `index`
    pub fn lower_bound(&self, index: usize) -> Option<Key> {
        self.store.page(index).map(|page| page.number())
    }

    /// Exclusive upper key of partition `index`; `None` for the last
    pub fn upper_bound(&self, index: usize) -> Option<Key> {
        self.lower_bound(index + 1)
    }

    /// Sorted entries of partition `index`
    pub fn partition(&self, index: usize) -> Result<Partition<'_, V>> {
        self.store
            .page(index)
            .and_then(|page| page.mapped())
            .map(Partition::new)
            .ok_or_else(|| {
                SegError::NotFound(format!(
                    "partition {} of {} is not mapped",
                    index,
                    self.dir().display()
                ))
            })
    }

    pub fn get(&self, key: &Key) -> Result<V> {
        self.partition(self.partition_of(key))?
            .get(key)
            .ok_or_else(|| SegError::NotFound(format!("key {}", key)))
    }

    /// Total number of entries
    pub fn len(&self) -> usize {
        self.store
            .pages()
            .iter()
            .map(|page| page.len() as usize / Entry::<V>::LEN)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.store.pages().iter().all(|page| page.is_empty())
    }

    // =========================================================================
    // Building
    // =========================================================================

    pub(crate) fn append(&mut self, index: usize, entry: &Entry<V>) -> Result<()> {
        self.store.append_at(index, entry, false)?;
        Ok(())
    }

    pub(crate) fn force(&mut self, index: usize) -> Result<()> {
        self.store.force(index)
    }

    /// Release every partition's mapping
    pub fn close(&mut self) {
        self.store.close();
    }

    /// Mark for deletion once the last holder drops it
    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }
}

impl<V: EntryValue> Drop for Snapshot<V> {
    fn drop(&mut self) {
        if !self.retired.load(Ordering::Acquire) {
            return;
        }
        self.store.close();
        let dir = self.store.dir().to_path_buf();
        match fs::remove_dir_all(&dir) {
            Ok(()) => debug!(generation = self.generation, "removed retired snapshot"),
            Err(e) => warn!(dir = %dir.display(), error = %e, "failed to remove retired snapshot"),
        }
    }
}

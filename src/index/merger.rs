//! Growable index merger
//!
//! Writes the output of one merge as a flat, sorted run of entries split
//! across preallocated, memory-mapped partition files. A new partition is
//! allocated whenever the current one fills; its file is named by the first
//! key written into it.
//!
//! ```text
//! {dir}/
//!   ├── 00a3...e1.index     entries [0, page_entries)
//!   ├── 7f10...02.index     entries [page_entries, 2 * page_entries)
//!   └── c4d2...9b.index     remainder, sized to what is left of `capacity`
//! ```

use std::fs;
use std::marker::PhantomData;
use std::path::Path;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, SegError};
use crate::page::{Overflow, Page, PagePolicy, PageStore};

use super::merge::{bounded, check_sorted, merge_join};
use super::{set_in_place, Change, Entry, EntryValue, Key, Partition};

const SUFFIX: &str = ".index";

/// Policy for partitions named by their first key
pub struct GrowablePolicy<V> {
    page_entries: usize,
    _value: PhantomData<fn() -> V>,
}

impl<V: EntryValue> PagePolicy for GrowablePolicy<V> {
    type Number = Key;
    type Item = Entry<V>;

    fn capacity(&self) -> u64 {
        (self.page_entries * Entry::<V>::LEN) as u64
    }

    fn overflow(&self) -> Overflow {
        Overflow::Fail
    }

    /// Numbers come from the entries, so the store never allocates
    fn new_number(&self, _last: Option<&Page<Key>>) -> Option<Key> {
        None
    }

    fn parse_number(&self, text: &str) -> Option<Key> {
        text.strip_suffix(SUFFIX)?.parse().ok()
    }

    fn file_name(&self, number: &Key) -> String {
        format!("{}{}", number, SUFFIX)
    }

    fn encode(&self, entry: &Entry<V>) -> Result<Vec<u8>> {
        Ok(entry.encode())
    }

    fn read(&self, page: &Page<Key>, offset: u64) -> Result<(Entry<V>, u64)> {
        Entry::read(page, offset)
    }
}

/// Sorted index of at most `capacity` entries, built by one merge
pub struct IndexMerger<V: EntryValue> {
    store: PageStore<GrowablePolicy<V>>,
    /// Total entries this merger may hold
    capacity: usize,
    /// Entries appended so far
    position: usize,
    last_key: Option<Key>,
}

impl<V: EntryValue> IndexMerger<V> {
    /// Start an empty merger in `dir`, which must not already hold partitions
    pub fn create(dir: &Path, capacity: usize, config: &Config) -> Result<Self> {
        let store = Self::open_store(dir, config)?;
        if !store.is_empty() {
            return Err(SegError::InvalidLayout(format!(
                "{} already holds {} index partitions",
                dir.display(),
                store.len()
            )));
        }

        debug!(dir = %dir.display(), capacity, "created index merger");
        Ok(Self {
            store,
            capacity,
            position: 0,
            last_key: None,
        })
    }

    /// Reopen a finished merger read-only
    pub fn open(dir: &Path, config: &Config) -> Result<Self> {
        if !dir.is_dir() {
            return Err(SegError::NotFound(format!("index {}", dir.display())));
        }
        let mut store = Self::open_store(dir, config)?;
        store.seal_all()?;

        let position = store
            .pages()
            .iter()
            .map(|page| page.len() as usize / Entry::<V>::LEN)
            .sum();
        let mut merger = Self {
            store,
            capacity: position,
            position,
            last_key: None,
        };
        let mut last_key: Option<Key> = None;
        for entry in merger.iter() {
            if last_key.is_some_and(|last| last >= *entry.key()) {
                return Err(SegError::InvalidLayout(format!(
                    "index {} has key {} out of order; was it forced?",
                    dir.display(),
                    entry.key()
                )));
            }
            last_key = Some(*entry.key());
        }
        merger.last_key = last_key;

        info!(dir = %dir.display(), entries = position, "opened index merger");
        Ok(merger)
    }

    fn open_store(dir: &Path, config: &Config) -> Result<PageStore<GrowablePolicy<V>>> {
        config.validate()?;
        fs::create_dir_all(dir)?;
        let policy = GrowablePolicy {
            page_entries: config.merger_page_entries,
            _value: PhantomData,
        };
        PageStore::open(dir, policy)
    }

    // =========================================================================
    // Building
    // =========================================================================

    /// Join `base` and `delta`, both sorted by key, appending the result.
    ///
    /// On equal keys the delta wins; `Change::Remove` drops the key. Call
    /// `force` afterwards to make the output durable.
    pub fn merge<B, D>(&mut self, base: B, delta: D) -> Result<()>
    where
        B: IntoIterator<Item = Entry<V>>,
        D: IntoIterator<Item = Change<V>>,
    {
        let delta: Vec<Change<V>> = delta.into_iter().collect();
        check_sorted(&delta)?;

        let mut delta = delta.into_iter().peekable();
        merge_join(bounded(base, None), &mut delta, |entry| self.append(entry))?;

        debug!(entries = self.position, pages = self.store.len(), "merged index");
        Ok(())
    }

    /// Append one entry, allocating a partition when the current one is full.
    ///
    /// Keys must arrive in strictly ascending order.
    pub fn append(&mut self, entry: Entry<V>) -> Result<()> {
        if self.position >= self.capacity {
            return Err(SegError::Overflow {
                needed: Entry::<V>::LEN as u64,
                remaining: 0,
            });
        }
        if self.last_key.is_some_and(|last| last >= *entry.key()) {
            return Err(SegError::InvalidLayout(format!(
                "index key {} appended out of order",
                entry.key()
            )));
        }

        let full = self
            .store
            .last()
            .map_or(true, |page| page.remaining() < Entry::<V>::LEN as u64);
        if full {
            self.new_partition(*entry.key())?;
        }

        let tail = self.store.len() - 1;
        self.store.append_at(tail, &entry, false)?;
        self.position += 1;
        self.last_key = Some(*entry.key());
        Ok(())
    }

    fn new_partition(&mut self, first: Key) -> Result<()> {
        let entries = self
            .store
            .policy()
            .page_entries
            .min(self.capacity - self.position);
        let path = self.store.path_of(&first);
        let page = Page::preallocate(&path, first, (entries * Entry::<V>::LEN) as u64)?;
        self.store.insert_sorted(page)?;
        debug!(%first, entries, "allocated index partition");
        Ok(())
    }

    /// Overwrite the value of an existing key in place
    pub fn set(&mut self, key: &Key, value: V) -> Result<()> {
        let index = self
            .store
            .binary_search_page_index(key)
            .ok_or_else(|| SegError::NotFound(format!("key {}", key)))?;
        let page = self
            .store
            .page_mut(index)
            .ok_or_else(|| SegError::NotFound(format!("key {}", key)))?;
        if set_in_place(page.mapped_mut()?, key, value) {
            Ok(())
        } else {
            Err(SegError::NotFound(format!("key {}", key)))
        }
    }

    /// Flush every partition and seal it, trimming unused preallocated space.
    /// The merger is read-only afterwards.
    pub fn force(&mut self) -> Result<()> {
        self.store.seal_all()?;
        self.capacity = self.position;
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get(&self, key: &Key) -> Result<V> {
        self.store
            .binary_search_page_index(key)
            .and_then(|index| self.store.page(index))
            .and_then(|page| page.mapped())
            .and_then(|bytes| Partition::<V>::new(bytes).get(key))
            .ok_or_else(|| SegError::NotFound(format!("key {}", key)))
    }

    /// Every entry in key order
    pub fn iter(&self) -> impl Iterator<Item = Entry<V>> + '_ {
        self.store
            .pages()
            .iter()
            .filter_map(|page| page.mapped())
            .flat_map(|bytes| Partition::<V>::new(bytes).iter())
    }

    /// Number of entries written
    pub fn len(&self) -> usize {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn page_count(&self) -> usize {
        self.store.len()
    }

    /// Release every partition's mapping
    pub fn close(mut self) {
        self.store.close();
    }
}

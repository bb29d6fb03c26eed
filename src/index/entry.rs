//! Index entries
//!
//! Fixed-length `(Key, value)` records and the value types they carry.
//!
//! ## Entry Format
//! ```text
//! ┌──────────────┬──────────────────────────────┐
//! │ Key (16, BE) │ Offset (8, BE) | Range (16)  │
//! └──────────────┴──────────────────────────────┘
//! ```

use std::cmp::Ordering;
use std::fmt::Debug;
use std::marker::PhantomData;

use bytes::{Buf, BufMut};

use crate::error::{Result, SegError};
use crate::page::Page;

use super::Key;

/// Length of the widest entry, `(Key, Range)`
pub const ENTRY_LEN: usize = Key::LEN + Range::LEN;

/// Fixed-length value stored beside a key
pub trait EntryValue: Copy + Debug + PartialEq + Send + Sync + 'static {
    const LEN: usize;

    fn put(&self, buf: &mut impl BufMut);

    fn get(buf: &mut impl Buf) -> Self;
}

// =============================================================================
// Offset / Range
// =============================================================================

/// Single position in an external value log
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Offset(u64);

impl Offset {
    /// Location not yet appended
    pub const NIL: Offset = Offset(u64::MAX);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    pub fn is_nil(self) -> bool {
        self == Self::NIL
    }
}

impl EntryValue for Offset {
    const LEN: usize = 8;

    fn put(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.0);
    }

    fn get(buf: &mut impl Buf) -> Self {
        Self(buf.get_u64())
    }
}

/// Byte span `[from, to)` in an external value log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    from: u64,
    to: u64,
}

impl Range {
    pub const LEN: usize = 16;

    /// Span not yet appended
    pub const NIL: Range = Range {
        from: u64::MAX,
        to: u64::MAX,
    };

    pub const fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    pub const fn from(self) -> u64 {
        self.from
    }

    pub const fn to(self) -> u64 {
        self.to
    }

    pub fn len(self) -> u64 {
        self.to.saturating_sub(self.from)
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    pub fn is_nil(self) -> bool {
        self == Self::NIL
    }
}

impl EntryValue for Range {
    const LEN: usize = Range::LEN;

    fn put(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.from);
        buf.put_u64(self.to);
    }

    fn get(buf: &mut impl Buf) -> Self {
        let from = buf.get_u64();
        let to = buf.get_u64();
        Self { from, to }
    }
}

// =============================================================================
// Entry / Change
// =============================================================================

/// One sorted index record; ordering is by key alone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry<V> {
    key: Key,
    value: V,
}

impl<V: EntryValue> Entry<V> {
    pub const LEN: usize = Key::LEN + V::LEN;

    pub fn new(key: Key, value: V) -> Self {
        Self { key, value }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn value(&self) -> V {
        self.value
    }

    pub fn cmp_key(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LEN);
        buf.put_slice(self.key.bytes());
        self.value.put(&mut buf);
        buf
    }

    /// Decode from exactly `Self::LEN` bytes
    pub fn decode(mut bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(SegError::Serialization(format!(
                "entry must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            )));
        }
        let key = Key::from_slice(&bytes[..Key::LEN])?;
        bytes.advance(Key::LEN);
        Ok(Self {
            key,
            value: V::get(&mut bytes),
        })
    }

    /// Read the entry at `offset` of an index page
    pub fn read(page: &Page<Key>, offset: u64) -> Result<(Self, u64)> {
        let entry = match page.mapped() {
            Some(bytes) => {
                let start = offset as usize;
                let bytes = bytes.get(start..start + Self::LEN).ok_or_else(|| {
                    SegError::NotFound(format!("no entry at offset {} of page {}", offset, page.number()))
                })?;
                Self::decode(bytes)?
            }
            None => Self::decode(&page.read_at(offset, Self::LEN)?)?,
        };
        Ok((entry, Self::LEN as u64))
    }
}

/// One element of a merge delta
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Change<V> {
    /// Insert or replace the key's value
    Put(Key, V),
    /// Drop the key from the merged output
    Remove(Key),
}

impl<V> Change<V> {
    pub fn key(&self) -> &Key {
        match self {
            Change::Put(key, _) | Change::Remove(key) => key,
        }
    }
}

impl<V> From<Entry<V>> for Change<V> {
    fn from(entry: Entry<V>) -> Self {
        Change::Put(entry.key, entry.value)
    }
}

// =============================================================================
// Partition
// =============================================================================

/// Sorted run of fixed-length entries viewed over mapped bytes
pub struct Partition<'a, V> {
    bytes: &'a [u8],
    _value: PhantomData<V>,
}

impl<'a, V: EntryValue> Partition<'a, V> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            _value: PhantomData,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.bytes.len() / Entry::<V>::LEN
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key_at(&self, index: usize) -> &'a [u8] {
        let start = index * Entry::<V>::LEN;
        &self.bytes[start..start + Key::LEN]
    }

    fn entry_at(&self, index: usize) -> Option<Entry<V>> {
        let start = index * Entry::<V>::LEN;
        let bytes = self.bytes.get(start..start + Entry::<V>::LEN)?;
        Entry::decode(bytes).ok()
    }

    /// Binary search over the raw bytes. `Ok(i)` is the entry index of `key`,
    /// `Err(i)` where it would be inserted.
    pub fn search(&self, key: &Key) -> std::result::Result<usize, usize> {
        let (mut low, mut high) = (0, self.len());
        while low < high {
            let mid = low + (high - low) / 2;
            match self.key_at(mid).cmp(key.bytes().as_slice()) {
                Ordering::Less => low = mid + 1,
                Ordering::Greater => high = mid,
                Ordering::Equal => return Ok(mid),
            }
        }
        Err(low)
    }

    pub fn get(&self, key: &Key) -> Option<V> {
        let index = self.search(key).ok()?;
        self.entry_at(index).map(|entry| entry.value())
    }

    pub fn iter(&self) -> impl Iterator<Item = Entry<V>> + 'a {
        let view = Partition::<'a, V>::new(self.bytes);
        (0..self.len()).filter_map(move |index| view.entry_at(index))
    }
}

/// Overwrite the value of `key` in place; `false` if the key is absent
pub fn set_in_place<V: EntryValue>(bytes: &mut [u8], key: &Key, value: V) -> bool {
    let index = match Partition::<V>::new(bytes).search(key) {
        Ok(index) => index,
        Err(_) => return false,
    };
    let start = index * Entry::<V>::LEN + Key::LEN;
    let mut slot = &mut bytes[start..start + V::LEN];
    value.put(&mut slot);
    true
}

//! Sorted merge-join
//!
//! Both index strategies rebuild their entries by joining a sorted base with
//! a sorted delta. The base is a sequence of `Slot`s: real entries, closed
//! by a boundary marker that bounds how far the delta may advance before the
//! join returns. Leftover delta changes stay in the peekable iterator for the
//! next call.
//!
//! ```text
//!   base:  e0  e1  e2  ... |B(k)|        delta: d0 d1 d2 d3 ...
//!                                                    ^
//!          every delta key < k is emitted before the join returns
//! ```

use std::cmp::Ordering;
use std::iter::Peekable;

use crate::error::{Result, SegError};

use super::{Change, Entry, EntryValue, Key};

/// One element of a merge base
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Slot<V> {
    Entry(Entry<V>),
    /// Lower key of the next partition, or `None` past the last one.
    /// Never written to the output.
    Boundary(Option<Key>),
}

impl<V: EntryValue> Slot<V> {
    /// Where this slot sorts relative to a delta key
    fn cmp_key(&self, key: &Key) -> Ordering {
        match self {
            Slot::Entry(entry) => entry.key().cmp(key),
            Slot::Boundary(Some(boundary)) if boundary <= key => Ordering::Less,
            Slot::Boundary(_) => Ordering::Greater,
        }
    }
}

/// Join `base` with the prefix of `delta` that sorts before its boundary,
/// handing every surviving entry to `emit` in key order.
///
/// On equal keys the delta wins; `Change::Remove` drops the key.
pub(crate) fn merge_join<V, B, D, F>(base: B, delta: &mut Peekable<D>, mut emit: F) -> Result<()>
where
    V: EntryValue,
    B: IntoIterator<Item = Slot<V>>,
    D: Iterator<Item = Change<V>>,
    F: FnMut(Entry<V>) -> Result<()>,
{
    for slot in base {
        let mut superseded = false;
        while let Some(change) = delta.peek() {
            match slot.cmp_key(change.key()) {
                Ordering::Less => break,
                Ordering::Equal => superseded = true,
                Ordering::Greater => {}
            }
            if let Some(Change::Put(key, value)) = delta.next() {
                emit(Entry::new(key, value))?;
            }
            if superseded {
                break;
            }
        }

        if let Slot::Entry(entry) = slot {
            if !superseded {
                emit(entry)?;
            }
        }
    }
    Ok(())
}

/// Reject a delta whose keys are not strictly ascending
pub(crate) fn check_sorted<V>(changes: &[Change<V>]) -> Result<()> {
    match changes
        .windows(2)
        .find(|pair| pair[0].key() >= pair[1].key())
    {
        Some(pair) => Err(SegError::InvalidLayout(format!(
            "delta keys out of order: {} then {}",
            pair[0].key(),
            pair[1].key()
        ))),
        None => Ok(()),
    }
}

/// Base entries closed by a boundary
pub(crate) fn bounded<V, I>(entries: I, boundary: Option<Key>) -> impl Iterator<Item = Slot<V>>
where
    I: IntoIterator<Item = Entry<V>>,
{
    entries
        .into_iter()
        .map(Slot::Entry)
        .chain(std::iter::once(Slot::Boundary(boundary)))
}

//! Journal Module
//!
//! Durable, strictly ordered intent log with checkpointed compaction and
//! replay.
//!
//! ## Responsibilities
//! - Append checksum-framed events, each tagged with the next `Revision`
//! - Erase events older than a checkpoint once the caller has folded them
//!   into durable state
//! - Replay events newer than a sink's checkpoint after a restart
//!
//! ## File Format
//! ```text
//! {dir}/
//!   ├── 0       events with revisions 0 .. 1233
//!   └── 1234    events with revisions 1234 ..
//!
//! page = [Len (4) | CRC (4) | Payload] [Len | CRC | Payload] ...
//! ```
//!
//! A page's file name is the revision of its first event; the revision of
//! any other event is its page's number plus its index within the page.

mod recovery;
mod revision;

use std::path::Path;

use tracing::{debug, info, warn};

use crate::codec::{Codec, Framed};
use crate::config::Config;
use crate::error::Result;
use crate::page::{Overflow, Page, PagePolicy, PageStore};

pub use recovery::{Applicable, RecoveryResult};
pub use revision::Revision;

/// Policy for revision-numbered journal pages
pub struct JournalPolicy<C> {
    codec: Framed<C>,
    capacity: u64,
    min_split_len: u64,
    /// Revision the next appended event will carry
    revision: Revision,
}

impl<C: Codec> PagePolicy for JournalPolicy<C> {
    type Number = Revision;
    type Item = C::Item;

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn overflow(&self) -> Overflow {
        Overflow::Roll
    }

    fn new_number(&self, _last: Option<&Page<Revision>>) -> Option<Revision> {
        Some(self.revision)
    }

    fn parse_number(&self, text: &str) -> Option<Revision> {
        text.parse().ok()
    }

    fn encode(&self, item: &C::Item) -> Result<Vec<u8>> {
        self.codec.encode(item)
    }

    fn read(&self, page: &Page<Revision>, offset: u64) -> Result<(C::Item, u64)> {
        self.codec.read(page, offset)
    }

    fn min_split_len(&self) -> u64 {
        self.min_split_len
    }
}

/// Write-ahead journal of `C::Item` events.
///
/// Single writer: `append`, `erase_by` and `recover` take `&mut self`.
pub struct Journal<C: Codec> {
    store: PageStore<JournalPolicy<C>>,
}

impl<C: Codec> Journal<C> {
    /// Open or create a journal in `dir`.
    ///
    /// A torn record at the end of the tail page is truncated away, and the
    /// revision counter resumes after the last complete event.
    pub fn open(dir: &Path, codec: C, config: &Config) -> Result<Self> {
        config.validate()?;
        let policy = JournalPolicy {
            codec: Framed::new(codec),
            capacity: config.journal_page_capacity,
            min_split_len: config.min_split_len,
            revision: Revision::ZERO,
        };

        let mut store = PageStore::open(dir, policy)?;
        let revision = restore_tail(&mut store)?;
        store.policy_mut().revision = revision;

        info!(dir = %dir.display(), pages = store.len(), %revision, "opened journal");
        Ok(Self { store })
    }

    /// Append an event.
    ///
    /// Returns the event's revision, which doubles as the checkpoint token
    /// meaning "every event up to and including this one is written".
    pub fn append(&mut self, event: &C::Item, force: bool) -> Result<Revision> {
        let revision = self.revision();
        self.store.append(event, force)?;
        self.store.policy_mut().revision = revision.increment();
        Ok(revision)
    }

    /// Revision the next appended event will carry
    pub fn revision(&self) -> Revision {
        self.store.policy().revision
    }

    /// Erase every event with a revision below `revision`.
    ///
    /// Whole pages before the covering page are deleted; the covering page
    /// is split so it starts at `revision`.
    pub fn erase_by(&mut self, revision: Revision) -> Result<()> {
        let revision = revision.min(self.revision());
        let removed = self.store.remove_pages_from_head_to(&revision)?;

        let Some(head) = self.store.page(0) else {
            return Ok(());
        };
        if revision <= head.number() {
            debug!(%revision, removed, "erased journal pages");
            return Ok(());
        }

        let skip = head.number().distance_to(revision);
        let end = self.offset_after(0, skip)?;
        let split = self.store.split(0, 0, end, revision)?;
        debug!(%revision, removed, ?split, "erased journal");
        Ok(())
    }

    /// Replay every event newer than the sink's checkpoint, then force the
    /// sink and reset the journal to one empty page at the next revision.
    ///
    /// Replay stops at the first corrupt record. The next revision is never
    /// at or below the sink's checkpoint, even when the journal lost pages.
    pub fn recover<A>(&mut self, sink: &mut A) -> Result<RecoveryResult>
    where
        A: Applicable<C::Item>,
    {
        let checkpoint = sink.last_checkpoint();
        let start = checkpoint
            .and_then(|revision| self.store.binary_search_page_index(&revision))
            .unwrap_or(0);

        let mut result = RecoveryResult::default();
        for item in self.iter_from(start) {
            match item {
                Ok((revision, event)) => {
                    result.last_revision = Some(revision);
                    if checkpoint.map_or(true, |c| revision > c) {
                        sink.apply(event)?;
                        result.entries_recovered += 1;
                    } else {
                        result.entries_skipped += 1;
                    }
                }
                Err(e) if e.is_corruption() => {
                    warn!(error = %e, "stopping replay at corrupt record");
                    result.stopped_at_corruption = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        sink.force()?;

        let next = result
            .last_revision
            .map_or(self.revision(), Revision::increment)
            .max(self.revision())
            .max(checkpoint.map_or(Revision::ZERO, Revision::increment));
        self.store.policy_mut().revision = next;
        self.store.reset()?;

        info!(
            recovered = result.entries_recovered,
            skipped = result.entries_skipped,
            next = %next,
            "journal recovery complete"
        );
        Ok(result)
    }

    /// Iterate every event on disk with its revision
    pub fn iter(&self) -> impl Iterator<Item = Result<(Revision, C::Item)>> + '_ {
        self.iter_from(0)
    }

    pub fn pages(&self) -> &[Page<Revision>] {
        self.store.pages()
    }

    /// Release all page resources. Unforced appends are not flushed.
    pub fn close(mut self) {
        self.store.close();
    }

    fn iter_from(&self, index: usize) -> impl Iterator<Item = Result<(Revision, C::Item)>> + '_ {
        let mut current: Option<(Revision, Revision)> = None;
        self.store.iter_from(index).map(move |item| -> Result<(Revision, C::Item)> {
            let (cursor, event) = item?;
            let revision = match current {
                Some((page, next)) if page == cursor.number => next,
                _ => cursor.number,
            };
            current = Some((cursor.number, revision.increment()));
            Ok((revision, event))
        })
    }

    /// In-page offset just past the first `records` events of page `index`
    fn offset_after(&self, index: usize, records: u64) -> Result<u64> {
        let page = &self.store.pages()[index];
        let codec = &self.store.policy().codec;
        let mut offset = 0;
        for _ in 0..records {
            if offset >= page.len() {
                break;
            }
            offset += codec.check(page, offset)?;
        }
        Ok(offset)
    }
}

/// Validate the tail page frame by frame, cut off a torn tail and return the
/// revision that follows its last complete event
fn restore_tail<C: Codec>(store: &mut PageStore<JournalPolicy<C>>) -> Result<Revision> {
    let Some(tail) = store.len().checked_sub(1) else {
        return Ok(Revision::ZERO);
    };

    let (number, valid_len, records, torn) = {
        let page = &store.pages()[tail];
        let codec = &store.policy().codec;
        let mut offset = 0;
        let mut records = 0;
        let mut torn = false;
        while offset < page.len() {
            match codec.check(page, offset) {
                Ok(len) => {
                    offset += len;
                    records += 1;
                }
                Err(e) if e.is_corruption() => {
                    warn!(error = %e, "truncating torn journal tail");
                    torn = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        (page.number(), offset, records, torn)
    };

    if torn {
        if let Some(page) = store.page_mut(tail) {
            page.truncate(valid_len)?;
        }
    }
    Ok(Revision::new(number.value() + records))
}

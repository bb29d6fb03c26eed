//! Page Log
//!
//! Byte-addressed page store: every record is identified by its absolute
//! position in the log's virtual address space, and every page file is named
//! by the position of its first byte.
//!
//! ```text
//!   0                    4096                 8192
//!   |------ page "0" -----|---- page "4096" ---|---- page "8192" ...
//!                ^ position 1200 = page "0", offset 1200
//! ```

use std::path::Path;

use tracing::debug;

use crate::codec::{Codec, Framed, FRAME_HEADER_LEN};
use crate::config::Config;
use crate::error::{Result, SegError};

use super::{Cursor, Overflow, Page, PagePolicy, PageStore, Split};

/// Policy for a byte-addressed log of framed records
pub struct LogPolicy<C> {
    codec: Framed<C>,
    capacity: u64,
    min_split_len: u64,
}

impl<C: Codec> PagePolicy for LogPolicy<C> {
    type Number = u64;
    type Item = C::Item;

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn overflow(&self) -> Overflow {
        Overflow::Roll
    }

    fn new_number(&self, last: Option<&Page<u64>>) -> Option<u64> {
        Some(last.map_or(0, |page| page.number() + page.len()))
    }

    fn parse_number(&self, text: &str) -> Option<u64> {
        text.parse().ok()
    }

    fn encode(&self, item: &C::Item) -> Result<Vec<u8>> {
        self.codec.encode(item)
    }

    fn read(&self, page: &Page<u64>, offset: u64) -> Result<(C::Item, u64)> {
        self.codec.read(page, offset)
    }

    fn min_split_len(&self) -> u64 {
        self.min_split_len.max(FRAME_HEADER_LEN as u64)
    }
}

/// Append-only log addressed by absolute byte position
pub struct PageLog<C: Codec> {
    store: PageStore<LogPolicy<C>>,
}

impl<C: Codec> PageLog<C> {
    pub fn open(dir: &Path, codec: C, config: &Config) -> Result<Self> {
        config.validate()?;
        let policy = LogPolicy {
            codec: Framed::new(codec),
            capacity: config.log_page_capacity,
            min_split_len: config.min_split_len,
        };
        Ok(Self {
            store: PageStore::open(dir, policy)?,
        })
    }

    /// Append `item`, returning its absolute position
    pub fn append(&mut self, item: &C::Item, force: bool) -> Result<u64> {
        let cursor = self.store.append(item, force)?;
        Ok(cursor.number + cursor.offset)
    }

    pub fn get(&self, position: u64) -> Result<C::Item> {
        self.store.get(&self.cursor(position)?)
    }

    /// Position of the record after the one at `position`
    pub fn next(&self, position: u64) -> Result<Option<u64>> {
        let next = self.store.next(&self.cursor(position)?)?;
        Ok(next.map(|cursor| cursor.number + cursor.offset))
    }

    /// Position of the first record, if any
    pub fn head(&self) -> Option<u64> {
        self.store.head().map(|cursor| cursor.number + cursor.offset)
    }

    /// Position the next append will be written at (unless it rolls)
    pub fn end(&self) -> u64 {
        self.store
            .last()
            .map_or(0, |page| page.number() + page.len())
    }

    /// Drop everything before `position`.
    ///
    /// Pages wholly below `position` are deleted; the page containing it is
    /// split so that it starts exactly at `position`.
    pub fn truncate(&mut self, position: u64) -> Result<Split> {
        let removed = self.store.remove_pages_from_head_to(&position)?;
        let Some(head) = self.store.page(0) else {
            return Ok(Split::Unchanged);
        };
        if position <= head.number() {
            return Ok(if removed > 0 { Split::Removed } else { Split::Unchanged });
        }

        let offset = position - head.number();
        if offset > head.len() {
            return Err(SegError::NotFound(format!(
                "position {} is past the end of the log",
                position
            )));
        }
        debug!(position, removed, "truncating log");
        self.store.split(0, 0, offset, position)
    }

    /// Garbage-collect bytes `[begin, end)`, which must start inside a page;
    /// the interval is clamped to that page's end
    pub fn collect(&mut self, begin: u64, end: u64) -> Result<Split> {
        let cursor = self.cursor(begin)?;
        let index = self
            .store
            .index_of(&cursor.number)
            .ok_or_else(|| SegError::NotFound(format!("no page numbered {}", cursor.number)))?;
        let page_len = self.store.pages()[index].len();
        let end_offset = end.saturating_sub(cursor.number).min(page_len);
        self.store
            .split(index, cursor.offset, end_offset, cursor.number + end_offset)
    }

    pub fn pages(&self) -> &[Page<u64>] {
        self.store.pages()
    }

    /// Flush the tail page to durable storage
    pub fn force(&mut self) -> Result<()> {
        let tail = self.store.len().saturating_sub(1);
        self.store.force(tail)
    }

    pub fn close(mut self) {
        self.store.close();
    }

    fn cursor(&self, position: u64) -> Result<Cursor<u64>> {
        let index = self
            .store
            .binary_search_page_index(&position)
            .ok_or_else(|| SegError::NotFound(format!("position {} precedes the log", position)))?;
        let page = &self.store.pages()[index];
        let offset = position - page.number();
        if offset >= page.len() {
            return Err(SegError::NotFound(format!(
                "position {} is past the write pointer",
                position
            )));
        }
        Ok(Cursor::new(page.number(), offset))
    }
}

//! Page Store
//!
//! Owns an ordered, disjoint sequence of pages and the mapping from a
//! `Cursor` to the page that holds it.
//!
//! ## Invariants
//! - `pages` is sorted by `Number` ascending with no duplicates; every
//!   structural change goes through `insert_sorted`, `remove_head_page` or
//!   `split`
//! - Only the tail page is writable after `open`; earlier pages are sealed
//!
//! ## Concurrency
//! Not safe for concurrent mutation. Callers serialize appends, splits and
//! removals; sealed pages may be read from many threads.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, SegError};

use super::{Cursor, Overflow, Page, PagePolicy};

/// Which remainders a `split` produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    /// Interval too small to be worth splitting; the page is untouched
    Unchanged,
    /// The whole page fell inside the interval and was deleted
    Removed,
    /// Only the left remainder survives (the interval reached the page end)
    Left,
    /// Only the right remainder survives (the interval began at the page start)
    Right,
    /// Both a left and a right remainder survive
    Both,
}

/// Sorted collection of pages configured by a `PagePolicy`
pub struct PageStore<P: PagePolicy> {
    dir: PathBuf,
    policy: P,
    pages: Vec<Page<P::Number>>,
}

impl<P: PagePolicy> PageStore<P> {
    /// Open or create a store in `dir`
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Discover page files by parsing their names
    /// 3. Seal every page but the last, which stays writable
    /// 4. Create a first page if none exist and the policy numbers one
    pub fn open(dir: &Path, policy: P) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let mut found = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name();
            match name.to_str().and_then(|text| policy.parse_number(text)) {
                Some(number) => found.push((number, path)),
                None => debug!(path = %path.display(), "skipping non-page file"),
            }
        }

        found.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(pair) = found.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(SegError::InvalidLayout(format!(
                "pages {} and {} share number {}",
                pair[0].1.display(),
                pair[1].1.display(),
                pair[0].0
            )));
        }

        let count = found.len();
        let mut pages = Vec::with_capacity(count);
        for (i, (number, path)) in found.into_iter().enumerate() {
            let page = if i + 1 == count {
                Page::open(&path, number, policy.capacity())?
            } else {
                Page::open_read_only(&path, number)?
            };
            pages.push(page);
        }

        let mut store = Self {
            dir: dir.to_path_buf(),
            policy,
            pages,
        };

        if store.pages.is_empty() && store.policy.new_number(None).is_some() {
            store.new_page()?;
        }

        info!(dir = %store.dir.display(), pages = store.pages.len(), "opened page store");
        Ok(store)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    pub fn pages(&self) -> &[Page<P::Number>] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&Page<P::Number>> {
        self.pages.get(index)
    }

    pub fn page_mut(&mut self, index: usize) -> Option<&mut Page<P::Number>> {
        self.pages.get_mut(index)
    }

    pub fn last(&self) -> Option<&Page<P::Number>> {
        self.pages.last()
    }

    /// Number of pages
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn path_of(&self, number: &P::Number) -> PathBuf {
        self.dir.join(self.policy.file_name(number))
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Index of the page whose range contains `number`: the last page whose
    /// own number is `<= number`. `None` if `number` precedes every page.
    pub fn binary_search_page_index(&self, number: &P::Number) -> Option<usize> {
        let after = self.pages.partition_point(|page| page.number() <= *number);
        after.checked_sub(1)
    }

    /// Index of the page numbered exactly `number`
    pub fn index_of(&self, number: &P::Number) -> Option<usize> {
        self.pages
            .binary_search_by(|page| page.number().cmp(number))
            .ok()
    }

    // =========================================================================
    // Structural Changes
    // =========================================================================

    /// Create the page that follows the current tail and add it
    pub fn new_page(&mut self) -> Result<&mut Page<P::Number>> {
        let number = self.policy.new_number(self.pages.last()).ok_or_else(|| {
            SegError::InvalidLayout(format!(
                "store {} does not allocate pages",
                self.dir.display()
            ))
        })?;
        let page = self.policy.new_page(&self.path_of(&number), number)?;
        debug!(dir = %self.dir.display(), %number, "new page");
        let index = self.insert_sorted(page)?;
        Ok(&mut self.pages[index])
    }

    /// Insert `page` at its sorted position, returning that position
    pub fn insert_sorted(&mut self, page: Page<P::Number>) -> Result<usize> {
        let number = page.number();
        let index = self.pages.partition_point(|p| p.number() < number);
        if self.pages.get(index).is_some_and(|p| p.number() == number) {
            return Err(SegError::InvalidLayout(format!(
                "page {} already exists in {}",
                number,
                self.dir.display()
            )));
        }
        self.pages.insert(index, page);
        Ok(index)
    }

    /// Delete the oldest page. Returns false if the store was empty.
    pub fn remove_head_page(&mut self) -> Result<bool> {
        if self.pages.is_empty() {
            return Ok(false);
        }
        let page = self.pages.remove(0);
        debug!(number = %page.number(), "removing head page");
        page.delete()?;
        Ok(true)
    }

    /// Delete every page that lies wholly below the page containing
    /// `number`. Returns how many pages were removed.
    pub fn remove_pages_from_head_to(&mut self, number: &P::Number) -> Result<usize> {
        let index = self.binary_search_page_index(number).unwrap_or(0);
        for _ in 0..index {
            self.remove_head_page()?;
        }
        Ok(index)
    }

    /// Remove every page and start again with a single empty one
    pub fn reset(&mut self) -> Result<()> {
        while self.remove_head_page()? {}
        self.new_page()?;
        Ok(())
    }

    /// Cut in-page bytes `[begin, end)` out of page `index`.
    ///
    /// The right remainder `[end, len)` is copied into a new file numbered
    /// `right_number` before the left remainder is truncated to `begin`, so
    /// the copy never reads a shortened file. Remainders that are no longer
    /// the tail are sealed.
    pub fn split(
        &mut self,
        index: usize,
        begin: u64,
        end: u64,
        right_number: P::Number,
    ) -> Result<Split> {
        let count = self.pages.len();
        let page = self.pages.get(index).ok_or_else(|| {
            SegError::NotFound(format!("page index {} of {}", index, count))
        })?;
        let len = page.len();
        if begin >= end || begin >= len {
            return Ok(Split::Unchanged);
        }
        let end = end.min(len);

        let (_, record_len) = self.policy.read(page, begin)?;
        let minimum = record_len.max(self.policy.min_split_len());
        if end - begin < minimum {
            return Ok(Split::Unchanged);
        }

        let is_tail = index + 1 == count;
        if end == len && !is_tail {
            if begin == 0 {
                let page = self.pages.remove(index);
                page.delete()?;
                debug!(index, "split removed whole page");
                return Ok(Split::Removed);
            }
            let left = &mut self.pages[index];
            left.truncate(begin)?;
            left.seal()?;
            debug!(index, begin, "split kept left remainder");
            return Ok(Split::Left);
        }

        if right_number <= page.number()
            || self
                .pages
                .get(index + 1)
                .is_some_and(|next| right_number >= next.number())
        {
            return Err(SegError::InvalidLayout(format!(
                "right remainder {} falls outside page {}",
                right_number,
                page.number()
            )));
        }

        let path = self.path_of(&right_number);
        let mut right = page.copy_tail(end, &path, right_number, self.policy.capacity())?;
        if !is_tail {
            right.seal()?;
        }

        if begin == 0 {
            let old = std::mem::replace(&mut self.pages[index], right);
            old.delete()?;
            debug!(index, %right_number, "split kept right remainder");
            return Ok(Split::Right);
        }

        let left = &mut self.pages[index];
        left.truncate(begin)?;
        left.seal()?;
        self.pages.insert(index + 1, right);
        debug!(index, begin, %right_number, "split kept both remainders");
        Ok(Split::Both)
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Append to the tail page, rolling to a new page on overflow when the
    /// policy allows it
    pub fn append(&mut self, item: &P::Item, force: bool) -> Result<Cursor<P::Number>> {
        let bytes = self.policy.encode(item)?;
        if self.pages.is_empty() {
            self.new_page()?;
        }

        let tail = self.pages.len() - 1;
        let page = &mut self.pages[tail];
        match page.append(&bytes, force) {
            Ok(offset) => Ok(Cursor::new(page.number(), offset)),
            Err(SegError::Overflow { .. })
                if self.policy.overflow() == Overflow::Roll && !page.is_empty() =>
            {
                page.seal()?;
                let page = self.new_page()?;
                let offset = page.append(&bytes, force)?;
                Ok(Cursor::new(page.number(), offset))
            }
            Err(e) => Err(e),
        }
    }

    /// Append to page `index`; overflow is always surfaced
    pub fn append_at(
        &mut self,
        index: usize,
        item: &P::Item,
        force: bool,
    ) -> Result<Cursor<P::Number>> {
        let bytes = self.policy.encode(item)?;
        let count = self.pages.len();
        let page = self.pages.get_mut(index).ok_or_else(|| {
            SegError::NotFound(format!("page index {} of {}", index, count))
        })?;
        let offset = page.append(&bytes, force)?;
        Ok(Cursor::new(page.number(), offset))
    }

    /// Decode the record at `cursor` with its encoded length
    pub fn read(&self, cursor: &Cursor<P::Number>) -> Result<(P::Item, u64)> {
        let page = self
            .index_of(&cursor.number)
            .map(|index| &self.pages[index])
            .ok_or_else(|| SegError::NotFound(format!("no page numbered {}", cursor.number)))?;
        if cursor.offset >= page.len() {
            return Err(SegError::NotFound(format!(
                "offset {} is past the end of page {}",
                cursor.offset, cursor.number
            )));
        }
        self.policy.read(page, cursor.offset)
    }

    pub fn get(&self, cursor: &Cursor<P::Number>) -> Result<P::Item> {
        self.read(cursor).map(|(item, _)| item)
    }

    /// Cursor of the first record in the store
    pub fn head(&self) -> Option<Cursor<P::Number>> {
        self.first_record_from(0)
    }

    /// Cursor of the record following `cursor`, crossing into later pages
    pub fn next(&self, cursor: &Cursor<P::Number>) -> Result<Option<Cursor<P::Number>>> {
        let (_, record_len) = self.read(cursor)?;
        let offset = cursor.offset + record_len;
        let index = self
            .index_of(&cursor.number)
            .ok_or_else(|| SegError::NotFound(format!("no page numbered {}", cursor.number)))?;
        if offset < self.pages[index].len() {
            return Ok(Some(Cursor::new(cursor.number, offset)));
        }
        Ok(self.first_record_from(index + 1))
    }

    /// Iterate records starting at the first byte of page `index`
    pub fn iter_from(&self, index: usize) -> Iter<'_, P> {
        Iter {
            store: self,
            index,
            offset: 0,
            done: false,
        }
    }

    fn first_record_from(&self, index: usize) -> Option<Cursor<P::Number>> {
        self.pages[index.min(self.pages.len())..]
            .iter()
            .find(|page| !page.is_empty())
            .map(|page| Cursor::new(page.number(), 0))
    }

    // =========================================================================
    // Durability
    // =========================================================================

    pub fn force(&mut self, index: usize) -> Result<()> {
        match self.pages.get_mut(index) {
            Some(page) => page.force(),
            None => Ok(()),
        }
    }

    pub fn seal_all(&mut self) -> Result<()> {
        for page in &mut self.pages {
            page.seal()?;
        }
        Ok(())
    }

    /// Release every page's mapping
    pub fn close(&mut self) {
        for page in &mut self.pages {
            page.close();
        }
    }
}

/// Iterator over `(cursor, record)` pairs in page order.
///
/// Stops after yielding the first error.
pub struct Iter<'a, P: PagePolicy> {
    store: &'a PageStore<P>,
    index: usize,
    offset: u64,
    done: bool,
}

impl<'a, P: PagePolicy> Iterator for Iter<'a, P> {
    type Item = Result<(Cursor<P::Number>, P::Item)>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let page = self.store.pages.get(self.index)?;
            if self.offset >= page.len() {
                self.index += 1;
                self.offset = 0;
                continue;
            }

            let cursor = Cursor::new(page.number(), self.offset);
            return match self.store.policy.read(page, self.offset) {
                Ok((item, record_len)) => {
                    self.offset += record_len;
                    Some(Ok((cursor, item)))
                }
                Err(e) => {
                    self.done = true;
                    Some(Err(e))
                }
            };
        }
        None
    }
}

//! Page policy
//!
//! The injectable part of a page store: how pages are numbered, named,
//! sized, and how records are laid out inside them.

use std::path::Path;

use crate::error::Result;

use super::{Number, Page};

/// What a store does when the tail page cannot take another record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// Seal the tail and continue in a freshly created page
    Roll,
    /// Surface `SegError::Overflow` to the caller
    Fail,
}

/// Configuration of one `PageStore`
pub trait PagePolicy {
    type Number: Number;
    type Item;

    /// Byte capacity of a newly created page
    fn capacity(&self) -> u64;

    fn overflow(&self) -> Overflow;

    /// Number for the page following `last` (`None` for the first page).
    ///
    /// Returning `None` means the store never allocates pages on its own.
    fn new_number(&self, last: Option<&Page<Self::Number>>) -> Option<Self::Number>;

    /// Parse a file name back into a `Number`; `None` skips the file
    fn parse_number(&self, text: &str) -> Option<Self::Number>;

    fn file_name(&self, number: &Self::Number) -> String {
        number.to_string()
    }

    fn new_page(&self, path: &Path, number: Self::Number) -> Result<Page<Self::Number>> {
        Page::create(path, number, self.capacity())
    }

    fn encode(&self, item: &Self::Item) -> Result<Vec<u8>>;

    /// Decode the record at `offset`, returning it with its encoded length
    fn read(&self, page: &Page<Self::Number>, offset: u64) -> Result<(Self::Item, u64)>;

    /// Split intervals shorter than this are left in place
    fn min_split_len(&self) -> u64 {
        0
    }
}

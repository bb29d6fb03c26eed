//! Page Module
//!
//! Numbered, append-only file segments and the store that keeps them ordered.
//!
//! ## Responsibilities
//! - Own one file (and at most one memory mapping) per page
//! - Keep pages sorted by `Number` and find the owning page in O(log p)
//! - Roll to a fresh page on overflow, or surface the overflow, per policy
//! - Split a page into left/right remainders for truncation and GC
//!
//! ## Directory Layout
//! ```text
//! {dir}/
//!   ├── 0          (page starting at Number 0)
//!   ├── 4096       (page starting at Number 4096)
//!   └── ...        (file name is the page's Number rendered as text)
//! ```
//!
//! The journal, the byte-addressed log and both index strategies are
//! configurations of the same `PageStore`, differing only in their
//! `PagePolicy`.

mod log;
mod page;
mod policy;
mod store;

use std::fmt::{Debug, Display};

pub use log::{LogPolicy, PageLog};
pub use page::Page;
pub use policy::{Overflow, PagePolicy};
pub use store::{Iter, PageStore, Split};

/// Total order used to address pages.
///
/// `Display` is the page's file name; policies parse it back.
pub trait Number: Copy + Ord + Debug + Display + Send + Sync + 'static {}

/// Byte positions address the pages of a `PageLog`.
impl Number for u64 {}

/// A record's location: the owning page's number plus an in-page offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor<N> {
    pub number: N,
    pub offset: u64,
}

impl<N: Number> Cursor<N> {
    pub fn new(number: N, offset: u64) -> Self {
        Self { number, offset }
    }
}

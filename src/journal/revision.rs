//! Journal revisions
//!
//! A `Revision` is both the sequence number of one journal event and the
//! `Number` of the journal page whose first event carries it.

use std::fmt;
use std::str::FromStr;

use crate::page::Number;

/// Strictly increasing 64-bit journal sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Revision(u64);

impl Revision {
    pub const ZERO: Revision = Revision(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn increment(self) -> Self {
        Self(self.0 + 1)
    }

    /// Number of revisions from `self` up to `later`
    pub fn distance_to(self, later: Revision) -> u64 {
        later.0.saturating_sub(self.0)
    }
}

impl Number for Revision {}

impl From<u64> for Revision {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Revision {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Revision)
    }
}

//! Journal recovery contract
//!
//! The sink a journal replays into, and the summary of one replay.

use crate::error::Result;

use super::Revision;

/// Receiver of replayed journal events.
///
/// During `Journal::recover` the calls arrive in exactly this order:
/// `last_checkpoint` once, `apply` zero or more times in ascending revision
/// order, `force` once.
pub trait Applicable<E> {
    /// Revision of the last event whose effects are durable in the sink,
    /// or `None` if nothing has been applied yet
    fn last_checkpoint(&self) -> Option<Revision>;

    fn apply(&mut self, event: E) -> Result<()>;

    /// Make everything applied so far durable
    fn force(&mut self) -> Result<()>;
}

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of events handed to the sink
    pub entries_recovered: u64,

    /// Number of events at or below the sink's checkpoint
    pub entries_skipped: u64,

    /// Revision of the last event read from disk
    pub last_revision: Option<Revision>,

    /// Whether replay stopped at a corrupt record
    pub stopped_at_corruption: bool,
}

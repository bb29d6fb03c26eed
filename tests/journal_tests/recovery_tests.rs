//! Tests for Journal recovery
//!
//! These tests verify:
//! - The sink sees one checkpoint read, ordered applies, one force
//! - Only events newer than the checkpoint are applied
//! - Erased pages are skipped and surviving pages replay completely
//! - Replay stops at the first corrupt record
//! - The journal is reset to one empty page after recovery

use std::fs;

use segkv::codec::{BincodeCodec, RawCodec};
use segkv::{Applicable, Config, Journal, Result, Revision, SegError};
use tempfile::TempDir;

// =============================================================================
// Recording Sink
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call<E> {
    Checkpoint,
    Apply(E),
    Force,
}

struct RecordingSink<E> {
    checkpoint: Option<Revision>,
    calls: std::cell::RefCell<Vec<Call<E>>>,
    fail_apply: bool,
}

impl<E> RecordingSink<E> {
    fn at(checkpoint: Option<Revision>) -> Self {
        Self {
            checkpoint,
            calls: std::cell::RefCell::new(Vec::new()),
            fail_apply: false,
        }
    }

    fn calls(self) -> Vec<Call<E>> {
        self.calls.into_inner()
    }
}

impl<E> Applicable<E> for RecordingSink<E> {
    fn last_checkpoint(&self) -> Option<Revision> {
        self.calls.borrow_mut().push(Call::Checkpoint);
        self.checkpoint
    }

    fn apply(&mut self, event: E) -> Result<()> {
        if self.fail_apply {
            return Err(SegError::NotFound("sink rejected event".into()));
        }
        self.calls.borrow_mut().push(Call::Apply(event));
        Ok(())
    }

    fn force(&mut self) -> Result<()> {
        self.calls.borrow_mut().push(Call::Force);
        Ok(())
    }
}

fn small_pages() -> Config {
    Config::builder().journal_page_capacity(4096).build().unwrap()
}

/// 1000-byte events, four per 4096-byte page
fn fat_journal(dir: &TempDir, count: u8) -> Journal<RawCodec> {
    let mut journal = Journal::open(dir.path(), RawCodec, &small_pages()).unwrap();
    for i in 0..count {
        journal.append(&vec![i; 1000], false).unwrap();
    }
    journal
}

fn applied(calls: &[Call<Vec<u8>>]) -> Vec<u8> {
    calls
        .iter()
        .filter_map(|call| match call {
            Call::Apply(event) => Some(event[0]),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Scenario Tests
// =============================================================================

#[test]
fn test_recover_after_erase_skips_erased_events() {
    let dir = TempDir::new().unwrap();
    let mut journal =
        Journal::open(dir.path(), BincodeCodec::<String>::new(), &Config::default()).unwrap();

    assert_eq!(journal.append(&"1".to_string(), true).unwrap(), Revision::new(0));
    assert_eq!(journal.append(&"2".to_string(), true).unwrap(), Revision::new(1));
    assert_eq!(journal.append(&"3".to_string(), true).unwrap(), Revision::new(2));

    journal.erase_by(Revision::new(1)).unwrap();

    let mut sink = RecordingSink::at(None);
    let result = journal.recover(&mut sink).unwrap();

    assert_eq!(
        sink.calls(),
        vec![
            Call::Checkpoint,
            Call::Apply("2".to_string()),
            Call::Apply("3".to_string()),
            Call::Force,
        ]
    );
    assert_eq!(result.entries_recovered, 2);
    assert_eq!(result.last_revision, Some(Revision::new(2)));
}

#[test]
fn test_recover_applies_only_after_checkpoint() {
    let dir = TempDir::new().unwrap();
    let mut journal = fat_journal(&dir, 10);

    let mut sink = RecordingSink::at(Some(Revision::new(4)));
    let result = journal.recover(&mut sink).unwrap();

    assert_eq!(result.entries_recovered, 5);
    assert_eq!(result.entries_skipped, 1);
    assert!(!result.stopped_at_corruption);

    let calls = sink.calls();
    assert_eq!(calls.first(), Some(&Call::Checkpoint));
    assert_eq!(calls.last(), Some(&Call::Force));
    assert_eq!(applied(&calls), vec![5, 6, 7, 8, 9]);
}

#[test]
fn test_recover_at_latest_checkpoint_applies_nothing() {
    let dir = TempDir::new().unwrap();
    let mut journal = fat_journal(&dir, 6);

    let mut sink = RecordingSink::at(Some(Revision::new(5)));
    journal.recover(&mut sink).unwrap();

    assert_eq!(sink.calls(), vec![Call::Checkpoint, Call::Force]);
}

#[test]
fn test_recover_checkpoint_before_erased_pages() {
    let dir = TempDir::new().unwrap();
    let mut journal = fat_journal(&dir, 10);
    journal.erase_by(Revision::new(6)).unwrap();

    let mut sink = RecordingSink::at(Some(Revision::new(2)));
    let result = journal.recover(&mut sink).unwrap();

    assert_eq!(applied(&sink.calls()), vec![6, 7, 8, 9]);
    assert_eq!(result.entries_skipped, 0);
}

#[test]
fn test_recover_fresh_journal_forces_once() {
    let dir = TempDir::new().unwrap();
    let mut journal = Journal::open(dir.path(), RawCodec, &small_pages()).unwrap();

    let mut sink = RecordingSink::at(None);
    let result = journal.recover(&mut sink).unwrap();

    assert_eq!(sink.calls(), vec![Call::Checkpoint, Call::Force]);
    assert_eq!(result.last_revision, None);
    assert_eq!(journal.pages().len(), 1);
    assert_eq!(journal.revision(), Revision::ZERO);
}

// =============================================================================
// Reset Tests
// =============================================================================

#[test]
fn test_recover_resets_to_single_empty_page() {
    let dir = TempDir::new().unwrap();
    let mut journal = fat_journal(&dir, 10);

    journal.recover(&mut RecordingSink::at(None)).unwrap();

    assert_eq!(journal.pages().len(), 1);
    assert_eq!(journal.pages()[0].number(), Revision::new(10));
    assert!(journal.pages()[0].is_empty());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

    assert_eq!(journal.append(&vec![10; 1000], false).unwrap(), Revision::new(10));
}

#[test]
fn test_recover_after_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let mut journal = fat_journal(&dir, 7);
        journal.append(&vec![7; 1000], true).unwrap();
        journal.close();
    }

    let mut journal = Journal::open(dir.path(), RawCodec, &small_pages()).unwrap();
    let mut sink = RecordingSink::at(Some(Revision::new(3)));
    journal.recover(&mut sink).unwrap();

    assert_eq!(applied(&sink.calls()), vec![4, 5, 6, 7]);
    assert_eq!(journal.revision(), Revision::new(8));
}

#[test]
fn test_recover_behind_checkpoint_continues_after_it() {
    let dir = TempDir::new().unwrap();
    let mut journal = fat_journal(&dir, 3);

    // The sink has absorbed more than this journal still holds
    let mut sink = RecordingSink::at(Some(Revision::new(9)));
    let result = journal.recover(&mut sink).unwrap();

    assert_eq!(result.entries_recovered, 0);
    assert_eq!(result.entries_skipped, 3);
    assert_eq!(journal.revision(), Revision::new(10));
    assert_eq!(journal.append(&vec![10; 1000], false).unwrap(), Revision::new(10));

    let mut sink = RecordingSink::at(Some(Revision::new(9)));
    journal.recover(&mut sink).unwrap();
    assert_eq!(applied(&sink.calls()), vec![10]);
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_recover_stops_at_corrupt_record() {
    let dir = TempDir::new().unwrap();
    {
        let mut journal = fat_journal(&dir, 6);
        journal.close();
    }

    // Flip a payload byte of revision 1, inside sealed page "0"
    let path = dir.path().join("0");
    let mut bytes = fs::read(&path).unwrap();
    bytes[1008 + 100] ^= 0xff;
    fs::write(&path, &bytes).unwrap();

    let mut journal = Journal::open(dir.path(), RawCodec, &small_pages()).unwrap();
    let mut sink = RecordingSink::at(None);
    let result = journal.recover(&mut sink).unwrap();

    assert!(result.stopped_at_corruption);
    assert_eq!(result.entries_recovered, 1);

    let calls = sink.calls();
    assert_eq!(applied(&calls), vec![0]);
    assert_eq!(calls.last(), Some(&Call::Force));

    // Revisions never go backwards past what was on disk
    assert_eq!(journal.revision(), Revision::new(6));
}

#[test]
fn test_recover_propagates_sink_errors() {
    let dir = TempDir::new().unwrap();
    let mut journal = fat_journal(&dir, 3);

    let mut sink = RecordingSink::at(None);
    sink.fail_apply = true;
    let result = journal.recover(&mut sink);

    assert!(matches!(result, Err(SegError::NotFound(_))));
    assert_eq!(sink.calls(), vec![Call::Checkpoint]);
    assert_eq!(journal.iter().count(), 3);
}

//! Tests for Journal append, erase and reopen
//!
//! These tests verify:
//! - Revisions returned by append are 0, 1, 2, ... in call order
//! - Pages roll over and are named by their first revision
//! - erase_by drops whole pages and splits the covering page
//! - A torn tail is truncated on reopen and revisions stay monotonic

use std::fs::{self, OpenOptions};
use std::io::Write;

use segkv::codec::{BincodeCodec, RawCodec};
use segkv::{Config, Journal, Revision, SegError};
use tempfile::TempDir;

/// Frame length of a `fat_event`: 8-byte header + 1000-byte payload
const FAT_FRAME: u64 = 1008;

fn small_pages() -> Config {
    Config::builder().journal_page_capacity(4096).build().unwrap()
}

/// Four fit in a 4096-byte page
fn fat_event(i: u8) -> Vec<u8> {
    vec![i; 1000]
}

fn revisions(journal: &Journal<RawCodec>) -> Vec<u64> {
    journal
        .iter()
        .map(|item| item.unwrap().0.value())
        .collect()
}

fn page_numbers(journal: &Journal<RawCodec>) -> Vec<u64> {
    journal.pages().iter().map(|page| page.number().value()).collect()
}

fn fat_journal(dir: &TempDir, count: u8) -> Journal<RawCodec> {
    let mut journal = Journal::open(dir.path(), RawCodec, &small_pages()).unwrap();
    for i in 0..count {
        journal.append(&fat_event(i), false).unwrap();
    }
    journal
}

// =============================================================================
// Append Tests
// =============================================================================

#[test]
fn test_append_returns_consecutive_revisions() {
    let dir = TempDir::new().unwrap();
    let mut journal =
        Journal::open(dir.path(), BincodeCodec::<String>::new(), &Config::default()).unwrap();

    for expected in 0..100u64 {
        let revision = journal.append(&format!("event-{}", expected), false).unwrap();
        assert_eq!(revision, Revision::new(expected));
    }
    assert_eq!(journal.revision(), Revision::new(100));
}

#[test]
fn test_pages_named_by_first_revision() {
    let dir = TempDir::new().unwrap();
    let journal = fat_journal(&dir, 10);

    assert_eq!(page_numbers(&journal), vec![0, 4, 8]);
    assert!(dir.path().join("4").exists());
    assert_eq!(revisions(&journal), (0..10).collect::<Vec<_>>());
}

#[test]
fn test_iter_returns_events_in_order() {
    let dir = TempDir::new().unwrap();
    let journal = fat_journal(&dir, 6);

    let events: Vec<Vec<u8>> = journal.iter().map(|item| item.unwrap().1).collect();
    assert_eq!(events, (0..6).map(fat_event).collect::<Vec<_>>());
}

#[test]
fn test_event_larger_than_page_overflows() {
    let dir = TempDir::new().unwrap();
    let mut journal = Journal::open(dir.path(), RawCodec, &small_pages()).unwrap();

    let result = journal.append(&vec![0u8; 5000], true);
    assert!(matches!(result, Err(SegError::Overflow { .. })));
    assert_eq!(journal.revision(), Revision::ZERO);

    assert_eq!(journal.append(&b"fits".to_vec(), true).unwrap(), Revision::ZERO);
}

// =============================================================================
// Erase Tests
// =============================================================================

#[test]
fn test_erase_by_splits_covering_page() {
    let dir = TempDir::new().unwrap();
    let mut journal = fat_journal(&dir, 12);

    journal.erase_by(Revision::new(6)).unwrap();

    assert_eq!(page_numbers(&journal), vec![6, 8]);
    assert!(!dir.path().join("0").exists());
    assert!(!dir.path().join("4").exists());
    assert_eq!(fs::metadata(dir.path().join("6")).unwrap().len(), 2 * FAT_FRAME);
    assert_eq!(revisions(&journal), (6..12).collect::<Vec<_>>());
}

#[test]
fn test_erase_by_page_boundary_removes_whole_pages() {
    let dir = TempDir::new().unwrap();
    let mut journal = fat_journal(&dir, 12);

    journal.erase_by(Revision::new(8)).unwrap();
    assert_eq!(page_numbers(&journal), vec![8]);
    assert_eq!(revisions(&journal), (8..12).collect::<Vec<_>>());
}

#[test]
fn test_erase_by_is_clamped_to_next_revision() {
    let dir = TempDir::new().unwrap();
    let mut journal = fat_journal(&dir, 6);

    journal.erase_by(Revision::new(1_000)).unwrap();
    assert!(revisions(&journal).is_empty());

    assert_eq!(journal.append(&fat_event(6), false).unwrap(), Revision::new(6));
    assert_eq!(revisions(&journal), vec![6]);
}

#[test]
fn test_erase_by_before_head_is_noop() {
    let dir = TempDir::new().unwrap();
    let mut journal = fat_journal(&dir, 6);
    journal.erase_by(Revision::new(4)).unwrap();

    journal.erase_by(Revision::new(2)).unwrap();
    assert_eq!(page_numbers(&journal), vec![4]);
    assert_eq!(revisions(&journal), vec![4, 5]);
}

// =============================================================================
// Reopen Tests
// =============================================================================

#[test]
fn test_reopen_continues_revisions() {
    let dir = TempDir::new().unwrap();
    {
        let mut journal = fat_journal(&dir, 6);
        journal.append(&fat_event(6), true).unwrap();
        journal.close();
    }

    let mut journal = Journal::open(dir.path(), RawCodec, &small_pages()).unwrap();
    assert_eq!(journal.revision(), Revision::new(7));
    assert_eq!(journal.append(&fat_event(7), false).unwrap(), Revision::new(7));
    assert_eq!(revisions(&journal), (0..8).collect::<Vec<_>>());
}

#[test]
fn test_reopen_truncates_torn_tail() {
    let dir = TempDir::new().unwrap();
    {
        let mut journal = fat_journal(&dir, 3);
        journal.append(&fat_event(3), true).unwrap();
        journal.append(&fat_event(4), true).unwrap();
        journal.close();
    }

    // A frame header promising more payload than was written
    let tail = dir.path().join("4");
    let mut file = OpenOptions::new().append(true).open(&tail).unwrap();
    file.write_all(&[0x10, 0, 0, 0, 0, 0, 0, 0, 0xde, 0xad]).unwrap();
    drop(file);

    let mut journal = Journal::open(dir.path(), RawCodec, &small_pages()).unwrap();
    assert_eq!(journal.revision(), Revision::new(5));
    assert_eq!(fs::metadata(&tail).unwrap().len(), FAT_FRAME);
    assert_eq!(revisions(&journal), (0..5).collect::<Vec<_>>());

    assert_eq!(journal.append(&fat_event(5), false).unwrap(), Revision::new(5));
}

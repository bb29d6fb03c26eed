//! Tests for the byte-addressed PageLog
//!
//! These tests verify:
//! - Absolute positions across page boundaries
//! - Truncation that renames the covering page by position
//! - Garbage collection of an interval inside a page
//! - Reopen continuity

use segkv::codec::RawCodec;
use segkv::page::{PageLog, Split};
use segkv::{Config, SegError};
use tempfile::TempDir;

/// 8-byte payload + 8-byte frame header
const RECORD: u64 = 16;

fn config() -> Config {
    Config::builder().log_page_capacity(4096).build().unwrap()
}

fn payload(i: u64) -> Vec<u8> {
    i.to_be_bytes().to_vec()
}

fn filled(dir: &TempDir, count: u64) -> PageLog<RawCodec> {
    let mut log = PageLog::open(dir.path(), RawCodec, &config()).unwrap();
    for i in 0..count {
        assert_eq!(log.append(&payload(i), false).unwrap(), i * RECORD);
    }
    log
}

fn page_numbers(log: &PageLog<RawCodec>) -> Vec<u64> {
    log.pages().iter().map(|page| page.number()).collect()
}

// =============================================================================
// Append / Get Tests
// =============================================================================

#[test]
fn test_positions_span_pages() {
    let dir = TempDir::new().unwrap();
    let log = filled(&dir, 513);

    assert_eq!(page_numbers(&log), vec![0, 4096, 8192]);
    assert_eq!(log.get(0).unwrap(), payload(0));
    assert_eq!(log.get(4112).unwrap(), payload(257));
    assert_eq!(log.get(8192).unwrap(), payload(512));
    assert_eq!(log.end(), 8192 + RECORD);
}

#[test]
fn test_get_outside_written_range() {
    let dir = TempDir::new().unwrap();
    let log = filled(&dir, 4);

    assert!(matches!(log.get(64), Err(SegError::NotFound(_))));
    assert!(matches!(log.get(1 << 40), Err(SegError::NotFound(_))));
}

#[test]
fn test_next_walks_records() {
    let dir = TempDir::new().unwrap();
    let log = filled(&dir, 257);

    assert_eq!(log.head(), Some(0));
    assert_eq!(log.next(0).unwrap(), Some(RECORD));
    assert_eq!(log.next(4096 - RECORD).unwrap(), Some(4096));
    assert_eq!(log.next(4096).unwrap(), None);
}

// =============================================================================
// Truncate / Collect Tests
// =============================================================================

#[test]
fn test_truncate_renames_covering_page() {
    let dir = TempDir::new().unwrap();
    let mut log = filled(&dir, 513);

    assert_eq!(log.truncate(4112).unwrap(), Split::Right);
    assert_eq!(page_numbers(&log), vec![4112, 8192]);
    assert!(!dir.path().join("0").exists());
    assert!(!dir.path().join("4096").exists());
    assert!(dir.path().join("4112").exists());

    assert_eq!(log.head(), Some(4112));
    assert_eq!(log.get(4112).unwrap(), payload(257));
    assert!(matches!(log.get(4096), Err(SegError::NotFound(_))));
    assert_eq!(log.get(8192).unwrap(), payload(512));
}

#[test]
fn test_truncate_on_page_boundary_only_removes() {
    let dir = TempDir::new().unwrap();
    let mut log = filled(&dir, 513);

    assert_eq!(log.truncate(4096).unwrap(), Split::Removed);
    assert_eq!(page_numbers(&log), vec![4096, 8192]);
    assert_eq!(log.truncate(4096).unwrap(), Split::Unchanged);
}

#[test]
fn test_collect_inside_page() {
    let dir = TempDir::new().unwrap();
    let mut log = filled(&dir, 8);

    assert_eq!(log.collect(RECORD, 3 * RECORD).unwrap(), Split::Both);
    assert_eq!(page_numbers(&log), vec![0, 3 * RECORD]);

    assert_eq!(log.get(0).unwrap(), payload(0));
    assert!(matches!(log.get(RECORD), Err(SegError::NotFound(_))));
    assert_eq!(log.get(3 * RECORD).unwrap(), payload(3));
    assert_eq!(log.next(0).unwrap(), Some(3 * RECORD));
}

#[test]
fn test_collect_below_minimum_is_unchanged() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .log_page_capacity(4096)
        .min_split_len(1024)
        .build()
        .unwrap();
    let mut log = PageLog::open(dir.path(), RawCodec, &config).unwrap();
    for i in 0..8 {
        log.append(&payload(i), false).unwrap();
    }

    assert_eq!(log.collect(RECORD, 3 * RECORD).unwrap(), Split::Unchanged);
    assert_eq!(log.get(RECORD).unwrap(), payload(1));
}

// =============================================================================
// Reopen Tests
// =============================================================================

#[test]
fn test_reopen_continues_at_end() {
    let dir = TempDir::new().unwrap();
    {
        let mut log = filled(&dir, 300);
        log.force().unwrap();
        log.close();
    }

    let mut log = PageLog::open(dir.path(), RawCodec, &config()).unwrap();
    assert_eq!(page_numbers(&log), vec![0, 4096]);
    assert_eq!(log.end(), 300 * RECORD);
    assert_eq!(log.append(&payload(300), false).unwrap(), 300 * RECORD);
    assert_eq!(log.get(299 * RECORD).unwrap(), payload(299));
}

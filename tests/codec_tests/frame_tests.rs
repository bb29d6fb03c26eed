//! Tests for codecs and record framing
//!
//! These tests verify:
//! - Bincode and raw codecs through a framed page
//! - Encoded length reporting
//! - Torn header, torn payload and checksum corruption detection

use std::fs;

use segkv::codec::{BincodeCodec, Codec, Framed, RawCodec, FRAME_HEADER_LEN};
use segkv::page::Page;
use segkv::SegError;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Event {
    Put { name: String, offset: u64 },
    Delete { name: String },
}

fn corruption_reason(result: Result<(Vec<u8>, u64), SegError>) -> String {
    match result {
        Err(SegError::CorruptRecord { reason, .. }) => reason,
        other => panic!("expected CorruptRecord, got {:?}", other),
    }
}

// =============================================================================
// Codec Tests
// =============================================================================

#[test]
fn test_bincode_encoded_len_matches_encoding() {
    let codec = BincodeCodec::<Event>::new();
    let event = Event::Put {
        name: "alpha".to_string(),
        offset: 42,
    };

    let bytes = codec.encode(&event).unwrap();
    assert_eq!(codec.encoded_len(&event).unwrap(), bytes.len());
    assert_eq!(codec.decode(&bytes).unwrap(), event);
}

#[test]
fn test_bincode_decode_garbage_is_serialization_error() {
    let codec = BincodeCodec::<Event>::new();
    let result = codec.decode(&[0xff, 0xff, 0xff, 0xff]);
    assert!(matches!(result, Err(SegError::Serialization(_))));
}

#[test]
fn test_frame_len_includes_header() {
    let framed = Framed::new(RawCodec);
    let payload = b"hello".to_vec();

    assert_eq!(framed.frame_len(&payload).unwrap(), (FRAME_HEADER_LEN + 5) as u64);
    assert_eq!(framed.encode(&payload).unwrap().len(), FRAME_HEADER_LEN + 5);
}

// =============================================================================
// Framed Page Tests
// =============================================================================

#[test]
fn test_frames_read_back_from_page() {
    let dir = TempDir::new().unwrap();
    let framed = Framed::new(BincodeCodec::<Event>::new());
    let events = vec![
        Event::Put {
            name: "a".to_string(),
            offset: 1,
        },
        Event::Delete {
            name: "b".to_string(),
        },
    ];

    let mut page = Page::create(&dir.path().join("0"), 0u64, 4096).unwrap();
    for event in &events {
        page.append(&framed.encode(event).unwrap(), false).unwrap();
    }

    let mut offset = 0;
    for expected in &events {
        let (event, len) = framed.read(&page, offset).unwrap();
        assert_eq!(&event, expected);
        assert_eq!(len, framed.frame_len(expected).unwrap());
        offset += len;
    }
    assert_eq!(offset, page.len());
}

#[test]
fn test_checksum_mismatch_detected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("0");
    let framed = Framed::new(RawCodec);

    let mut bytes = framed.encode(&b"payload".to_vec()).unwrap();
    bytes[FRAME_HEADER_LEN + 2] ^= 0xff;
    fs::write(&path, &bytes).unwrap();

    let page = Page::open_read_only(&path, 0u64).unwrap();
    assert_eq!(corruption_reason(framed.read(&page, 0)), "checksum mismatch");
}

#[test]
fn test_truncated_header_detected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("0");
    let framed = Framed::new(RawCodec);

    let bytes = framed.encode(&b"payload".to_vec()).unwrap();
    fs::write(&path, &bytes[..5]).unwrap();

    let page = Page::open_read_only(&path, 0u64).unwrap();
    assert_eq!(corruption_reason(framed.read(&page, 0)), "truncated header");
}

#[test]
fn test_truncated_payload_detected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("0");
    let framed = Framed::new(RawCodec);

    let bytes = framed.encode(&b"payload".to_vec()).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 1]).unwrap();

    let page = Page::open(&path, 0u64, 4096).unwrap();
    assert_eq!(corruption_reason(framed.read(&page, 0)), "truncated payload");
    assert!(framed.check(&page, 0).unwrap_err().is_corruption());
}

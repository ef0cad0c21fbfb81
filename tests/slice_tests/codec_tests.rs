//! Tests for the slice codec
//!
//! These tests verify:
//! - Encoded slices decode to identical tries
//! - Header fields (magic, format version, counts)
//! - Truncated, bit-flipped and malformed input is rejected as CorruptSlice

use slicedict::slice::{decode, encode};
use slicedict::{DictError, DictSlice};

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_slice() -> DictSlice {
    DictSlice::from_entries(
        ["car", "card", "care", "cart", "dog", "", "do"]
            .iter()
            .enumerate()
            .map(|(i, v)| (v.as_bytes(), (i as u32) * 3)),
    )
}

fn assert_corrupt(bytes: &[u8]) {
    match decode(bytes) {
        Err(DictError::CorruptSlice(_)) => {}
        other => panic!("expected CorruptSlice, got {:?}", other),
    }
}

/// Recompute the footer CRC after tampering with the body
fn refresh_crc(bytes: &mut Vec<u8>) {
    let body_end = bytes.len() - 4;
    let crc = crc32fast::hash(&bytes[14..body_end]);
    bytes[body_end..].copy_from_slice(&crc.to_le_bytes());
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_round_trip_preserves_trie() {
    let slice = sample_slice();

    let decoded = decode(&encode(&slice)).unwrap();

    assert_eq!(decoded, slice);
    assert_eq!(decoded.entries(), slice.entries());
    assert_eq!(decoded.node_count(), slice.node_count());
}

#[test]
fn test_round_trip_empty_slice() {
    let slice = DictSlice::new();

    let decoded = decode(&encode(&slice)).unwrap();

    assert!(decoded.is_empty());
    assert_eq!(decoded, slice);
}

#[test]
fn test_decoded_slice_accepts_inserts() {
    let mut decoded = decode(&encode(&sample_slice())).unwrap();

    assert_eq!(decoded.insert(b"cat", 100), None);
    assert_eq!(decoded.get_id(b"cat"), Some(100));
    assert_eq!(decoded.get_id(b"card"), Some(3));
}

#[test]
fn test_header_layout() {
    let slice = sample_slice();
    let bytes = encode(&slice);

    assert_eq!(&bytes[0..4], b"GDSL");
    assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 1);
    assert_eq!(
        u32::from_le_bytes(bytes[6..10].try_into().unwrap()) as usize,
        slice.node_count()
    );
    assert_eq!(
        u32::from_le_bytes(bytes[10..14].try_into().unwrap()) as usize,
        slice.entry_count()
    );
}

#[test]
fn test_encoding_is_deterministic() {
    let a = DictSlice::from_entries(vec![(b"x".to_vec(), 1u32), (b"y".to_vec(), 2)]);
    let b = DictSlice::from_entries(vec![(b"y".to_vec(), 2u32), (b"x".to_vec(), 1)]);

    assert_eq!(encode(&a), encode(&b));
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_rejects_empty_input() {
    assert_corrupt(&[]);
}

#[test]
fn test_rejects_every_truncation() {
    let bytes = encode(&sample_slice());

    for len in 0..bytes.len() {
        assert_corrupt(&bytes[..len]);
    }
}

#[test]
fn test_rejects_bad_magic() {
    let mut bytes = encode(&sample_slice());
    bytes[0] = b'X';

    assert_corrupt(&bytes);
}

#[test]
fn test_rejects_unknown_format_version() {
    let mut bytes = encode(&sample_slice());
    bytes[4] = 9;

    assert_corrupt(&bytes);
}

#[test]
fn test_rejects_flipped_body_bit() {
    let mut bytes = encode(&sample_slice());
    bytes[20] ^= 0x40;

    assert_corrupt(&bytes);
}

#[test]
fn test_rejects_trailing_bytes() {
    let mut bytes = encode(&sample_slice());
    // Append garbage inside the checksummed body
    let footer = bytes.split_off(bytes.len() - 4);
    bytes.extend_from_slice(&[0u8; 9]);
    bytes.extend_from_slice(&footer);
    refresh_crc(&mut bytes);

    assert_corrupt(&bytes);
}

#[test]
fn test_rejects_wrong_node_count() {
    let mut bytes = encode(&sample_slice());
    let declared = u32::from_le_bytes(bytes[6..10].try_into().unwrap());
    bytes[6..10].copy_from_slice(&(declared - 1).to_le_bytes());

    assert_corrupt(&bytes);
}

#[test]
fn test_rejects_wrong_entry_count() {
    let mut bytes = encode(&sample_slice());
    let declared = u32::from_le_bytes(bytes[10..14].try_into().unwrap());
    bytes[10..14].copy_from_slice(&(declared + 1).to_le_bytes());

    assert_corrupt(&bytes);
}

#[test]
fn test_rejects_oversized_child_count() {
    // Root with an empty label, no id, claiming 1000 children
    let mut body = Vec::new();
    body.extend_from_slice(&0u32.to_le_bytes());
    body.push(0);
    body.extend_from_slice(&1000u32.to_le_bytes());

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"GDSL");
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&body);
    bytes.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());

    assert_corrupt(&bytes);
}

#[test]
fn test_rejects_duplicate_ids() {
    let slice = DictSlice::from_entries(vec![(b"a".to_vec(), 1u32), (b"b".to_vec(), 2)]);
    let mut bytes = encode(&slice);

    // Pre-order: root(9 bytes) then "a": len(4) label(1) flags(1) id(4)
    let id_of_a = 14 + 9 + 4 + 1 + 1;
    // "b" follows "a": a's id(4) + child count(4), then len(4) label(1) flags(1)
    let id_of_b = id_of_a + 4 + 4 + 4 + 1 + 1;
    assert_eq!(u32::from_le_bytes(bytes[id_of_a..id_of_a + 4].try_into().unwrap()), 1);
    assert_eq!(u32::from_le_bytes(bytes[id_of_b..id_of_b + 4].try_into().unwrap()), 2);

    bytes[id_of_b..id_of_b + 4].copy_from_slice(&1u32.to_le_bytes());
    refresh_crc(&mut bytes);

    assert_corrupt(&bytes);
}

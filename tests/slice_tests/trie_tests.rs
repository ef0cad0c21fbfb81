//! Tests for the slice trie
//!
//! These tests verify:
//! - Insert and lookup, including edge splits on shared prefixes
//! - First-assigned ID wins on duplicate inserts
//! - Reverse lookup (ID → value), by walk and by parent links
//! - Sorted entry iteration and min/max values
//! - Structural equality independent of arena layout

use slicedict::DictSlice;

// =============================================================================
// Helper Functions
// =============================================================================

fn slice_of(values: &[&str]) -> DictSlice {
    DictSlice::from_entries(values.iter().enumerate().map(|(i, v)| (v.as_bytes(), i as u32)))
}

// =============================================================================
// Insert / Lookup Tests
// =============================================================================

#[test]
fn test_new_slice_is_empty() {
    let slice = DictSlice::new();

    assert!(slice.is_empty());
    assert_eq!(slice.entry_count(), 0);
    assert_eq!(slice.node_count(), 1);
    assert_eq!(slice.get_id(b"anything"), None);
}

#[test]
fn test_insert_and_get() {
    let mut slice = DictSlice::new();

    assert_eq!(slice.insert(b"apple", 7), None);
    assert_eq!(slice.get_id(b"apple"), Some(7));
    assert_eq!(slice.entry_count(), 1);
}

#[test]
fn test_shared_prefixes_split_edges() {
    let slice = slice_of(&["apple", "apply", "app", "banana"]);

    assert_eq!(slice.get_id(b"apple"), Some(0));
    assert_eq!(slice.get_id(b"apply"), Some(1));
    assert_eq!(slice.get_id(b"app"), Some(2));
    assert_eq!(slice.get_id(b"banana"), Some(3));

    // Prefixes that were never inserted are not values
    assert_eq!(slice.get_id(b"ap"), None);
    assert_eq!(slice.get_id(b"appl"), None);
    assert_eq!(slice.get_id(b"applesauce"), None);
    assert_eq!(slice.entry_count(), 4);
}

#[test]
fn test_duplicate_insert_keeps_first_id() {
    let mut slice = DictSlice::new();
    slice.insert(b"k", 1);

    assert_eq!(slice.insert(b"k", 99), Some(1));
    assert_eq!(slice.get_id(b"k"), Some(1));
    assert_eq!(slice.entry_count(), 1);
}

#[test]
fn test_empty_value_is_storable() {
    let mut slice = DictSlice::new();
    slice.insert(b"", 5);
    slice.insert(b"a", 6);

    assert_eq!(slice.get_id(b""), Some(5));
    assert_eq!(slice.get_id(b"a"), Some(6));
}

#[test]
fn test_binary_values() {
    let mut slice = DictSlice::new();
    slice.insert(&[0x00, 0xff], 1);
    slice.insert(&[0x00], 2);
    slice.insert(&[0xff, 0x00], 3);

    assert_eq!(slice.get_id(&[0x00, 0xff]), Some(1));
    assert_eq!(slice.get_id(&[0x00]), Some(2));
    assert_eq!(slice.get_id(&[0xff, 0x00]), Some(3));
    assert_eq!(slice.get_id(&[0xff]), None);
}

// =============================================================================
// Reverse Lookup / Iteration Tests
// =============================================================================

#[test]
fn test_value_of() {
    let slice = slice_of(&["x", "xy", "xyz"]);

    assert_eq!(slice.value_of(0), Some(b"x".to_vec()));
    assert_eq!(slice.value_of(2), Some(b"xyz".to_vec()));
    assert_eq!(slice.value_of(42), None);
}

#[test]
fn test_value_at_follows_parent_links() {
    let values = ["", "app", "apple", "apply", "banana", "band", "b"];
    let slice = slice_of(&values);
    let parents = slice.parent_links();

    let mut seen = 0;
    for (id, node) in slice.terminals() {
        assert_eq!(slice.value_at(node, &parents), slice.value_of(id));
        assert_eq!(slice.value_at(node, &parents), Some(values[id as usize].as_bytes().to_vec()));
        seen += 1;
    }
    assert_eq!(seen, values.len());
}

#[test]
fn test_value_at_rejects_foreign_links() {
    let slice = slice_of(&["abc", "abd"]);

    assert_eq!(slice.value_at(1, &[]), None);
    assert_eq!(slice.value_at(99, &slice.parent_links()), None);
}

#[test]
fn test_entries_sorted_by_value() {
    let slice = slice_of(&["pear", "apple", "peach", "app", "zebra"]);

    let values: Vec<Vec<u8>> = slice.entries().into_iter().map(|(v, _)| v).collect();
    let expected: Vec<Vec<u8>> = ["app", "apple", "peach", "pear", "zebra"]
        .iter()
        .map(|s| s.as_bytes().to_vec())
        .collect();

    assert_eq!(values, expected);
}

#[test]
fn test_min_max_value() {
    let slice = slice_of(&["m", "ma", "b", "zz", "z"]);

    assert_eq!(slice.min_value(), Some(b"b".to_vec()));
    assert_eq!(slice.max_value(), Some(b"zz".to_vec()));
    assert_eq!(DictSlice::new().min_value(), None);
    assert_eq!(DictSlice::new().max_value(), None);
}

#[test]
fn test_max_id() {
    let slice = DictSlice::from_entries(vec![(b"a".to_vec(), 3u32), (b"b".to_vec(), 11)]);

    assert_eq!(slice.max_id(), Some(11));
    assert_eq!(DictSlice::new().max_id(), None);
}

// =============================================================================
// Equality Tests
// =============================================================================

#[test]
fn test_equality_ignores_insertion_order() {
    let a = DictSlice::from_entries(vec![(b"ab".to_vec(), 1u32), (b"ac".to_vec(), 2), (b"b".to_vec(), 3)]);
    let b = DictSlice::from_entries(vec![(b"b".to_vec(), 3u32), (b"ac".to_vec(), 2), (b"ab".to_vec(), 1)]);

    assert_eq!(a, b);
}

#[test]
fn test_equality_detects_id_difference() {
    let a = DictSlice::from_entries(vec![(b"ab".to_vec(), 1u32)]);
    let b = DictSlice::from_entries(vec![(b"ab".to_vec(), 2u32)]);

    assert_ne!(a, b);
}

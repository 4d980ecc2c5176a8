#![cfg(feature = "serde")]

use patricia_store::{PatriciaMap, PatriciaSet};

fn bits(s: &str) -> u16 {
    (s.len() * 8) as u16
}

#[test]
fn map_round_trips_through_json() {
    let mut map = PatriciaMap::new();
    for (i, word) in ["alpha", "alpine", "al", "beta", "bet", "z", "zero"]
        .iter()
        .enumerate()
    {
        map.insert(word.as_bytes(), bits(word), i as u64).unwrap();
    }

    let json = serde_json::to_string(&map).unwrap();
    let back: PatriciaMap<u64> = serde_json::from_str(&json).unwrap();
    back.check_invariants();

    assert_eq!(back.len(), map.len());
    for node in map.iter() {
        let found = back
            .exact_match(map.key(node), map.key_bits(node))
            .expect("key lost in the round trip");
        assert_eq!(back.payload(found), map.payload(node));
    }
}

#[test]
fn set_round_trips_through_json() {
    let mut set = PatriciaSet::new();
    for word in ["a", "b", "ab"] {
        set.insert(word.as_bytes(), bits(word)).unwrap();
    }

    let json = serde_json::to_string(&set).unwrap();
    let back: PatriciaSet = serde_json::from_str(&json).unwrap();
    back.check_invariants();

    assert_eq!(back.len(), 3);
    for word in ["a", "b", "ab"] {
        assert!(back.contains(word.as_bytes(), bits(word)));
    }
}

#[test]
fn empty_tree_serializes_to_an_empty_sequence() {
    let map: PatriciaMap<u8> = PatriciaMap::new();
    let json = serde_json::to_string(&map).unwrap();
    assert_eq!(json, "[]");
    let back: PatriciaMap<u8> = serde_json::from_str(&json).unwrap();
    assert!(back.is_empty());
}

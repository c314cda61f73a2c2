//! Property tests for codec round-trips and canonical encoding.

use proptest::prelude::*;
use smerkle::object::codec::{
    decode_blob, decode_index, decode_tree, encode_blob, encode_index, encode_tree,
};
use smerkle::object::{Blob, Entry, Hash, Index, IndexEntry, Mode, Tree};
use std::time::{Duration, UNIX_EPOCH};

fn mode_strategy() -> impl Strategy<Value = Mode> {
    (0u8..4).prop_map(|b| Mode::from_byte(b).unwrap())
}

fn entry_strategy() -> impl Strategy<Value = Entry> {
    (
        "[a-zA-Z0-9._\\-]{1,24}",
        mode_strategy(),
        any::<i64>(),
        any::<[u8; 32]>(),
    )
        .prop_map(|(name, mode, size, hash)| Entry {
            name,
            mode,
            size,
            mtime: None,
            hash: Hash::from_bytes(hash),
        })
}

fn index_entry_strategy() -> impl Strategy<Value = IndexEntry> {
    (
        "[a-z0-9._\\-/]{1,40}",
        any::<i64>(),
        0i64..2_000_000_000,
        0u32..1_000_000_000,
        any::<[u8; 32]>(),
    )
        .prop_map(|(path, size, secs, nanos, hash)| IndexEntry {
            path,
            size,
            mtime: UNIX_EPOCH + Duration::new(secs as u64, nanos),
            hash: Hash::from_bytes(hash),
        })
}

proptest! {
    #[test]
    fn blob_round_trips(content in prop::collection::vec(any::<u8>(), 0..2048)) {
        let blob = Blob::new(content);
        let decoded = decode_blob(&encode_blob(&blob).unwrap()).unwrap();
        prop_assert_eq!(decoded, blob);
    }

    #[test]
    fn tree_round_trips(entries in prop::collection::vec(entry_strategy(), 0..32)) {
        let tree = Tree::new(entries);
        let decoded = decode_tree(&encode_tree(&tree).unwrap()).unwrap();
        prop_assert_eq!(decoded, tree);
    }

    #[test]
    fn index_round_trips(entries in prop::collection::vec(index_entry_strategy(), 0..32)) {
        let index = Index { entries };
        let decoded = decode_index(&encode_index(&index).unwrap()).unwrap();
        prop_assert_eq!(decoded, index);
    }

    #[test]
    fn tree_encoding_is_canonical(entries in prop::collection::vec(entry_strategy(), 0..32)) {
        let tree = Tree::new(entries);
        let first = encode_tree(&tree).unwrap();
        let second = encode_tree(&tree).unwrap();
        prop_assert_eq!(&first, &second);
        // Tree identity is the hash of the encoded bytes, so canonical
        // encoding implies stable identity.
        prop_assert_eq!(Hash::of(&first), Hash::of(&second));
    }

    #[test]
    fn truncated_tree_never_decodes(entries in prop::collection::vec(entry_strategy(), 1..8)) {
        let tree = Tree::new(entries);
        let encoded = encode_tree(&tree).unwrap();
        for cut in 0..encoded.len() {
            prop_assert!(decode_tree(&encoded[..cut]).is_err());
        }
    }
}

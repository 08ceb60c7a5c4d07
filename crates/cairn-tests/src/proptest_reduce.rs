//! Property-based tests for the reduction core's public API

use cairn_reduce::{apply_delta, create_delta, ContentChunker, DedupStore, VersionStore};
use proptest::prelude::*;

fn arb_data(max_size: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..max_size)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_chunks_cover_input(data in arb_data(30_000), min in 64usize..1024, spread in 0usize..4096) {
        let max = min + spread;
        let chunks = ContentChunker::new(min, max).split(&data);
        let mut offset = 0;
        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.offset, offset);
            prop_assert!(chunk.size <= max);
            if i + 1 < chunks.len() {
                prop_assert!(chunk.size >= min);
            }
            prop_assert_eq!(&data[offset..offset + chunk.size], chunk.data.as_ref());
            offset += chunk.size;
        }
        prop_assert_eq!(offset, data.len());
    }

    #[test]
    fn prop_delta_round_trip(original in arb_data(8192), modified in arb_data(8192)) {
        let delta = create_delta(&original, &modified);
        prop_assert_eq!(apply_delta(&original, &delta).unwrap(), modified);
    }

    #[test]
    fn prop_delta_of_small_edit_round_trips(
        original in arb_data(8192),
        edits in prop::collection::vec((any::<prop::sample::Index>(), any::<u8>()), 0..8),
    ) {
        let mut modified = original.clone();
        if !modified.is_empty() {
            for (idx, byte) in edits {
                let i = idx.index(modified.len());
                modified[i] = byte;
            }
        }
        let delta = create_delta(&original, &modified);
        prop_assert_eq!(apply_delta(&original, &delta).unwrap(), modified);
    }

    #[test]
    fn prop_every_version_retrievable(versions in prop::collection::vec(arb_data(2048), 1..8)) {
        let store = VersionStore::new();
        let mut ids = vec![store.store("f", &versions[0])];
        for v in &versions[1..] {
            ids.push(store.update("f", v).unwrap());
        }
        for (id, expected) in ids.iter().zip(&versions) {
            prop_assert_eq!(&store.get_version("f", id).unwrap(), expected);
        }
        let raw: usize = versions.iter().map(Vec::len).sum();
        prop_assert!(store.total_size() <= raw as u64);
    }

    #[test]
    fn prop_dedup_identity(data in arb_data(4096), names in prop::collection::hash_set("[a-z]{1,8}", 1..6)) {
        let store = DedupStore::new();
        let refs: Vec<_> = names.iter().map(|n| store.store(n, &data)).collect();
        prop_assert_eq!(store.unique_blocks(), 1);
        for r in &refs {
            prop_assert_eq!(r.block_hash, refs[0].block_hash);
            let got = store.get(&r.filename).unwrap();
            prop_assert_eq!(got.as_ref(), data.as_slice());
        }
    }
}

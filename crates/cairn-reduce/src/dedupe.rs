//! Content-addressable deduplication.
//!
//! [`Deduplicator`] only tracks which hashes have been seen. [`DedupStore`]
//! keeps one payload per distinct SHA-256 and points each filename at the
//! block holding its latest content. An existing hash entry is never compared
//! byte-for-byte against new data: the first writer wins and a SHA-256
//! collision is assumed not to happen.

use crate::error::{ReduceError, Result};
use crate::fingerprint::{sha256, ContentHash};
use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Membership tracker for content hashes. Holds no payloads.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: RwLock<HashSet<ContentHash>>,
}

impl Deduplicator {
    /// Create an empty deduplicator
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash `data` and mark it seen. Returns the hash and whether it was new.
    pub fn check_block(&self, data: &[u8]) -> (ContentHash, bool) {
        let hash = sha256(data);
        let is_new = self.seen.write().insert(hash);
        if !is_new {
            debug!(hash = %hash, "duplicate block");
        }
        (hash, is_new)
    }

    /// True if this hash has been seen
    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.seen.read().contains(hash)
    }

    /// Number of distinct hashes seen
    pub fn len(&self) -> usize {
        self.seen.read().len()
    }

    /// Has nothing been seen yet?
    pub fn is_empty(&self) -> bool {
        self.seen.read().is_empty()
    }
}

/// Link from a logical filename to the content-addressed block holding its bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    /// Logical filename
    pub filename: String,
    /// SHA-256 of the referenced block
    pub block_hash: ContentHash,
    /// Block size in bytes
    pub size: usize,
}

/// Point-in-time aggregate of a [`DedupStore`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DedupStats {
    /// Distinct blocks held
    pub unique_blocks: usize,
    /// Filenames pointing at a block
    pub references: usize,
    /// Bytes held across all distinct blocks
    pub stored_bytes: u64,
    /// references / unique_blocks (1.0 when empty)
    pub dedup_ratio: f64,
}

#[derive(Debug, Default)]
struct DedupState {
    blocks: HashMap<ContentHash, Bytes>,
    references: HashMap<String, ContentHash>,
}

/// Content-addressed block store with per-filename references
#[derive(Debug, Default)]
pub struct DedupStore {
    state: RwLock<DedupState>,
}

impl DedupStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under `filename`.
    /// The block is inserted only if its hash is absent; the filename always
    /// points at the new hash afterwards, replacing any earlier mapping.
    pub fn store(&self, filename: &str, data: &[u8]) -> BlockRef {
        self.store_checked(filename, data).0
    }

    /// Like [`DedupStore::store`], also reporting whether a new block was inserted.
    pub fn store_checked(&self, filename: &str, data: &[u8]) -> (BlockRef, bool) {
        let hash = sha256(data);
        let mut state = self.state.write();
        let is_new = !state.blocks.contains_key(&hash);
        if is_new {
            state.blocks.insert(hash, Bytes::copy_from_slice(data));
            debug!(filename, hash = %hash, size = data.len(), "stored new block");
        } else {
            debug!(filename, hash = %hash, "dedup hit");
        }
        state.references.insert(filename.to_string(), hash);
        let block_ref = BlockRef {
            filename: filename.to_string(),
            block_hash: hash,
            size: data.len(),
        };
        (block_ref, is_new)
    }

    /// Fetch the latest content stored under `filename`.
    pub fn get(&self, filename: &str) -> Result<Bytes> {
        let state = self.state.read();
        let hash = state
            .references
            .get(filename)
            .ok_or_else(|| ReduceError::FileNotFound(filename.to_string()))?;
        state
            .blocks
            .get(hash)
            .cloned()
            .ok_or_else(|| ReduceError::BlockNotFound(hash.to_hex()))
    }

    /// Current reference for `filename`, if any
    pub fn block_ref(&self, filename: &str) -> Option<BlockRef> {
        let state = self.state.read();
        let hash = state.references.get(filename)?;
        let size = state.blocks.get(hash).map(|b| b.len()).unwrap_or(0);
        Some(BlockRef {
            filename: filename.to_string(),
            block_hash: *hash,
            size,
        })
    }

    /// True if `filename` has a reference
    pub fn contains_file(&self, filename: &str) -> bool {
        self.state.read().references.contains_key(filename)
    }

    /// Number of filenames currently pointing at `hash`
    pub fn refcount(&self, hash: &ContentHash) -> usize {
        self.state
            .read()
            .references
            .values()
            .filter(|h| *h == hash)
            .count()
    }

    /// Number of distinct blocks held
    pub fn unique_blocks(&self) -> usize {
        self.state.read().blocks.len()
    }

    /// Aggregate statistics
    pub fn stats(&self) -> DedupStats {
        let state = self.state.read();
        let unique_blocks = state.blocks.len();
        let references = state.references.len();
        let stored_bytes = state.blocks.values().map(|b| b.len() as u64).sum();
        let dedup_ratio = if unique_blocks > 0 {
            references as f64 / unique_blocks as f64
        } else {
            1.0
        };
        DedupStats {
            unique_blocks,
            references,
            stored_bytes,
            dedup_ratio,
        }
    }
}

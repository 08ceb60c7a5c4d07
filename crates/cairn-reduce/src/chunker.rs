//! Content-defined chunking with a multiplicative rolling hash.
//!
//! Boundaries are chosen by the data itself: after `min_size` bytes the
//! chunker feeds each byte into `hash = hash * 31 + byte` and cuts as soon as
//! `hash & boundary_mask == 0`, forcing a cut at `max_size`. The rolling hash
//! only selects boundaries; each emitted chunk is addressed by SHA-256.

use crate::fingerprint::{sha256, ContentHash};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Default boundary mask: roughly one cut per 512 probed bytes.
pub const DEFAULT_BOUNDARY_MASK: u32 = 0x1FF;

/// A content-defined chunk produced by [`ContentChunker::split`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk content (a zero-copy slice of the split buffer)
    pub data: Bytes,
    /// SHA-256 of the chunk content
    pub hash: ContentHash,
    /// Byte offset of this chunk in the original buffer
    pub offset: usize,
    /// Length of `data` in bytes
    pub size: usize,
}

/// Configuration for the content chunker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Minimum chunk size in bytes (the final chunk may be shorter)
    pub min_size: usize,
    /// Maximum chunk size in bytes
    pub max_size: usize,
    /// Rolling hash mask; a boundary is declared where `hash & mask == 0`
    #[serde(default = "default_mask")]
    pub boundary_mask: u32,
}

fn default_mask() -> u32 {
    DEFAULT_BOUNDARY_MASK
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_size: 2 * 1024,
            max_size: 64 * 1024,
            boundary_mask: DEFAULT_BOUNDARY_MASK,
        }
    }
}

/// Content-defined chunker
#[derive(Debug, Clone)]
pub struct ContentChunker {
    config: ChunkerConfig,
}

impl Default for ContentChunker {
    fn default() -> Self {
        Self::with_config(ChunkerConfig::default())
    }
}

impl ContentChunker {
    /// Create a chunker with the given size bounds and the default mask.
    pub fn new(min_size: usize, max_size: usize) -> Self {
        Self::with_config(ChunkerConfig {
            min_size,
            max_size,
            boundary_mask: DEFAULT_BOUNDARY_MASK,
        })
    }

    /// Create a chunker with custom configuration.
    /// `max_size` is raised to at least `max(min_size, 1)` so every cut makes progress.
    pub fn with_config(mut config: ChunkerConfig) -> Self {
        config.max_size = config.max_size.max(config.min_size).max(1);
        Self { config }
    }

    /// Effective configuration
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split data into content-defined chunks.
    /// Concatenating all `chunk.data` reproduces `data`; empty input yields no chunks.
    pub fn split(&self, data: &[u8]) -> Vec<Chunk> {
        if data.is_empty() {
            return Vec::new();
        }
        let buf = Bytes::copy_from_slice(data);
        let mut chunks = Vec::with_capacity(data.len() / self.config.max_size + 1);
        let mut start = 0;

        while start < buf.len() {
            let end = self.next_boundary(&buf, start);
            let slice = buf.slice(start..end);
            chunks.push(Chunk {
                hash: sha256(&slice),
                offset: start,
                size: end - start,
                data: slice,
            });
            start = end;
        }

        trace!(input = data.len(), chunks = chunks.len(), "split complete");
        chunks
    }

    /// Exclusive end offset of the chunk beginning at `start`.
    fn next_boundary(&self, data: &[u8], start: usize) -> usize {
        let remaining = data.len() - start;
        if remaining <= self.config.min_size {
            return data.len();
        }

        let limit = (start + self.config.max_size).min(data.len());
        let mut hash: u32 = 0;
        for (i, &byte) in data
            .iter()
            .enumerate()
            .take(limit)
            .skip(start + self.config.min_size)
        {
            hash = hash.wrapping_mul(31).wrapping_add(byte as u32);
            if hash & self.config.boundary_mask == 0 {
                return i + 1;
            }
        }
        limit
    }
}

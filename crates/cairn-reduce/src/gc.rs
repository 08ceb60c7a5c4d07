//! Block garbage collection: orphan detection and TTL reclamation.
//!
//! Orphan status (no file references the block) and expiry (older than the
//! TTL) are reported independently. Only expiry triggers reclamation; a
//! cleanup also prunes the reclaimed ids from every file's reference list.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, instrument};

/// Configuration for the garbage collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcConfig {
    /// Age after which a block is reclaimed regardless of references.
    #[serde(with = "crate::config::duration_secs")]
    pub ttl: Duration,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

/// A tracked storage block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block identifier
    pub id: String,
    /// Size in bytes
    pub size: u64,
    /// Registration time
    pub created_at: SystemTime,
}

/// Point-in-time block accounting. Computing it does not change any state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcStats {
    /// Blocks tracked
    pub total_blocks: usize,
    /// Bytes tracked
    pub total_bytes: u64,
    /// Blocks no file references
    pub orphaned_blocks: usize,
    /// Bytes held by orphaned blocks
    pub orphaned_bytes: u64,
    /// Blocks older than the TTL
    pub expired_blocks: usize,
    /// Bytes held by expired blocks
    pub expired_bytes: u64,
}

#[derive(Debug, Default)]
struct GcState {
    blocks: HashMap<String, Block>,
    references: HashMap<String, Vec<String>>,
}

impl GcState {
    fn referenced(&self) -> HashSet<&str> {
        self.references
            .values()
            .flat_map(|ids| ids.iter().map(String::as_str))
            .collect()
    }

    fn is_expired(block: &Block, now: SystemTime, ttl: Duration) -> bool {
        now.duration_since(block.created_at)
            .map(|age| age > ttl)
            .unwrap_or(false)
    }
}

/// Reference-tracking garbage collector.
#[derive(Debug, Default)]
pub struct GarbageCollector {
    config: GcConfig,
    state: RwLock<GcState>,
}

impl GarbageCollector {
    /// Create a collector with the default 7 day TTL.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collector with the given configuration.
    pub fn with_config(config: GcConfig) -> Self {
        Self {
            config,
            state: RwLock::new(GcState::default()),
        }
    }

    /// Configured TTL
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Register a block created now.
    pub fn add_block(&self, id: &str, size: u64) {
        self.add_block_with_time(id, size, SystemTime::now());
    }

    /// Register a block with an explicit creation time. Re-registering an id replaces it.
    pub fn add_block_with_time(&self, id: &str, size: u64, created_at: SystemTime) {
        self.state.write().blocks.insert(
            id.to_string(),
            Block {
                id: id.to_string(),
                size,
                created_at,
            },
        );
        debug!(block = id, size, "block registered");
    }

    /// Record that `file_id` references `block_id`.
    pub fn add_reference(&self, file_id: &str, block_id: &str) {
        self.state
            .write()
            .references
            .entry(file_id.to_string())
            .or_default()
            .push(block_id.to_string());
    }

    /// Drop every reference from `file_id` to `block_id`. Returns false if there was none.
    pub fn remove_reference(&self, file_id: &str, block_id: &str) -> bool {
        let mut state = self.state.write();
        let Some(ids) = state.references.get_mut(file_id) else {
            return false;
        };
        let before = ids.len();
        ids.retain(|id| id != block_id);
        let removed = ids.len() != before;
        if ids.is_empty() {
            state.references.remove(file_id);
        }
        removed
    }

    /// Block ids referenced by `file_id`
    pub fn references(&self, file_id: &str) -> Vec<String> {
        self.state
            .read()
            .references
            .get(file_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Tracked block by id
    pub fn block(&self, id: &str) -> Option<Block> {
        self.state.read().blocks.get(id).cloned()
    }

    /// Ids of blocks that no file references, sorted.
    pub fn find_orphaned(&self) -> Vec<String> {
        let state = self.state.read();
        let referenced = state.referenced();
        let mut out: Vec<String> = state
            .blocks
            .keys()
            .filter(|id| !referenced.contains(id.as_str()))
            .cloned()
            .collect();
        out.sort();
        out
    }

    /// Ids of blocks older than the TTL, sorted.
    pub fn find_expired(&self) -> Vec<String> {
        self.find_expired_at(SystemTime::now())
    }

    /// Ids of blocks older than the TTL as of `now`, sorted.
    pub fn find_expired_at(&self, now: SystemTime) -> Vec<String> {
        let state = self.state.read();
        let mut out: Vec<String> = state
            .blocks
            .values()
            .filter(|b| GcState::is_expired(b, now, self.config.ttl))
            .map(|b| b.id.clone())
            .collect();
        out.sort();
        out
    }

    /// Reclaim every expired block. Returns the bytes reclaimed.
    pub fn cleanup(&self) -> u64 {
        self.cleanup_at(SystemTime::now())
    }

    /// Reclaim every block expired as of `now`. Returns the bytes reclaimed.
    /// Reclaimed ids are pruned from all reference lists; files left with no
    /// references are forgotten.
    #[instrument(skip(self))]
    pub fn cleanup_at(&self, now: SystemTime) -> u64 {
        let mut state = self.state.write();
        let ttl = self.config.ttl;
        let expired: Vec<String> = state
            .blocks
            .values()
            .filter(|b| GcState::is_expired(b, now, ttl))
            .map(|b| b.id.clone())
            .collect();
        if expired.is_empty() {
            return 0;
        }

        let mut reclaimed = 0u64;
        for id in &expired {
            if let Some(block) = state.blocks.remove(id) {
                reclaimed += block.size;
            }
        }

        let gone: HashSet<&str> = expired.iter().map(String::as_str).collect();
        state.references.retain(|_, ids| {
            ids.retain(|id| !gone.contains(id.as_str()));
            !ids.is_empty()
        });

        info!(blocks = expired.len(), bytes = reclaimed, "gc cleanup reclaimed blocks");
        reclaimed
    }

    /// Current accounting.
    pub fn stats(&self) -> GcStats {
        self.stats_at(SystemTime::now())
    }

    /// Accounting as of `now`.
    pub fn stats_at(&self, now: SystemTime) -> GcStats {
        let state = self.state.read();
        let referenced = state.referenced();
        let mut stats = GcStats::default();
        for block in state.blocks.values() {
            stats.total_blocks += 1;
            stats.total_bytes += block.size;
            if !referenced.contains(block.id.as_str()) {
                stats.orphaned_blocks += 1;
                stats.orphaned_bytes += block.size;
            }
            if GcState::is_expired(block, now, self.config.ttl) {
                stats.expired_blocks += 1;
                stats.expired_bytes += block.size;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    #[test]
    fn orphan_until_referenced() {
        let gc = GarbageCollector::new();
        gc.add_block("b3", 100);
        assert!(gc.find_orphaned().contains(&"b3".to_string()));
        gc.add_reference("f1", "b3");
        assert!(!gc.find_orphaned().contains(&"b3".to_string()));
    }

    #[test]
    fn referenced_old_block_is_expired_not_orphaned() {
        let gc = GarbageCollector::new();
        let now = SystemTime::now();
        gc.add_block_with_time("old", 10, now - DAY * 8);
        gc.add_reference("f", "old");
        assert!(gc.find_orphaned().is_empty());
        assert_eq!(gc.find_expired_at(now), vec!["old".to_string()]);
    }

    #[test]
    fn fresh_orphan_is_not_reclaimed() {
        let gc = GarbageCollector::new();
        gc.add_block("fresh", 50);
        assert_eq!(gc.cleanup(), 0);
        assert!(gc.block("fresh").is_some());
        assert_eq!(gc.find_orphaned(), vec!["fresh".to_string()]);
    }

    #[test]
    fn cleanup_reclaims_expired_and_prunes_references() {
        let gc = GarbageCollector::new();
        let now = SystemTime::now();
        gc.add_block_with_time("a", 100, now - DAY * 10);
        gc.add_block_with_time("b", 250, now - DAY * 9);
        gc.add_block_with_time("c", 7, now - DAY);
        gc.add_reference("f1", "a");
        gc.add_reference("f2", "a");
        gc.add_reference("f2", "c");

        assert_eq!(gc.cleanup_at(now), 350);
        assert!(gc.block("a").is_none());
        assert!(gc.block("b").is_none());
        assert!(gc.block("c").is_some());
        assert!(gc.references("f1").is_empty());
        assert_eq!(gc.references("f2"), vec!["c".to_string()]);

        let stats = gc.stats_at(now);
        assert_eq!(stats.total_blocks, 1);
        assert_eq!(stats.expired_blocks, 0);
    }

    #[test]
    fn custom_ttl_boundary() {
        let gc = GarbageCollector::with_config(GcConfig {
            ttl: Duration::from_secs(60),
        });
        let now = SystemTime::now();
        gc.add_block_with_time("edge", 1, now - Duration::from_secs(60));
        gc.add_block_with_time("past", 1, now - Duration::from_secs(61));
        gc.add_block_with_time("future", 1, now + Duration::from_secs(600));
        assert_eq!(gc.find_expired_at(now), vec!["past".to_string()]);
    }

    #[test]
    fn stats_do_not_mutate() {
        let gc = GarbageCollector::new();
        let now = SystemTime::now();
        gc.add_block_with_time("x", 5, now - DAY * 30);
        gc.add_block("y", 3);
        gc.add_reference("f", "y");
        let stats = gc.stats_at(now);
        assert_eq!(
            stats,
            GcStats {
                total_blocks: 2,
                total_bytes: 8,
                orphaned_blocks: 1,
                orphaned_bytes: 5,
                expired_blocks: 1,
                expired_bytes: 5,
            }
        );
        assert_eq!(gc.stats_at(now), stats);
        assert!(gc.block("x").is_some());
    }

    #[test]
    fn remove_reference_drops_empty_file() {
        let gc = GarbageCollector::new();
        gc.add_block("b", 1);
        gc.add_reference("f", "b");
        assert!(gc.remove_reference("f", "b"));
        assert!(!gc.remove_reference("f", "b"));
        assert_eq!(gc.find_orphaned(), vec!["b".to_string()]);
    }
}

//! Ingest path: chunk → dedupe → version → place → register for GC.
//!
//! The components never call each other; this pipeline is the only place they
//! are composed. Each step takes and releases its own component's lock, so the
//! pipeline holds no lock across steps.

use crate::chunker::ContentChunker;
use crate::config::CoreConfig;
use crate::dedupe::{BlockRef, DedupStore};
use crate::error::{ReduceError, Result};
use crate::gc::GarbageCollector;
use crate::metrics::CoreMetrics;
use crate::tier_manager::TierManager;
use crate::version::VersionStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Outcome of ingesting one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResult {
    /// Tier manager object id
    pub object_id: String,
    /// Version id within the object's chain
    pub version_id: String,
    /// True if the version was stored as a delta
    pub is_delta: bool,
    /// One reference per chunk, in order
    pub chunks: Vec<BlockRef>,
    /// Chunks that were not already in the dedup store
    pub new_blocks: usize,
    /// Tier the object is held in
    pub tier: String,
}

/// Outcome of a maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    /// Bytes reclaimed by GC
    pub reclaimed_bytes: u64,
    /// Objects demoted by aging
    pub demoted: usize,
}

#[derive(Debug, Clone)]
struct ObjectEntry {
    object_id: String,
    chunk_count: usize,
}

/// Composition of every core component behind shared handles
pub struct IngestPipeline {
    chunker: ContentChunker,
    dedup: Arc<DedupStore>,
    versions: Arc<VersionStore>,
    tiers: Arc<TierManager>,
    gc: Arc<GarbageCollector>,
    metrics: Arc<CoreMetrics>,
    objects: RwLock<HashMap<String, ObjectEntry>>,
}

/// Dedup store key of chunk `index` of object `name`
pub fn chunk_key(name: &str, index: usize) -> String {
    format!("{}#{}", name, index)
}

impl IngestPipeline {
    /// Build every component from configuration and register the configured tiers.
    pub fn from_config(config: &CoreConfig) -> Result<Self> {
        config.validate()?;
        let tiers = TierManager::with_config(config.tier_manager.clone());
        for spec in &config.tiers {
            tiers.add_tier(&spec.name, spec.capacity);
        }
        Ok(Self {
            chunker: ContentChunker::with_config(config.chunker.clone()),
            dedup: Arc::new(DedupStore::new()),
            versions: Arc::new(VersionStore::new()),
            tiers: Arc::new(tiers),
            gc: Arc::new(GarbageCollector::with_config(config.gc.clone())),
            metrics: Arc::new(CoreMetrics::new()),
            objects: RwLock::new(HashMap::new()),
        })
    }

    /// Ingest a new object or a new version of an existing one.
    ///
    /// The version is recorded first; it is the only fallible step, so on
    /// error the dedup store and GC references are left untouched.
    /// An object keeps the tier placement of its first version. Concurrent
    /// ingests of the same name must be serialized by the caller.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub fn ingest(&self, name: &str, data: &[u8]) -> Result<IngestResult> {
        let version_id = if self.versions.latest(name).is_some() {
            self.versions.update(name, data)?
        } else {
            self.versions.store(name, data)
        };
        let is_delta = self
            .versions
            .latest(name)
            .is_some_and(|v| v.id == version_id && v.is_delta);
        self.metrics.record_version(is_delta);

        let chunks = self.chunker.split(data);
        self.metrics
            .record_ingest(data.len() as u64, chunks.len() as u64);

        let mut refs = Vec::with_capacity(chunks.len());
        let mut new_blocks = 0;
        for (index, chunk) in chunks.iter().enumerate() {
            let (block_ref, is_new) = self.dedup.store_checked(&chunk_key(name, index), &chunk.data);
            self.metrics.record_dedup(!is_new);
            if is_new {
                new_blocks += 1;
            }
            // A block reclaimed by an earlier cleanup is still in the dedup
            // store, so GC tracking is keyed on the collector's own state.
            let block_id = block_ref.block_hash.to_hex();
            if self.gc.block(&block_id).is_none() {
                self.gc.add_block(&block_id, block_ref.size as u64);
            }
            refs.push(block_ref);
        }

        for old in self.gc.references(name) {
            self.gc.remove_reference(name, &old);
        }
        for block_ref in &refs {
            self.gc.add_reference(name, &block_ref.block_hash.to_hex());
        }

        let existing = self.objects.read().get(name).map(|e| e.object_id.clone());
        let object_id = match existing {
            Some(id) => id,
            None => {
                let id = self.tiers.store(name, data);
                self.metrics.record_placement();
                id
            }
        };
        self.objects.write().insert(
            name.to_string(),
            ObjectEntry {
                object_id: object_id.clone(),
                chunk_count: refs.len(),
            },
        );
        let tier = self.tiers.get_file_tier(&object_id).unwrap_or_default();

        debug!(
            name,
            version = %version_id,
            is_delta,
            chunks = refs.len(),
            new_blocks,
            tier = %tier,
            "object ingested"
        );
        Ok(IngestResult {
            object_id,
            version_id,
            is_delta,
            chunks: refs,
            new_blocks,
            tier,
        })
    }

    fn object(&self, name: &str) -> Result<ObjectEntry> {
        self.objects
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ReduceError::FileNotFound(name.to_string()))
    }

    /// Latest content of `name`; counts as an access for tiering.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self.object(name)?;
        let content = self.versions.get_latest(name)?;
        self.tiers.record_access(&entry.object_id);
        Ok(content)
    }

    /// Content of a specific version of `name`; counts as an access for tiering.
    pub fn read_version(&self, name: &str, version_id: &str) -> Result<Vec<u8>> {
        let entry = self.object(name)?;
        let content = self.versions.get_version(name, version_id)?;
        self.tiers.record_access(&entry.object_id);
        Ok(content)
    }

    /// Latest content of `name` reassembled from its deduplicated chunks.
    pub fn read_chunks(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self.object(name)?;
        let mut out = Vec::new();
        for index in 0..entry.chunk_count {
            out.extend_from_slice(&self.dedup.get(&chunk_key(name, index))?);
        }
        Ok(out)
    }

    /// Run GC cleanup, then age tiers by `aging`.
    ///
    /// Reclaimed bytes are the collector's accounting; chunk payloads stay in
    /// the dedup store so objects keyed to them remain readable.
    pub fn maintain(&self, aging: Duration) -> MaintenanceReport {
        let reclaimed_bytes = self.gc.cleanup();
        self.metrics.record_gc_cycle(reclaimed_bytes);
        let demoted = self.tiers.simulate_aging(aging);
        self.metrics.record_demotions(demoted as u64);
        info!(reclaimed_bytes, demoted, "maintenance pass complete");
        MaintenanceReport {
            reclaimed_bytes,
            demoted,
        }
    }

    /// Shared dedup store
    pub fn dedup(&self) -> &Arc<DedupStore> {
        &self.dedup
    }

    /// Shared version store
    pub fn versions(&self) -> &Arc<VersionStore> {
        &self.versions
    }

    /// Shared tier manager
    pub fn tiers(&self) -> &Arc<TierManager> {
        &self.tiers
    }

    /// Shared garbage collector
    pub fn gc(&self) -> &Arc<GarbageCollector> {
        &self.gc
    }

    /// Shared counters
    pub fn metrics(&self) -> &Arc<CoreMetrics> {
        &self.metrics
    }
}

#![warn(missing_docs)]

//! Cairn storage-optimization core: content-defined chunking, SHA-256 dedupe,
//! delta version chains, hot/warm/cold tiering and block GC.
//!
//! Ingest path: Data → Chunk (rolling hash) → Fingerprint (SHA-256) → Dedupe → Version (XOR+gzip delta) → Place
//! Maintenance: GC cleanup (TTL) → Tier aging

pub mod chunker;
pub mod config;
pub mod dedupe;
pub mod delta;
pub mod error;
pub mod fingerprint;
pub mod gc;
pub mod ingest;
pub mod metrics;
pub mod tier_manager;
pub mod tiering;
pub mod version;

pub use chunker::{Chunk, ChunkerConfig, ContentChunker};
pub use config::{CoreConfig, TierSpec};
pub use dedupe::{BlockRef, DedupStats, DedupStore, Deduplicator};
pub use delta::{apply_delta, create_delta, Delta, DeltaKind};
pub use error::{ReduceError, Result};
pub use fingerprint::{sha256, ContentHash};
pub use gc::{Block, GarbageCollector, GcConfig, GcStats};
pub use ingest::{IngestPipeline, IngestResult, MaintenanceReport};
pub use metrics::{CoreMetric, CoreMetrics, MetricKind, MetricsSnapshot};
pub use tier_manager::{FileMetadata, TierManager, TierManagerConfig, TierSnapshot};
pub use tiering::{TierClass, TieringConfig, TieringEngine};
pub use version::{Version, VersionStore};

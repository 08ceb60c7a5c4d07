//! In-process counters for the storage-optimization core.
//!
//! Counters are lock-free `AtomicU64`s updated by the ingest pipeline. Export
//! is left to an external collector, which reads [`CoreMetrics::collect`] or a
//! [`MetricsSnapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// The type of metric: counter or gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A value that can go up or down.
    Gauge,
}

/// A single named metric with its current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreMetric {
    /// The metric name.
    pub name: String,
    /// Help text describing the metric.
    pub help: String,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Current value.
    pub value: f64,
}

/// Point-in-time copy of every counter.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub chunks_produced: u64,
    pub bytes_ingested: u64,
    pub dedup_hits: u64,
    pub dedup_misses: u64,
    pub versions_full: u64,
    pub versions_delta: u64,
    pub placements: u64,
    pub demotions: u64,
    pub gc_cycles: u64,
    pub gc_bytes_reclaimed: u64,
}

/// Thread-safe counters for chunking, dedupe, versioning, tiering and GC.
#[derive(Debug, Default)]
pub struct CoreMetrics {
    chunks_produced: AtomicU64,
    bytes_ingested: AtomicU64,
    dedup_hits: AtomicU64,
    dedup_misses: AtomicU64,
    versions_full: AtomicU64,
    versions_delta: AtomicU64,
    placements: AtomicU64,
    demotions: AtomicU64,
    gc_cycles: AtomicU64,
    gc_bytes_reclaimed: AtomicU64,
}

impl CoreMetrics {
    /// Create a new set of counters, all zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an ingested object split into `chunks` pieces.
    #[inline]
    pub fn record_ingest(&self, bytes: u64, chunks: u64) {
        self.bytes_ingested.fetch_add(bytes, Ordering::Relaxed);
        self.chunks_produced.fetch_add(chunks, Ordering::Relaxed);
    }

    /// Record the outcome of one dedup lookup.
    #[inline]
    pub fn record_dedup(&self, hit: bool) {
        if hit {
            self.dedup_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dedup_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a stored version.
    #[inline]
    pub fn record_version(&self, is_delta: bool) {
        if is_delta {
            self.versions_delta.fetch_add(1, Ordering::Relaxed);
        } else {
            self.versions_full.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a tier placement.
    #[inline]
    pub fn record_placement(&self) {
        self.placements.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an aging pass that demoted `count` objects.
    #[inline]
    pub fn record_demotions(&self, count: u64) {
        self.demotions.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a GC cycle.
    #[inline]
    pub fn record_gc_cycle(&self, bytes_reclaimed: u64) {
        self.gc_cycles.fetch_add(1, Ordering::Relaxed);
        self.gc_bytes_reclaimed
            .fetch_add(bytes_reclaimed, Ordering::Relaxed);
    }

    /// Dedup hit ratio, hits / (hits + misses). 0.0 before any lookup.
    pub fn dedup_hit_ratio(&self) -> f64 {
        let hits = self.dedup_hits.load(Ordering::Relaxed);
        let total = hits + self.dedup_misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Copy every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            chunks_produced: self.chunks_produced.load(Ordering::Relaxed),
            bytes_ingested: self.bytes_ingested.load(Ordering::Relaxed),
            dedup_hits: self.dedup_hits.load(Ordering::Relaxed),
            dedup_misses: self.dedup_misses.load(Ordering::Relaxed),
            versions_full: self.versions_full.load(Ordering::Relaxed),
            versions_delta: self.versions_delta.load(Ordering::Relaxed),
            placements: self.placements.load(Ordering::Relaxed),
            demotions: self.demotions.load(Ordering::Relaxed),
            gc_cycles: self.gc_cycles.load(Ordering::Relaxed),
            gc_bytes_reclaimed: self.gc_bytes_reclaimed.load(Ordering::Relaxed),
        }
    }

    /// All metrics with Prometheus-style names.
    pub fn collect(&self) -> Vec<CoreMetric> {
        let s = self.snapshot();
        let counter = |name: &str, help: &str, value: u64| CoreMetric {
            name: format!("cairn_reduce_{}", name),
            help: help.to_string(),
            kind: MetricKind::Counter,
            value: value as f64,
        };
        vec![
            counter("chunks_produced_total", "Chunks produced by the content chunker", s.chunks_produced),
            counter("bytes_ingested_total", "Raw bytes accepted by the ingest path", s.bytes_ingested),
            counter("dedup_hits_total", "Chunks already present in the dedup store", s.dedup_hits),
            counter("dedup_misses_total", "Chunks stored as new blocks", s.dedup_misses),
            counter("versions_full_total", "Versions stored whole", s.versions_full),
            counter("versions_delta_total", "Versions stored as deltas", s.versions_delta),
            counter("placements_total", "Objects placed into a tier", s.placements),
            counter("demotions_total", "Objects demoted by aging", s.demotions),
            counter("gc_cycles_total", "Garbage collection cycles", s.gc_cycles),
            counter("gc_bytes_reclaimed_total", "Bytes reclaimed by garbage collection", s.gc_bytes_reclaimed),
            CoreMetric {
                name: "cairn_reduce_dedup_hit_ratio".to_string(),
                help: "Dedup hit ratio (hits / lookups)".to_string(),
                kind: MetricKind::Gauge,
                value: self.dedup_hit_ratio(),
            },
        ]
    }
}

//! Capacity-bounded tier placement and aging.
//!
//! New objects go to the first tier in the placement order that exists and has
//! room; the last tier in the order is the unconditional fallback. Aging
//! demotes never-accessed objects one step down the same order.

use crate::tiering::{TierClass, TieringConfig, TieringEngine};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// Tier manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierManagerConfig {
    /// Tier names from most to least preferred
    pub placement: Vec<String>,
    /// Classification thresholds for the embedded tiering engine
    #[serde(default)]
    pub tiering: TieringConfig,
}

impl Default for TierManagerConfig {
    fn default() -> Self {
        Self {
            placement: [TierClass::Hot, TierClass::Warm, TierClass::Cold]
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
            tiering: TieringConfig::default(),
        }
    }
}

/// Placement metadata of one stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Object id returned by [`TierManager::store`]
    pub id: String,
    /// Logical filename
    pub filename: String,
    /// Object size in bytes
    pub size: u64,
    /// Name of the tier holding the object
    pub tier: String,
    /// Last access (store time until first access)
    pub last_accessed: SystemTime,
    /// Number of recorded accesses
    pub access_count: u64,
}

/// A named storage tier
#[derive(Debug, Clone)]
struct Tier {
    /// Tier name
    name: String,
    /// Capacity in bytes; 0 means unbounded
    capacity: u64,
    /// Bytes used; always the sum of `files[..].size`
    used: u64,
    /// Objects held, keyed by id
    files: HashMap<String, FileMetadata>,
}

impl Tier {
    fn new(name: &str, capacity: u64) -> Self {
        Self {
            name: name.to_string(),
            capacity,
            used: 0,
            files: HashMap::new(),
        }
    }

    /// True if `size` more bytes fit
    fn has_room(&self, size: u64) -> bool {
        self.capacity == 0 || self.used.saturating_add(size) <= self.capacity
    }
}

/// Read-only view of a tier's occupancy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSnapshot {
    /// Tier name
    pub name: String,
    /// Capacity in bytes; 0 means unbounded
    pub capacity: u64,
    /// Bytes used
    pub used: u64,
    /// Number of objects held
    pub file_count: usize,
}

#[derive(Debug, Default)]
struct TierState {
    tiers: HashMap<String, Tier>,
    /// id -> tier name
    locations: HashMap<String, String>,
}

impl TierState {
    fn take(&mut self, id: &str) -> Option<FileMetadata> {
        let tier_name = self.locations.get(id)?;
        let tier = self.tiers.get_mut(tier_name)?;
        let meta = tier.files.remove(id)?;
        tier.used -= meta.size;
        Some(meta)
    }

    fn put(&mut self, mut meta: FileMetadata, tier_name: &str) {
        let tier = self
            .tiers
            .entry(tier_name.to_string())
            .or_insert_with(|| Tier::new(tier_name, 0));
        tier.used += meta.size;
        meta.tier = tier_name.to_string();
        self.locations.insert(meta.id.clone(), tier_name.to_string());
        tier.files.insert(meta.id.clone(), meta);
    }
}

/// Owner of tiers and per-object placement metadata
pub struct TierManager {
    config: TierManagerConfig,
    state: RwLock<TierState>,
    engine: TieringEngine,
}

impl Default for TierManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TierManager {
    /// Create a manager with the hot → warm → cold placement order and no tiers
    pub fn new() -> Self {
        Self::with_config(TierManagerConfig::default())
    }

    /// Create a manager with a custom placement order
    pub fn with_config(config: TierManagerConfig) -> Self {
        let engine = TieringEngine::with_config(config.tiering.clone());
        Self {
            config,
            state: RwLock::new(TierState::default()),
            engine,
        }
    }

    /// Register a tier, or change the capacity of an existing one
    pub fn add_tier(&self, name: &str, capacity: u64) {
        let mut state = self.state.write();
        state
            .tiers
            .entry(name.to_string())
            .and_modify(|t| t.capacity = capacity)
            .or_insert_with(|| Tier::new(name, capacity));
        debug!(tier = name, capacity, "tier registered");
    }

    fn select_tier(&self, state: &TierState, size: u64) -> String {
        let Some((fallback, preferred)) = self.config.placement.split_last() else {
            return TierClass::Cold.as_str().to_string();
        };
        preferred
            .iter()
            .find(|name| state.tiers.get(*name).is_some_and(|t| t.has_room(size)))
            .unwrap_or(fallback)
            .clone()
    }

    /// Place a new object. Returns its id.
    /// If the fallback tier was never registered it is created unbounded.
    pub fn store(&self, filename: &str, data: &[u8]) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let size = data.len() as u64;
        let mut state = self.state.write();
        let tier = self.select_tier(&state, size);
        state.put(
            FileMetadata {
                id: id.clone(),
                filename: filename.to_string(),
                size,
                tier: tier.clone(),
                last_accessed: SystemTime::now(),
                access_count: 0,
            },
            &tier,
        );
        debug!(filename, id = %id, tier = %tier, size, "object placed");
        id
    }

    /// Record a read of object `id`. Returns false for an unknown id.
    pub fn record_access(&self, id: &str) -> bool {
        let now = SystemTime::now();
        let filename = {
            let mut state = self.state.write();
            let Some(tier_name) = state.locations.get(id).cloned() else {
                return false;
            };
            let Some(meta) = state
                .tiers
                .get_mut(&tier_name)
                .and_then(|t| t.files.get_mut(id))
            else {
                return false;
            };
            meta.last_accessed = now;
            meta.access_count += 1;
            meta.filename.clone()
        };
        self.engine.record_access(&filename, now);
        true
    }

    /// Age every object by `duration` and demote never-accessed objects one
    /// tier down the placement order. Returns the number of objects moved.
    ///
    /// The whole pass runs under one write lock, so tier usage is never
    /// observed mid-move. Access counts are left as they are.
    pub fn simulate_aging(&self, duration: Duration) -> usize {
        let mut state = self.state.write();

        let mut moves = Vec::new();
        for tier in state.tiers.values_mut() {
            let target = self.demotion_target(&tier.name);
            for meta in tier.files.values_mut() {
                meta.last_accessed = meta
                    .last_accessed
                    .checked_sub(duration)
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                if meta.access_count == 0 {
                    if let Some(target) = &target {
                        moves.push((meta.id.clone(), target.clone()));
                    }
                }
            }
        }
        // Only demote into tiers that exist.
        moves.retain(|(_, target)| state.tiers.contains_key(target));

        for (id, target) in &moves {
            if let Some(meta) = state.take(id) {
                debug!(id = %id, from = %meta.tier, to = %target, "object demoted");
                state.put(meta, target);
            }
        }
        if !moves.is_empty() {
            info!(demoted = moves.len(), "aging pass complete");
        }
        moves.len()
    }

    /// Next registered-or-not tier after `name` in the placement order
    fn demotion_target(&self, name: &str) -> Option<String> {
        let pos = self.config.placement.iter().position(|t| t == name)?;
        self.config.placement.get(pos + 1).cloned()
    }

    /// Name of the tier holding object `id`
    pub fn get_file_tier(&self, id: &str) -> Option<String> {
        self.state.read().locations.get(id).cloned()
    }

    /// Placement metadata of object `id`
    pub fn metadata(&self, id: &str) -> Option<FileMetadata> {
        let state = self.state.read();
        let tier = state.locations.get(id)?;
        state.tiers.get(tier)?.files.get(id).cloned()
    }

    /// Access-history classification of object `id`
    pub fn classify(&self, id: &str) -> Option<TierClass> {
        let filename = self.metadata(id)?.filename;
        Some(self.engine.get_tier(&filename))
    }

    /// Occupancy of every tier, in placement order then by name
    pub fn tiers(&self) -> Vec<TierSnapshot> {
        let state = self.state.read();
        let rank = |name: &str| {
            self.config
                .placement
                .iter()
                .position(|p| p == name)
                .unwrap_or(usize::MAX)
        };
        let mut out: Vec<TierSnapshot> = state
            .tiers
            .values()
            .map(|t| TierSnapshot {
                name: t.name.clone(),
                capacity: t.capacity,
                used: t.used,
                file_count: t.files.len(),
            })
            .collect();
        out.sort_by(|a, b| rank(&a.name).cmp(&rank(&b.name)).then(a.name.cmp(&b.name)));
        out
    }

    /// The embedded access-history engine
    pub fn engine(&self) -> &TieringEngine {
        &self.engine
    }
}

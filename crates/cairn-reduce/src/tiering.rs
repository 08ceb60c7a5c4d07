//! Access-history based hot/warm/cold classification.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, SystemTime};
use tracing::trace;

/// Storage temperature of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierClass {
    /// Frequently accessed
    Hot,
    /// Accessed recently
    Warm,
    /// Not accessed recently, or never
    Cold,
}

impl TierClass {
    /// Lowercase tier name, matching the default tier names of the tier manager
    pub fn as_str(&self) -> &'static str {
        match self {
            TierClass::Hot => "hot",
            TierClass::Warm => "warm",
            TierClass::Cold => "cold",
        }
    }
}

impl std::fmt::Display for TierClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieringConfig {
    /// Most recent access timestamps kept per filename
    pub history_limit: usize,
    /// Window in which `hot_min_accesses` accesses make a file hot
    #[serde(with = "crate::config::duration_secs")]
    pub hot_window: Duration,
    /// Accesses within `hot_window` needed for hot
    pub hot_min_accesses: usize,
    /// Any access within this window makes a file at least warm
    #[serde(with = "crate::config::duration_secs")]
    pub warm_window: Duration,
}

impl Default for TieringConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
            hot_window: Duration::from_secs(24 * 3600),
            hot_min_accesses: 3,
            warm_window: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

/// Per-filename bounded access history
#[derive(Debug, Default)]
pub struct TieringEngine {
    config: TieringConfig,
    history: RwLock<HashMap<String, VecDeque<SystemTime>>>,
}

impl TieringEngine {
    /// Create an engine with default thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with custom thresholds
    pub fn with_config(config: TieringConfig) -> Self {
        Self {
            config,
            history: RwLock::new(HashMap::new()),
        }
    }

    /// Active thresholds
    pub fn config(&self) -> &TieringConfig {
        &self.config
    }

    /// Record an access at `time`, keeping only the newest `history_limit` entries.
    pub fn record_access(&self, filename: &str, time: SystemTime) {
        let mut history = self.history.write();
        let accesses = history.entry(filename.to_string()).or_default();
        accesses.push_back(time);
        while accesses.len() > self.config.history_limit {
            accesses.pop_front();
        }
        trace!(filename, recorded = accesses.len(), "access recorded");
    }

    /// Record an access now
    pub fn record_access_now(&self, filename: &str) {
        self.record_access(filename, SystemTime::now());
    }

    /// Number of accesses currently retained for `filename`
    pub fn access_count(&self, filename: &str) -> usize {
        self.history.read().get(filename).map_or(0, |h| h.len())
    }

    /// Classify `filename` relative to the current time
    pub fn get_tier(&self, filename: &str) -> TierClass {
        self.get_tier_at(filename, SystemTime::now())
    }

    /// Classify `filename` relative to `now`.
    /// Accesses timestamped after `now` count as happening at `now`.
    pub fn get_tier_at(&self, filename: &str, now: SystemTime) -> TierClass {
        let history = self.history.read();
        let Some(accesses) = history.get(filename) else {
            return TierClass::Cold;
        };

        let age = |t: &SystemTime| now.duration_since(*t).unwrap_or(Duration::ZERO);
        let recent = accesses
            .iter()
            .filter(|t| age(t) <= self.config.hot_window)
            .count();
        if recent >= self.config.hot_min_accesses {
            return TierClass::Hot;
        }
        if accesses.iter().any(|t| age(t) <= self.config.warm_window) {
            return TierClass::Warm;
        }
        TierClass::Cold
    }
}

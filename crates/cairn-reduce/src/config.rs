//! Core configuration, loadable from TOML.
//!
//! ```toml
//! [chunker]
//! min_size = 1024
//! max_size = 4096
//!
//! [gc]
//! ttl = 604800
//!
//! [[tiers]]
//! name = "hot"
//! capacity = 1073741824
//! ```

use crate::chunker::ChunkerConfig;
use crate::error::{ReduceError, Result};
use crate::gc::GcConfig;
use crate::tier_manager::TierManagerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A tier to register at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSpec {
    /// Tier name
    pub name: String,
    /// Capacity in bytes; 0 means unbounded
    #[serde(default)]
    pub capacity: u64,
}

/// Configuration for every component of the core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Chunk size bounds
    pub chunker: ChunkerConfig,
    /// Block TTL
    pub gc: GcConfig,
    /// Placement order and classification thresholds
    pub tier_manager: TierManagerConfig,
    /// Tiers registered at startup
    pub tiers: Vec<TierSpec>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            gc: GcConfig::default(),
            tier_manager: TierManagerConfig::default(),
            tiers: vec![
                TierSpec {
                    name: "hot".into(),
                    capacity: 1 << 30,
                },
                TierSpec {
                    name: "warm".into(),
                    capacity: 10 << 30,
                },
                TierSpec {
                    name: "cold".into(),
                    capacity: 0,
                },
            ],
        }
    }
}

impl CoreConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: CoreConfig =
            toml::from_str(s).map_err(|e| ReduceError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| ReduceError::InvalidConfig(e.to_string()))
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.chunker.min_size == 0 {
            return Err(ReduceError::InvalidConfig(
                "chunker.min_size must be positive".into(),
            ));
        }
        if self.chunker.min_size > self.chunker.max_size {
            return Err(ReduceError::InvalidConfig(format!(
                "chunker.min_size ({}) exceeds chunker.max_size ({})",
                self.chunker.min_size, self.chunker.max_size
            )));
        }
        if self.tier_manager.placement.is_empty() {
            return Err(ReduceError::InvalidConfig(
                "tier_manager.placement must name at least one tier".into(),
            ));
        }
        if self.tier_manager.tiering.history_limit == 0 {
            return Err(ReduceError::InvalidConfig(
                "tier_manager.tiering.history_limit must be positive".into(),
            ));
        }
        let mut seen = HashSet::new();
        for tier in &self.tiers {
            if !seen.insert(tier.name.as_str()) {
                return Err(ReduceError::InvalidConfig(format!(
                    "duplicate tier name: {}",
                    tier.name
                )));
            }
        }
        Ok(())
    }
}

/// Serialize a `Duration` as whole seconds
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize as seconds
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    /// Deserialize from seconds
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn default_is_valid() {
        CoreConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_partial_document() {
        let config = CoreConfig::from_toml_str(
            r#"
            [chunker]
            min_size = 1024
            max_size = 4096

            [gc]
            ttl = 3600

            [[tiers]]
            name = "hot"
            capacity = 100

            [[tiers]]
            name = "cold"
            "#,
        )
        .unwrap();
        assert_eq!(config.chunker.min_size, 1024);
        assert_eq!(config.chunker.boundary_mask, 0x1FF);
        assert_eq!(config.gc.ttl, Duration::from_secs(3600));
        assert_eq!(config.tiers.len(), 2);
        assert_eq!(config.tiers[1].capacity, 0);
        assert_eq!(config.tier_manager.placement, vec!["hot", "warm", "cold"]);
    }

    #[test]
    fn rejects_inverted_bounds() {
        let err = CoreConfig::from_toml_str("[chunker]\nmin_size = 10\nmax_size = 5\n").unwrap_err();
        assert!(matches!(err, ReduceError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_duplicate_tiers() {
        let mut config = CoreConfig::default();
        config.tiers.push(TierSpec {
            name: "hot".into(),
            capacity: 1,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(CoreConfig::from_toml_str("chunker = 7").is_err());
    }

    #[test]
    fn toml_roundtrip_and_load() {
        let config = CoreConfig::default();
        let text = config.to_toml_string().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        assert_eq!(CoreConfig::load(file.path()).unwrap(), config);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = CoreConfig::load("/nonexistent/cairn.toml").unwrap_err();
        assert!(matches!(err, ReduceError::Io(_)));
    }
}

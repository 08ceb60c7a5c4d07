//! Delta-encoded version chains per logical filename.
//!
//! The first version of a file is stored whole. Each update is XOR-delta
//! encoded against the reconstructed latest version and kept as a delta when
//! that is smaller. Reading a delta version walks `base_id` links back to the
//! nearest full version; chains are never compacted, so reconstruction cost
//! grows with the number of updates.

use crate::delta::{apply_delta, create_delta, Delta, DeltaKind};
use crate::error::{ReduceError, Result};
use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Metadata of one stored version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Identifier, unique within the filename (`v1`, `v2`, ...)
    pub id: String,
    /// Logical filename this version belongs to
    pub filename: String,
    /// Size of the reconstructed content in bytes
    pub size: usize,
    /// Bytes actually held for this version
    pub stored_size: usize,
    /// True if the payload is a delta against `base_id`
    pub is_delta: bool,
    /// Version this delta applies to; set iff `is_delta`
    pub base_id: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredVersion {
    meta: Version,
    payload: Bytes,
}

/// Version chains for all filenames
#[derive(Debug, Default)]
pub struct VersionStore {
    chains: RwLock<HashMap<String, Vec<StoredVersion>>>,
}

impl VersionStore {
    /// Create an empty version store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `content` as a full version. Returns the new version id.
    pub fn store(&self, filename: &str, content: &[u8]) -> String {
        let mut chains = self.chains.write();
        let chain = chains.entry(filename.to_string()).or_default();
        let id = format!("v{}", chain.len() + 1);
        chain.push(StoredVersion {
            meta: Version {
                id: id.clone(),
                filename: filename.to_string(),
                size: content.len(),
                stored_size: content.len(),
                is_delta: false,
                base_id: None,
            },
            payload: Bytes::copy_from_slice(content),
        });
        debug!(filename, version = %id, size = content.len(), "stored full version");
        id
    }

    /// Append `content` as a new version of an existing file, delta-encoded
    /// against the latest version when that is smaller.
    ///
    /// Concurrent updates of the same filename must be serialized by the caller.
    pub fn update(&self, filename: &str, content: &[u8]) -> Result<String> {
        let base_id = self
            .latest(filename)
            .map(|v| v.id)
            .ok_or_else(|| ReduceError::FileNotFound(filename.to_string()))?;
        let base = self.get_version(filename, &base_id)?;
        let delta = create_delta(&base, content);

        let mut chains = self.chains.write();
        let chain = chains
            .get_mut(filename)
            .ok_or_else(|| ReduceError::FileNotFound(filename.to_string()))?;
        let id = format!("v{}", chain.len() + 1);
        let is_delta = delta.is_delta();
        let meta = Version {
            id: id.clone(),
            filename: filename.to_string(),
            size: content.len(),
            stored_size: delta.data.len(),
            is_delta,
            base_id: is_delta.then(|| base_id.clone()),
        };
        debug!(
            filename,
            version = %id,
            base = %base_id,
            kind = delta.kind.as_str(),
            stored = meta.stored_size,
            size = meta.size,
            "appended version"
        );
        chain.push(StoredVersion {
            meta,
            payload: Bytes::from(delta.data),
        });
        Ok(id)
    }

    /// Reconstruct the content of a specific version.
    ///
    /// The lock is taken once per chain hop and released before the next, so a
    /// long reconstruction never blocks writers of other files.
    pub fn get_version(&self, filename: &str, version_id: &str) -> Result<Vec<u8>> {
        let mut pending: Vec<Bytes> = Vec::new();
        let mut current = version_id.to_string();

        let base = loop {
            let (payload, base_id) = self.lookup(filename, &current)?;
            match base_id {
                Some(next) => {
                    pending.push(payload);
                    current = next;
                }
                None => break payload.to_vec(),
            }
        };

        pending.iter().rev().try_fold(base, |content, payload| {
            apply_delta(
                &content,
                &Delta {
                    data: payload.to_vec(),
                    kind: DeltaKind::XorCompressed,
                },
            )
        })
    }

    /// Reconstruct the latest version of `filename`
    pub fn get_latest(&self, filename: &str) -> Result<Vec<u8>> {
        let latest = self
            .latest(filename)
            .ok_or_else(|| ReduceError::FileNotFound(filename.to_string()))?;
        self.get_version(filename, &latest.id)
    }

    fn lookup(&self, filename: &str, version_id: &str) -> Result<(Bytes, Option<String>)> {
        let chains = self.chains.read();
        let chain = chains
            .get(filename)
            .ok_or_else(|| ReduceError::FileNotFound(filename.to_string()))?;
        let stored = chain
            .iter()
            .find(|v| v.meta.id == version_id)
            .ok_or_else(|| ReduceError::VersionNotFound {
                filename: filename.to_string(),
                version_id: version_id.to_string(),
            })?;
        Ok((stored.payload.clone(), stored.meta.base_id.clone()))
    }

    /// Most recent version of `filename`
    pub fn latest(&self, filename: &str) -> Option<Version> {
        self.chains
            .read()
            .get(filename)
            .and_then(|chain| chain.last())
            .map(|v| v.meta.clone())
    }

    /// All versions of `filename`, oldest first
    pub fn versions(&self, filename: &str) -> Vec<Version> {
        self.chains
            .read()
            .get(filename)
            .map(|chain| chain.iter().map(|v| v.meta.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of delta hops from `version_id` to its nearest full ancestor
    pub fn chain_depth(&self, filename: &str, version_id: &str) -> Result<usize> {
        let mut depth = 0;
        let mut current = version_id.to_string();
        while let (_, Some(next)) = self.lookup(filename, &current)? {
            depth += 1;
            current = next;
        }
        Ok(depth)
    }

    /// Raw bytes held across every version of every file
    pub fn total_size(&self) -> u64 {
        self.chains
            .read()
            .values()
            .flat_map(|chain| chain.iter())
            .map(|v| v.payload.len() as u64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(edit: &str) -> Vec<u8> {
        let mut body = "Quarterly report. Revenue grew in every region. "
            .repeat(40)
            .into_bytes();
        body.extend_from_slice(edit.as_bytes());
        body
    }

    #[test]
    fn store_creates_full_version() {
        let store = VersionStore::new();
        let id = store.store("report.txt", b"hello");
        assert_eq!(id, "v1");
        let v = store.latest("report.txt").unwrap();
        assert!(!v.is_delta);
        assert_eq!(v.base_id, None);
        assert_eq!(store.get_version("report.txt", &id).unwrap(), b"hello");
    }

    #[test]
    fn updates_are_delta_encoded() {
        let store = VersionStore::new();
        let v1 = doc("draft");
        let v2 = doc("review");
        let v3 = doc("final");
        let id1 = store.store("report.txt", &v1);
        let id2 = store.update("report.txt", &v2).unwrap();
        let id3 = store.update("report.txt", &v3).unwrap();

        let versions = store.versions("report.txt");
        assert_eq!(versions.len(), 3);
        assert!(versions[1].is_delta);
        assert_eq!(versions[1].base_id.as_deref(), Some("v1"));
        assert_eq!(versions[2].base_id.as_deref(), Some("v2"));

        assert!(store.total_size() < (v1.len() + v2.len() + v3.len()) as u64);
        assert_eq!(store.get_version("report.txt", &id1).unwrap(), v1);
        assert_eq!(store.get_version("report.txt", &id2).unwrap(), v2);
        assert_eq!(store.get_version("report.txt", &id3).unwrap(), v3);
        assert_eq!(store.chain_depth("report.txt", &id3).unwrap(), 2);
        assert_eq!(store.get_latest("report.txt").unwrap(), v3);
    }

    #[test]
    fn dissimilar_update_is_stored_full() {
        let store = VersionStore::new();
        store.store("a", b"aaaa");
        let id = store.update("a", b"zq").unwrap();
        let v = store.latest("a").unwrap();
        assert_eq!(v.id, id);
        assert!(!v.is_delta);
        assert!(v.base_id.is_none());
        assert_eq!(store.chain_depth("a", &id).unwrap(), 0);
        assert_eq!(store.get_version("a", &id).unwrap(), b"zq");
    }

    #[test]
    fn not_found_cases() {
        let store = VersionStore::new();
        assert!(matches!(
            store.get_version("nope", "v1"),
            Err(ReduceError::FileNotFound(_))
        ));
        assert!(matches!(
            store.update("nope", b"x"),
            Err(ReduceError::FileNotFound(_))
        ));
        store.store("a", b"x");
        assert!(matches!(
            store.get_version("a", "v7"),
            Err(ReduceError::VersionNotFound { .. })
        ));
        assert!(store.versions("nope").is_empty());
    }

    #[test]
    fn store_on_existing_file_appends_full_version() {
        let store = VersionStore::new();
        store.store("a", b"one");
        let id = store.store("a", b"two");
        assert_eq!(id, "v2");
        assert_eq!(store.get_version("a", "v1").unwrap(), b"one");
        assert_eq!(store.get_latest("a").unwrap(), b"two");
    }

    #[test]
    fn long_chain_reconstructs_every_version() {
        let store = VersionStore::new();
        let mut expected = vec![doc("0")];
        store.store("log", &expected[0]);
        for i in 1..25 {
            let content = doc(&format!("entry {i}"));
            store.update("log", &content).unwrap();
            expected.push(content);
        }
        for (i, content) in expected.iter().enumerate() {
            let id = format!("v{}", i + 1);
            assert_eq!(&store.get_version("log", &id).unwrap(), content);
        }
    }
}

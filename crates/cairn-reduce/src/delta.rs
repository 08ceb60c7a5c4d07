//! XOR + gzip delta encoding between successive versions of an object.

use crate::error::{ReduceError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::{trace, warn};

/// How a [`Delta`] payload must be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeltaKind {
    /// gzip of `original XOR modified`, with the unmatched tail of `modified` appended verbatim
    XorCompressed,
    /// The modified content itself
    Full,
}

impl DeltaKind {
    /// Wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaKind::XorCompressed => "xor-compressed",
            DeltaKind::Full => "full",
        }
    }
}

/// Result of [`create_delta`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    /// Encoded payload
    pub data: Vec<u8>,
    /// Payload interpretation
    pub kind: DeltaKind,
}

impl Delta {
    /// True if the payload is a compressed XOR against a base
    pub fn is_delta(&self) -> bool {
        self.kind == DeltaKind::XorCompressed
    }
}

/// XOR `patch` onto `base` over their common length; bytes of `patch` past
/// the end of `base` are kept as they are.
fn xor_onto(base: &[u8], patch: &[u8]) -> Vec<u8> {
    let mut out = patch.to_vec();
    for (o, b) in out.iter_mut().zip(base.iter()) {
        *o ^= *b;
    }
    out
}

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Encode `modified` relative to `original`.
///
/// The XOR form is returned only when its gzip is strictly smaller than
/// `modified`; otherwise the result is a `Full` copy, so a delta never costs
/// more than storing the content whole.
pub fn create_delta(original: &[u8], modified: &[u8]) -> Delta {
    let xored = xor_onto(original, modified);
    match gzip(&xored) {
        Ok(compressed) if compressed.len() < modified.len() => {
            trace!(
                original = original.len(),
                modified = modified.len(),
                delta = compressed.len(),
                "xor delta accepted"
            );
            Delta {
                data: compressed,
                kind: DeltaKind::XorCompressed,
            }
        }
        Ok(_) => Delta {
            data: modified.to_vec(),
            kind: DeltaKind::Full,
        },
        Err(e) => {
            warn!(error = %e, "gzip of xor delta failed, storing full content");
            Delta {
                data: modified.to_vec(),
                kind: DeltaKind::Full,
            }
        }
    }
}

/// Reconstruct the modified content from `original` and a delta.
/// A gzip failure means the stored payload is corrupt and is not recoverable.
pub fn apply_delta(original: &[u8], delta: &Delta) -> Result<Vec<u8>> {
    match delta.kind {
        DeltaKind::Full => Ok(delta.data.clone()),
        DeltaKind::XorCompressed => {
            let xored =
                gunzip(&delta.data).map_err(|e| ReduceError::CorruptDelta(e.to_string()))?;
            Ok(xor_onto(original, &xored))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(n: usize) -> Vec<u8> {
        b"The quick brown fox jumps over the lazy dog. "
            .iter()
            .copied()
            .cycle()
            .take(n)
            .collect()
    }

    #[test]
    fn similar_content_produces_xor_delta() {
        let original = text(4096);
        let mut modified = original.clone();
        modified[100] = b'#';
        modified[2000] = b'!';
        let delta = create_delta(&original, &modified);
        assert_eq!(delta.kind, DeltaKind::XorCompressed);
        assert!(delta.data.len() < modified.len());
        assert_eq!(apply_delta(&original, &delta).unwrap(), modified);
    }

    #[test]
    fn tiny_content_falls_back_to_full() {
        let delta = create_delta(b"abc", b"abd");
        assert_eq!(delta.kind, DeltaKind::Full);
        assert_eq!(delta.data, b"abd");
        assert_eq!(apply_delta(b"abc", &delta).unwrap(), b"abd");
    }

    #[test]
    fn longer_and_shorter_modifications() {
        let original = text(3000);
        let mut longer = original.clone();
        longer.extend_from_slice(&text(1000));
        let shorter = original[..1500].to_vec();

        for modified in [longer, shorter, Vec::new()] {
            let delta = create_delta(&original, &modified);
            assert_eq!(apply_delta(&original, &delta).unwrap(), modified);
        }
    }

    #[test]
    fn corrupt_payload_is_reported() {
        let delta = Delta {
            data: b"definitely not gzip".to_vec(),
            kind: DeltaKind::XorCompressed,
        };
        let err = apply_delta(b"base", &delta).unwrap_err();
        assert!(matches!(err, ReduceError::CorruptDelta(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn kind_names() {
        assert_eq!(DeltaKind::XorCompressed.as_str(), "xor-compressed");
        assert_eq!(DeltaKind::Full.as_str(), "full");
    }

    proptest! {
        #[test]
        fn prop_delta_roundtrip(
            original in prop::collection::vec(any::<u8>(), 0..4096),
            modified in prop::collection::vec(any::<u8>(), 0..4096),
        ) {
            let delta = create_delta(&original, &modified);
            prop_assert!(delta.kind == DeltaKind::Full || delta.data.len() < modified.len());
            prop_assert_eq!(apply_delta(&original, &delta).unwrap(), modified);
        }
    }
}

//! Deterministic workload generators

/// `len` bytes from a seeded linear congruential generator.
pub fn pseudo_random(seed: u32, len: usize) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 16) as u8
        })
        .collect()
}

/// `pattern` repeated `times` times.
pub fn repeated_pattern(pattern: &[u8], times: usize) -> Vec<u8> {
    pattern.repeat(times)
}

/// `count` versions of a text document that differ only in a short trailer.
pub fn similar_versions(count: usize) -> Vec<Vec<u8>> {
    let body = "Object storage gateways keep many near-identical revisions of the same file. "
        .repeat(20);
    (0..count)
        .map(|i| format!("{body}revision {i} edited by batch job {}", i * 7).into_bytes())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pseudo_random_is_seeded() {
        assert_eq!(pseudo_random(5, 64), pseudo_random(5, 64));
        assert_ne!(pseudo_random(5, 64), pseudo_random(6, 64));
    }

    #[test]
    fn similar_versions_share_prefix() {
        let v = similar_versions(3);
        assert_eq!(v.len(), 3);
        assert_eq!(v[0][..1000], v[2][..1000]);
        assert_ne!(v[0], v[1]);
    }

    #[test]
    fn repeated_pattern_len() {
        assert_eq!(repeated_pattern(b"AAAA", 1200).len(), 4800);
    }
}

//! The partition function shared bit-for-bit between map and reduce workers.
//!
//! Both sides must agree on exactly the same hash, or a key emitted by a map
//! task would land in a different partition than the reducer that later
//! looks for it.

const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV_PRIME: u32 = 0x01000193;

/// FNV-1a over a byte string, 32-bit variant.
fn fnv1a32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// `partition(key) = fnv1a32(key) AND 0x7fffffff, mod n_reduce`.
///
/// Panics if `n_reduce` is zero; the coordinator never constructs a job with
/// zero reduce partitions.
pub fn partition(key: &str, n_reduce: usize) -> usize {
    assert!(n_reduce > 0, "n_reduce must be positive");
    let masked = fnv1a32(key.as_bytes()) & 0x7fff_ffff;
    (masked as usize) % n_reduce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        assert_eq!(partition("cat", 7), partition("cat", 7));
    }

    #[test]
    fn masked_value_is_non_negative() {
        // fnv1a32 & 0x7fffffff is always representable as a non-negative i32,
        // which is what the mandated formula depends on.
        for key in ["", "a", "cat dog", "🦀", "the quick brown fox"] {
            let masked = fnv1a32(key.as_bytes()) & 0x7fff_ffff;
            assert!(masked <= 0x7fff_ffff);
        }
    }

    #[test]
    fn distributes_across_partitions() {
        let mut seen = std::collections::HashSet::new();
        for key in ["foo", "bar", "baz", "qux", "quux", "corge", "grault"] {
            seen.insert(partition(key, 4));
        }
        // A constant (or otherwise degenerate) hash would land every key in
        // the same bucket; a real FNV-1a spread hits more than one.
        assert!(seen.len() > 1, "expected keys to spread across more than one partition");
    }

    #[test]
    fn distinct_keys_can_share_a_partition() {
        // Verified by direct computation of fnv1a32("bar") and fnv1a32("baz")
        // under the mandated mask: both land in partition 0 of 2. Exercised
        // again end-to-end (through a real map/reduce task) in
        // `worker::tests::colliding_keys_each_get_exactly_one_reduce_line`.
        assert_eq!(partition("bar", 2), 0);
        assert_eq!(partition("baz", 2), 0);
    }

    #[test]
    fn single_partition_always_zero() {
        for key in ["foo", "bar", "anything"] {
            assert_eq!(partition(key, 1), 0);
        }
    }
}

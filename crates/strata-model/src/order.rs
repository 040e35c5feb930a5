//! Canonical storage order of tree nodes.
//!
//! Node names are hashed with the non-cryptographic 64-bit FNV-1a function
//! over their UTF-8 octets. Successive bytes of the hash, scaled by the
//! per-depth fan-out, give the bucket index a node falls into at each tree
//! depth. Because a given name always falls on the same bucket at a given
//! depth, two trees holding the same entry set always split into identical
//! subtrees, and diffs can skip equal buckets wholesale.
//!
//! The fan-out table is fixed; changing it would change every tree hash:
//!
//! | depth index | buckets per node | leaf split threshold |
//! |-------------|------------------|----------------------|
//! | 0..=2       | 32               | 512                  |
//! | 3..=4       | 8                | 256                  |
//! | 5..=6       | 4                | 256                  |
//! | 7+          | 2                | 256                  |
//!
//! Names that collide on every bucket byte down to [`MAX_DEPTH`] stay
//! together in a leaf regardless of its size, ordered by plain string
//! comparison.

use std::cmp::Ordering;

const FNV64_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV64_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Maximum nesting depth of canonical bucket trees.
pub const MAX_DEPTH: usize = 8;

/// Canonical node-name ordering and bucket placement.
#[derive(Clone, Copy, Debug, Default)]
pub struct CanonicalNodeOrder;

impl CanonicalNodeOrder {
    /// FNV-1a 64-bit hash of a node name's UTF-8 octets.
    pub fn name_hash(name: &str) -> u64 {
        let mut hash = FNV64_OFFSET_BASIS;
        for octet in name.as_bytes() {
            hash ^= u64::from(*octet);
            hash = hash.wrapping_mul(FNV64_PRIME);
        }
        hash
    }

    /// Maximum number of feature nodes a leaf at `depth_index` may hold
    /// before it is split into buckets.
    pub fn normalized_size_limit(depth_index: usize) -> usize {
        if depth_index <= 2 {
            512
        } else {
            256
        }
    }

    /// Number of buckets a leaf at `depth_index` splits into.
    pub fn max_buckets_for_level(depth_index: usize) -> usize {
        match depth_index {
            0..=2 => 32,
            3..=4 => 8,
            5..=6 => 4,
            _ => 2,
        }
    }

    /// Bucket index (zero-based) for a node name at a given depth index.
    ///
    /// The result is in `0..max_buckets_for_level(depth_index)`.
    pub fn bucket(name: &str, depth_index: usize) -> u8 {
        Self::bucket_of_hash(Self::name_hash(name), depth_index)
    }

    /// Bucket index for a pre-computed name hash.
    pub fn bucket_of_hash(name_hash: u64, depth_index: usize) -> u8 {
        let byte_n = Self::byte_n(name_hash, depth_index);
        let max_buckets = Self::max_buckets_for_level(depth_index) as u32;
        ((u32::from(byte_n) * max_buckets) / 256) as u8
    }

    /// The bucket index sequence of a name for all [`MAX_DEPTH`] levels.
    pub fn all_buckets(name: &str) -> [u8; MAX_DEPTH] {
        let hash = Self::name_hash(name);
        let mut buckets = [0u8; MAX_DEPTH];
        for (depth, slot) in buckets.iter_mut().enumerate() {
            *slot = Self::bucket_of_hash(hash, depth);
        }
        buckets
    }

    /// Canonical storage order: bucket sequence first, then, for names that
    /// collide on every level, plain string order.
    pub fn compare(left: &str, right: &str) -> Ordering {
        let lh = Self::name_hash(left);
        let rh = Self::name_hash(right);
        for depth in 0..MAX_DEPTH {
            let lb = Self::bucket_of_hash(lh, depth);
            let rb = Self::bucket_of_hash(rh, depth);
            match lb.cmp(&rb) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        left.cmp(right)
    }

    /// The Nth big-endian byte of the name hash, where N is `depth_index`.
    fn byte_n(name_hash: u64, depth_index: usize) -> u8 {
        debug_assert!(depth_index < MAX_DEPTH, "depth too deep: {depth_index}");
        let shift = 8 * (7 - depth_index as u32);
        (name_hash >> shift) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_hash_is_deterministic() {
        assert_eq!(
            CanonicalNodeOrder::name_hash("points/1"),
            CanonicalNodeOrder::name_hash("points/1")
        );
        assert_ne!(
            CanonicalNodeOrder::name_hash("points/1"),
            CanonicalNodeOrder::name_hash("points/2")
        );
    }

    #[test]
    fn empty_name_hashes_to_offset_basis() {
        assert_eq!(CanonicalNodeOrder::name_hash(""), FNV64_OFFSET_BASIS);
    }

    #[test]
    fn fanout_table() {
        assert_eq!(CanonicalNodeOrder::max_buckets_for_level(0), 32);
        assert_eq!(CanonicalNodeOrder::max_buckets_for_level(2), 32);
        assert_eq!(CanonicalNodeOrder::max_buckets_for_level(3), 8);
        assert_eq!(CanonicalNodeOrder::max_buckets_for_level(4), 8);
        assert_eq!(CanonicalNodeOrder::max_buckets_for_level(5), 4);
        assert_eq!(CanonicalNodeOrder::max_buckets_for_level(6), 4);
        assert_eq!(CanonicalNodeOrder::max_buckets_for_level(7), 2);
        assert_eq!(CanonicalNodeOrder::max_buckets_for_level(20), 2);
    }

    #[test]
    fn split_thresholds() {
        assert_eq!(CanonicalNodeOrder::normalized_size_limit(0), 512);
        assert_eq!(CanonicalNodeOrder::normalized_size_limit(2), 512);
        assert_eq!(CanonicalNodeOrder::normalized_size_limit(3), 256);
        assert_eq!(CanonicalNodeOrder::normalized_size_limit(9), 256);
    }

    #[test]
    fn bucket_stays_in_range() {
        for name in ["a", "roads/1", "parcels/99999", "", "\u{1f30d}"] {
            for depth in 0..MAX_DEPTH {
                let bucket = CanonicalNodeOrder::bucket(name, depth) as usize;
                assert!(bucket < CanonicalNodeOrder::max_buckets_for_level(depth));
            }
        }
    }

    #[test]
    fn all_buckets_matches_per_depth_bucket() {
        let name = "features/42";
        let all = CanonicalNodeOrder::all_buckets(name);
        for (depth, bucket) in all.iter().enumerate() {
            assert_eq!(*bucket, CanonicalNodeOrder::bucket(name, depth));
        }
    }

    #[test]
    fn compare_is_total_and_consistent() {
        let mut names: Vec<String> = (0..100).map(|i| format!("f{i}")).collect();
        names.sort_by(|a, b| CanonicalNodeOrder::compare(a, b));
        // Sorting twice gives the same order.
        let again = {
            let mut n = names.clone();
            n.sort_by(|a, b| CanonicalNodeOrder::compare(a, b));
            n
        };
        assert_eq!(names, again);
        // Equal names compare equal.
        assert_eq!(
            CanonicalNodeOrder::compare("same", "same"),
            Ordering::Equal
        );
    }

    #[test]
    fn compare_falls_back_to_string_order() {
        // Any two distinct names never compare Equal, even if their bucket
        // sequences collide.
        assert_ne!(CanonicalNodeOrder::compare("a", "b"), Ordering::Equal);
    }
}

//! Canonical hashing of revision objects.
//!
//! Every object kind hashes through a domain-separated BLAKE3 hasher over
//! its bincode encoding. Domain separation keeps a tree and a feature with
//! coincidentally identical bytes from colliding on one id. The encoding is
//! canonical by construction: tree children are kept in canonical name
//! order, bucket maps are ordered, and geometry values are normalized
//! before they reach the hasher.

use serde::Serialize;
use strata_types::ObjectId;

use crate::commit::{RevCommit, RevTag};
use crate::feature::RevFeature;
use crate::feature_type::RevFeatureType;
use crate::tree::RevTree;

/// Domain-separated BLAKE3 content hasher.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for feature objects.
    pub const FEATURE: Self = Self {
        domain: "strata-feature-v1",
    };
    /// Hasher for tree objects.
    pub const TREE: Self = Self {
        domain: "strata-tree-v1",
    };
    /// Hasher for feature-type (schema) objects.
    pub const FEATURE_TYPE: Self = Self {
        domain: "strata-featuretype-v1",
    };
    /// Hasher for commit objects.
    pub const COMMIT: Self = Self {
        domain: "strata-commit-v1",
    };
    /// Hasher for tag objects.
    pub const TAG: Self = Self {
        domain: "strata-tag-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }

    fn hash_encoded<T: Serialize>(&self, value: &T) -> ObjectId {
        // bincode encoding of the in-memory model types cannot fail: all
        // fields are sized, self-describing values.
        let data = bincode::serialize(value).expect("canonical encoding");
        self.hash(&data)
    }
}

pub(crate) fn hash_feature(feature: &RevFeature) -> ObjectId {
    ContentHasher::FEATURE.hash_encoded(feature)
}

pub(crate) fn hash_tree(tree: &RevTree) -> ObjectId {
    ContentHasher::TREE.hash_encoded(tree)
}

pub(crate) fn hash_feature_type(ftype: &RevFeatureType) -> ObjectId {
    ContentHasher::FEATURE_TYPE.hash_encoded(ftype)
}

pub(crate) fn hash_commit(commit: &RevCommit) -> ObjectId {
    ContentHasher::COMMIT.hash_encoded(commit)
}

pub(crate) fn hash_tag(tag: &RevTag) -> ObjectId {
    ContentHasher::TAG.hash_encoded(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same bytes";
        let feature = ContentHasher::FEATURE.hash(data);
        let tree = ContentHasher::TREE.hash(data);
        let commit = ContentHasher::COMMIT.hash(data);
        assert_ne!(feature, tree);
        assert_ne!(feature, commit);
        assert_ne!(tree, commit);
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(
            ContentHasher::TREE.hash(b"abc"),
            ContentHasher::TREE.hash(b"abc")
        );
    }
}

//! The immutable persistent tree: leaf and bucket nodes.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use strata_types::ObjectId;

use crate::error::{ModelError, ModelResult};
use crate::geometry::Envelope;
use crate::hash;
use crate::order::CanonicalNodeOrder;
use crate::value::Value;

/// Whether a tree entry points at a feature or at a subtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Feature,
    Tree,
}

/// A named entry inside a tree: feature or subtree pointer.
///
/// Carries the entry name, the target object id, an optional metadata id
/// (a [`RevFeatureType`](crate::RevFeatureType) override), a bounding
/// envelope for spatial pruning, and optional extra attribute values
/// materialized by spatial indexes so certain filters can be evaluated
/// without loading the full feature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    name: String,
    object_id: ObjectId,
    metadata_id: Option<ObjectId>,
    kind: NodeKind,
    bounds: Option<Envelope>,
    extra: BTreeMap<String, Value>,
}

impl Node {
    /// A feature entry.
    pub fn feature(name: impl Into<String>, object_id: ObjectId) -> Self {
        Self {
            name: name.into(),
            object_id,
            metadata_id: None,
            kind: NodeKind::Feature,
            bounds: None,
            extra: BTreeMap::new(),
        }
    }

    /// A subtree entry.
    pub fn tree(name: impl Into<String>, object_id: ObjectId) -> Self {
        Self {
            name: name.into(),
            object_id,
            metadata_id: None,
            kind: NodeKind::Tree,
            bounds: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_bounds(mut self, bounds: Envelope) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_metadata(mut self, metadata_id: ObjectId) -> Self {
        self.metadata_id = Some(metadata_id);
        self
    }

    pub fn with_extra(mut self, extra: BTreeMap<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    /// A copy of this node pointing at a different target, keeping name,
    /// kind, and placement metadata. Used to stage removals (null target).
    pub fn update(&self, object_id: ObjectId) -> Self {
        Self {
            object_id,
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    pub fn metadata_id(&self) -> Option<ObjectId> {
        self.metadata_id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn bounds(&self) -> Option<&Envelope> {
        self.bounds.as_ref()
    }

    /// Extra attribute values materialized on this entry.
    pub fn extra(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }
}

/// A slot of an inner tree node: one child tree plus the union bounds of
/// everything reachable through it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeBucket {
    pub object_id: ObjectId,
    pub bounds: Option<Envelope>,
}

impl TreeBucket {
    pub fn new(object_id: ObjectId, bounds: Option<Envelope>) -> Self {
        Self { object_id, bounds }
    }
}

/// An immutable node of the persistent hash tree.
///
/// Exactly one of two shapes, never mixed:
///
/// - *leaf*: direct feature entries plus direct subtree entries;
/// - *inner*: a sparse map from bucket index to [`TreeBucket`].
///
/// `size` is the total number of feature entries reachable transitively;
/// `num_trees` counts subtree entries (direct for leaves, aggregated over
/// children for inner nodes). Structurally identical trees always encode
/// and hash identically, so equal subtrees deduplicate in the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevTree {
    size: u64,
    num_trees: u32,
    trees: Vec<Node>,
    features: Vec<Node>,
    buckets: BTreeMap<u8, TreeBucket>,
}

static EMPTY_TREE_ID: OnceLock<ObjectId> = OnceLock::new();

impl RevTree {
    /// The empty tree.
    pub fn empty() -> Self {
        Self {
            size: 0,
            num_trees: 0,
            trees: Vec::new(),
            features: Vec::new(),
            buckets: BTreeMap::new(),
        }
    }

    /// The id of the empty tree.
    pub fn empty_tree_id() -> ObjectId {
        *EMPTY_TREE_ID.get_or_init(|| RevTree::empty().id())
    }

    /// Build a leaf tree. Entries are put in canonical name order so the
    /// encoding is independent of input order. `size` is the transitive
    /// feature count (direct features plus features under subtree entries).
    pub fn leaf(size: u64, mut trees: Vec<Node>, mut features: Vec<Node>) -> Self {
        trees.sort_by(|a, b| CanonicalNodeOrder::compare(a.name(), b.name()));
        features.sort_by(|a, b| CanonicalNodeOrder::compare(a.name(), b.name()));
        let num_trees = trees.len() as u32;
        Self {
            size,
            num_trees,
            trees,
            features,
            buckets: BTreeMap::new(),
        }
    }

    /// Build an inner (bucket) tree.
    pub fn inner(size: u64, num_trees: u32, buckets: BTreeMap<u8, TreeBucket>) -> Self {
        Self {
            size,
            num_trees,
            trees: Vec::new(),
            features: Vec::new(),
            buckets,
        }
    }

    /// Build a tree from parts, rejecting the mixed leaf/bucket shape.
    pub fn build(
        size: u64,
        num_trees: u32,
        trees: Vec<Node>,
        features: Vec<Node>,
        buckets: BTreeMap<u8, TreeBucket>,
    ) -> ModelResult<Self> {
        if !buckets.is_empty() && (!trees.is_empty() || !features.is_empty()) {
            return Err(ModelError::MixedTree);
        }
        if buckets.is_empty() {
            Ok(Self::leaf(size, trees, features))
        } else {
            Ok(Self::inner(size, num_trees, buckets))
        }
    }

    /// The content-addressed id of this tree's canonical encoding.
    pub fn id(&self) -> ObjectId {
        hash::hash_tree(self)
    }

    /// Total number of feature entries reachable transitively.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of subtree entries (direct or aggregated through buckets).
    pub fn num_trees(&self) -> u32 {
        self.num_trees
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0 && self.num_trees == 0 && self.buckets.is_empty()
    }

    /// Returns `true` when this node holds direct entries (no buckets).
    pub fn is_leaf(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Direct subtree entries of a leaf node.
    pub fn trees(&self) -> &[Node] {
        &self.trees
    }

    /// Direct feature entries of a leaf node.
    pub fn features(&self) -> &[Node] {
        &self.features
    }

    /// The sparse bucket map of an inner node.
    pub fn buckets(&self) -> &BTreeMap<u8, TreeBucket> {
        &self.buckets
    }

    pub fn bucket(&self, index: u8) -> Option<&TreeBucket> {
        self.buckets.get(&index)
    }

    /// Find a direct subtree entry by name.
    pub fn find_tree(&self, name: &str) -> Option<&Node> {
        self.trees.iter().find(|n| n.name() == name)
    }

    /// Find a direct feature entry by name.
    pub fn find_feature(&self, name: &str) -> Option<&Node> {
        self.features.iter().find(|n| n.name() == name)
    }

    /// The union envelope over everything directly referenced by this
    /// node: feature bounds, subtree bounds, and bucket bounds.
    pub fn aggregate_bounds(&self) -> Option<Envelope> {
        let mut env = Envelope::empty();
        for n in self.features.iter().chain(self.trees.iter()) {
            if let Some(b) = n.bounds() {
                env.expand_to_include(b);
            }
        }
        for bucket in self.buckets.values() {
            if let Some(b) = &bucket.bounds {
                env.expand_to_include(b);
            }
        }
        if env.is_empty() {
            None
        } else {
            Some(env)
        }
    }
}

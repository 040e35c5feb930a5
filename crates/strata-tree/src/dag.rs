//! The in-memory DAG of pending tree changes.
//!
//! While a build session is open, mutations accumulate in a graph of
//! [`Dag`] nodes layered over the original persisted tree. A `Dag` mirrors
//! one (existing or would-be) tree node; it is identified by the
//! [`TreeId`] path of bucket indices leading to it from the root. Only at
//! flush time is the DAG materialized into immutable
//! [`RevTree`](strata_model::RevTree)s. This keeps staging mutability
//! completely separate from committed immutability.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use strata_model::Envelope;
use strata_types::ObjectId;

/// Path of bucket indices identifying one DAG node. The root is the empty
/// path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeId(Vec<u8>);

impl TreeId {
    /// The root path.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_path(path: Vec<u8>) -> Self {
        Self(path)
    }

    /// The path one level deeper, through the given bucket.
    pub fn child(&self, bucket: u8) -> Self {
        let mut path = self.0.clone();
        path.push(bucket);
        Self(path)
    }

    /// Depth of the node this path leads to; the root is at depth 0.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// The bucket index under the node's immediate parent.
    pub fn leaf_bucket(&self) -> Option<u8> {
        self.0.last().copied()
    }

    pub fn bucket_at(&self, depth_index: usize) -> Option<u8> {
        self.0.get(depth_index).copied()
    }

    /// Whether any path component equals the given bucket index.
    pub fn contains(&self, bucket: u8) -> bool {
        self.0.contains(&bucket)
    }

    pub fn path(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreeId{:?}", self.0)
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// The clustering key of one staged node: its name plus the envelope the
/// spatial strategy places it by. Canonical clustering carries no
/// envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeId {
    name: String,
    bounds: Option<Envelope>,
}

impl NodeId {
    pub fn new(name: impl Into<String>, bounds: Option<Envelope>) -> Self {
        Self {
            name: name.into(),
            bounds,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bounds(&self) -> Option<&Envelope> {
        self.bounds.as_ref()
    }
}

/// Lifecycle of a DAG node relative to the original tree it shadows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DagState {
    /// Created, original tree not loaded yet.
    Initialized,
    /// Mirrors the original tree's structure, no changes applied.
    Mirrored,
    /// Holds changes; must be rebuilt at flush time.
    Changed,
}

/// One mutable node of the pending-change DAG.
///
/// Either holds direct children (keyed by name, so a re-put of the same
/// name replaces the staged entry) or bucket references, mirroring the
/// leaf/inner split of the persisted tree.
#[derive(Clone, Debug)]
pub struct Dag {
    id: TreeId,
    /// Id of the persisted tree this DAG shadows; the empty-tree id for
    /// brand new subtrees.
    original: ObjectId,
    state: DagState,
    children: HashMap<String, NodeId>,
    buckets: BTreeSet<TreeId>,
    /// Features plus subtrees reachable through this node.
    total_child_count: i64,
}

impl Dag {
    pub fn new(id: TreeId, original: ObjectId) -> Self {
        Self {
            id,
            original,
            state: DagState::Initialized,
            children: HashMap::new(),
            buckets: BTreeSet::new(),
            total_child_count: 0,
        }
    }

    pub fn id(&self) -> &TreeId {
        &self.id
    }

    pub fn original_tree_id(&self) -> ObjectId {
        self.original
    }

    pub fn state(&self) -> DagState {
        self.state
    }

    pub fn set_mirrored(&mut self) {
        self.state = DagState::Mirrored;
    }

    pub fn set_changed(&mut self) {
        self.state = DagState::Changed;
    }

    /// Forget all structure and shadow a different original tree.
    pub fn reset(&mut self, original: ObjectId) {
        self.original = original;
        self.state = DagState::Initialized;
        self.children.clear();
        self.buckets.clear();
        self.total_child_count = 0;
    }

    // -- children -----------------------------------------------------------

    /// Stage a child, replacing any staged entry of the same name.
    /// Returns `true` when the name was not present before.
    pub fn add_child(&mut self, node_id: NodeId) -> bool {
        self.children.insert(node_id.name().to_string(), node_id).is_none()
    }

    /// Unstage a child by name. Returns `true` when it was present.
    pub fn remove_child(&mut self, name: &str) -> bool {
        self.children.remove(name).is_some()
    }

    pub fn children_count(&self) -> usize {
        self.children.len()
    }

    pub fn children(&self) -> impl Iterator<Item = &NodeId> {
        self.children.values()
    }

    pub fn clear_children(&mut self) {
        self.children.clear();
    }

    // -- buckets ------------------------------------------------------------

    pub fn add_bucket(&mut self, bucket: TreeId) {
        self.buckets.insert(bucket);
    }

    pub fn remove_bucket(&mut self, bucket: &TreeId) -> bool {
        self.buckets.remove(bucket)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn buckets(&self) -> impl Iterator<Item = &TreeId> {
        self.buckets.iter()
    }

    pub fn bucket_list(&self) -> Vec<TreeId> {
        self.buckets.iter().cloned().collect()
    }

    pub fn clear_buckets(&mut self) {
        self.buckets.clear();
    }

    // -- counters -----------------------------------------------------------

    pub fn total_child_count(&self) -> i64 {
        self.total_child_count
    }

    pub fn set_total_child_count(&mut self, count: i64) {
        self.total_child_count = count;
    }
}

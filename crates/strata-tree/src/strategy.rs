//! Clustering strategies: the pluggable policy deciding where a node
//! lives inside a tree.
//!
//! A strategy maps each staged node to a [`NodeId`] clustering key and
//! places keys into buckets per depth. The same entry set under the same
//! strategy configuration always builds to the same tree, whatever the
//! insertion order.

use strata_model::{CanonicalNodeOrder, Envelope, Node, NodeKind};

use crate::dag::{NodeId, TreeId};
use crate::error::{TreeError, TreeResult};
use crate::quad::quadrant_at;

/// Where a clustering key lands at one depth.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// The bucket index at that depth.
    Bucket(u8),
    /// The key cannot be pushed down to that depth (spatial bounds cross
    /// a quadrant boundary, or the maximum depth is exhausted).
    Unpromotable,
}

/// Policy that defines the internal structure of a tree under
/// construction.
///
/// Strategies are pure placement policy; all mutable build state lives in
/// the pending-change DAG.
pub trait ClusteringStrategy: Send {
    /// The clustering key for a node, or `None` when the node is not
    /// clustered at all (e.g. a feature without bounds offered to a
    /// spatial strategy configured to reject such features).
    fn compute_id(&self, node: &Node) -> Option<NodeId>;

    /// Placement of a key at a depth index.
    fn placement(&self, node_id: &NodeId, depth_index: usize) -> Placement;

    /// The bucket index that collects unpromotable keys, for strategies
    /// that keep them in a dedicated subtree.
    fn unpromotable_bucket(&self) -> Option<u8>;

    /// How many entries a leaf at the given depth may hold before it
    /// splits into buckets.
    fn normalized_size_limit(&self, depth_index: usize) -> usize;

    /// Validity guard applied to every node offered to the builder.
    fn check_node(&self, _node: &Node) -> TreeResult<()> {
        Ok(())
    }
}

/// The full bucket path of a key down to `child_depth` levels.
///
/// When the strategy reports the key unpromotable partway down, the path
/// continues through the strategy's unpromotable bucket and then clusters
/// canonically by name below it. Returns `None` when no deeper placement
/// exists, in which case the key stays in its current leaf regardless of
/// the leaf's size.
pub fn compute_bucket_path(
    strategy: &dyn ClusteringStrategy,
    node_id: &NodeId,
    child_depth: usize,
) -> Option<TreeId> {
    let mut path = Vec::with_capacity(child_depth);
    let mut depth_index = 0;
    while path.len() < child_depth {
        match strategy.placement(node_id, depth_index) {
            Placement::Bucket(bucket) => {
                path.push(bucket);
                depth_index += 1;
            }
            Placement::Unpromotable => {
                let unpromotable = strategy.unpromotable_bucket()?;
                path.push(unpromotable);
                let mut canonical_depth = 0;
                while path.len() < child_depth {
                    if canonical_depth >= strata_model::order::MAX_DEPTH {
                        return None;
                    }
                    path.push(CanonicalNodeOrder::bucket(node_id.name(), canonical_depth));
                    canonical_depth += 1;
                }
            }
        }
    }
    Some(TreeId::from_path(path))
}

// ---------------------------------------------------------------------------
// Canonical
// ---------------------------------------------------------------------------

/// Name-ordered clustering: nodes are placed by successive bytes of the
/// FNV-1a hash of their name, per [`CanonicalNodeOrder`]. Identical entry
/// sets always produce bit-identical trees irrespective of insertion
/// order, and a single mutation touches only the `O(log n)` subtrees on
/// its placement path.
#[derive(Clone, Copy, Debug, Default)]
pub struct CanonicalStrategy;

impl ClusteringStrategy for CanonicalStrategy {
    fn compute_id(&self, node: &Node) -> Option<NodeId> {
        Some(NodeId::new(node.name(), node.bounds().copied()))
    }

    fn placement(&self, node_id: &NodeId, depth_index: usize) -> Placement {
        if depth_index >= strata_model::order::MAX_DEPTH {
            // Names colliding on every hash byte stay together in a leaf.
            return Placement::Unpromotable;
        }
        Placement::Bucket(CanonicalNodeOrder::bucket(node_id.name(), depth_index))
    }

    fn unpromotable_bucket(&self) -> Option<u8> {
        None
    }

    fn normalized_size_limit(&self, depth_index: usize) -> usize {
        CanonicalNodeOrder::normalized_size_limit(depth_index)
    }
}

// ---------------------------------------------------------------------------
// QuadTree
// ---------------------------------------------------------------------------

/// What to do with a feature that has no usable bounding envelope.
///
/// The policy is fixed at strategy construction, never inferred per call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingBoundsPolicy {
    /// Leave the feature out of the spatial tree entirely.
    #[default]
    Reject,
    /// Keep the feature in the unpromotable subtree hanging off the
    /// root, clustered canonically by name.
    RootLeaf,
}

/// Configuration of a quad-tree clustering session.
#[derive(Clone, Debug)]
pub struct QuadTreeConfig {
    /// The fixed envelope recursively subdivided into quadrants.
    pub max_bounds: Envelope,
    /// Maximum quadrant nesting depth; deeper nodes go unpromotable.
    pub max_depth: usize,
    pub missing_bounds: MissingBoundsPolicy,
}

impl Default for QuadTreeConfig {
    fn default() -> Self {
        Self {
            max_bounds: Envelope::world(),
            max_depth: 12,
            missing_bounds: MissingBoundsPolicy::Reject,
        }
    }
}

/// Spatial clustering: each feature is placed in the smallest quadrant of
/// a fixed bounding envelope that fully contains its bounds, down to a
/// maximum depth. A feature crossing a quadrant boundary at some level is
/// *unpromotable* below it and lands in a dedicated fifth bucket,
/// clustered canonically by name from there on.
#[derive(Clone, Debug)]
pub struct QuadTreeStrategy {
    config: QuadTreeConfig,
}

/// Bucket index of the unpromotable subtree, right after the four
/// quadrant buckets.
pub const UNPROMOTABLE_BUCKET: u8 = 4;

impl QuadTreeStrategy {
    pub fn new(config: QuadTreeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QuadTreeConfig {
        &self.config
    }
}

impl ClusteringStrategy for QuadTreeStrategy {
    fn compute_id(&self, node: &Node) -> Option<NodeId> {
        match node.bounds() {
            Some(bounds) if !bounds.is_empty() => {
                Some(NodeId::new(node.name(), Some(*bounds)))
            }
            _ => match self.config.missing_bounds {
                MissingBoundsPolicy::Reject => None,
                MissingBoundsPolicy::RootLeaf => Some(NodeId::new(node.name(), None)),
            },
        }
    }

    fn placement(&self, node_id: &NodeId, depth_index: usize) -> Placement {
        if depth_index >= self.config.max_depth {
            return Placement::Unpromotable;
        }
        let bounds = match node_id.bounds() {
            Some(b) => b,
            None => return Placement::Unpromotable,
        };
        match quadrant_at(&self.config.max_bounds, bounds, depth_index) {
            Some(quadrant) => Placement::Bucket(quadrant.bucket()),
            None => Placement::Unpromotable,
        }
    }

    fn unpromotable_bucket(&self) -> Option<u8> {
        Some(UNPROMOTABLE_BUCKET)
    }

    fn normalized_size_limit(&self, _depth_index: usize) -> usize {
        128
    }

    fn check_node(&self, node: &Node) -> TreeResult<()> {
        if node.kind() != NodeKind::Feature {
            return Err(TreeError::NonFeatureNode {
                name: node.name().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::ObjectId;

    fn feature(name: &str, x: f64, y: f64) -> Node {
        Node::feature(name, ObjectId::hash_of(name.as_bytes()))
            .with_bounds(Envelope::point(x, y))
    }

    // ---- canonical ----

    #[test]
    fn canonical_placement_follows_name_hash() {
        let strategy = CanonicalStrategy;
        let id = strategy
            .compute_id(&Node::feature("f1", ObjectId::hash_of(b"f1")))
            .unwrap();
        for depth in 0..strata_model::order::MAX_DEPTH {
            assert_eq!(
                strategy.placement(&id, depth),
                Placement::Bucket(CanonicalNodeOrder::bucket("f1", depth))
            );
        }
        assert_eq!(
            strategy.placement(&id, strata_model::order::MAX_DEPTH),
            Placement::Unpromotable
        );
    }

    #[test]
    fn canonical_path_is_the_bucket_sequence() {
        let strategy = CanonicalStrategy;
        let id = NodeId::new("roads/17", None);
        let path = compute_bucket_path(&strategy, &id, 3).unwrap();
        assert_eq!(path.depth(), 3);
        for depth in 0..3 {
            assert_eq!(
                path.bucket_at(depth),
                Some(CanonicalNodeOrder::bucket("roads/17", depth))
            );
        }
    }

    #[test]
    fn canonical_path_beyond_max_depth_is_none() {
        let strategy = CanonicalStrategy;
        let id = NodeId::new("x", None);
        assert!(compute_bucket_path(&strategy, &id, strata_model::order::MAX_DEPTH + 1).is_none());
    }

    // ---- quadtree ----

    #[test]
    fn quadtree_places_by_quadrant() {
        let strategy = QuadTreeStrategy::new(QuadTreeConfig::default());
        let ne = strategy.compute_id(&feature("a", 1.0, 1.0)).unwrap();
        let sw = strategy.compute_id(&feature("b", -170.0, -80.0)).unwrap();
        assert_eq!(strategy.placement(&ne, 0), Placement::Bucket(2));
        assert_eq!(strategy.placement(&sw, 0), Placement::Bucket(0));
    }

    #[test]
    fn quadtree_unpromotable_beyond_max_depth() {
        let strategy = QuadTreeStrategy::new(QuadTreeConfig {
            max_depth: 2,
            ..QuadTreeConfig::default()
        });
        let id = strategy.compute_id(&feature("a", 1.0, 1.0)).unwrap();
        assert!(matches!(strategy.placement(&id, 1), Placement::Bucket(_)));
        assert_eq!(strategy.placement(&id, 2), Placement::Unpromotable);
    }

    #[test]
    fn boundary_straddling_bounds_go_to_the_extra_bucket() {
        let strategy = QuadTreeStrategy::new(QuadTreeConfig::default());
        let node = Node::feature("wide", ObjectId::hash_of(b"wide"))
            .with_bounds(Envelope::new(-1.0, 1.0, -1.0, 1.0));
        let id = strategy.compute_id(&node).unwrap();
        assert_eq!(strategy.placement(&id, 0), Placement::Unpromotable);

        let path = compute_bucket_path(&strategy, &id, 2).unwrap();
        assert_eq!(path.bucket_at(0), Some(UNPROMOTABLE_BUCKET));
        assert_eq!(path.bucket_at(1), Some(CanonicalNodeOrder::bucket("wide", 0)));
    }

    #[test]
    fn reject_policy_drops_boundless_features() {
        let strategy = QuadTreeStrategy::new(QuadTreeConfig::default());
        let node = Node::feature("nogeom", ObjectId::hash_of(b"nogeom"));
        assert!(strategy.compute_id(&node).is_none());
    }

    #[test]
    fn root_leaf_policy_keeps_boundless_features() {
        let strategy = QuadTreeStrategy::new(QuadTreeConfig {
            missing_bounds: MissingBoundsPolicy::RootLeaf,
            ..QuadTreeConfig::default()
        });
        let node = Node::feature("nogeom", ObjectId::hash_of(b"nogeom"));
        let id = strategy.compute_id(&node).unwrap();
        assert!(id.bounds().is_none());
        assert_eq!(strategy.placement(&id, 0), Placement::Unpromotable);
    }

    #[test]
    fn quadtree_rejects_tree_nodes() {
        let strategy = QuadTreeStrategy::new(QuadTreeConfig::default());
        let err = strategy
            .check_node(&Node::tree("sub", ObjectId::hash_of(b"sub")))
            .unwrap_err();
        assert!(matches!(err, TreeError::NonFeatureNode { .. }));
    }
}

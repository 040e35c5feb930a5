//! Building index trees that mirror canonical feature trees.

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_model::{Node, RevFeatureType, RevTree, Value};
use strata_store::ObjectStore;
use strata_tree::{diff_trees, QuadTreeConfig, RevTreeBuilder};
use strata_types::ObjectId;
use tracing::debug;

use crate::error::{IndexError, IndexResult};
use crate::info::{IndexInfo, IndexType};

/// Sink for progress reports from long-running index builds.
///
/// Implementations must tolerate being called from the building thread at
/// snapshot granularity.
pub trait ProgressListener: Send + Sync {
    fn progress(&self, _completed: u64) {}
}

/// A listener that ignores progress.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopProgress;

impl ProgressListener for NoopProgress {}

/// Find a named subtree entry in a root tree, descending canonical
/// buckets by the name's hash so only one path is loaded.
pub fn find_tree_node(
    store: &dyn ObjectStore,
    root: &RevTree,
    name: &str,
) -> IndexResult<Option<Node>> {
    let node = strata_tree::find_node(store, root, name)?;
    Ok(node.filter(|n| n.kind() == strata_model::NodeKind::Tree))
}

/// Build (or incrementally update) the index tree mirroring one canonical
/// tree version.
///
/// Starts from `old_indexed` (the snapshot built for `old_canonical`, or
/// the empty tree) and applies the canonical diff `old_canonical ->
/// new_canonical`, so unchanged subtrees of the index are reused.
/// Returns the id of the built index tree.
pub(crate) fn build_index_tree(
    objects: &Arc<dyn ObjectStore>,
    info: &IndexInfo,
    ftype: &RevFeatureType,
    old_canonical: ObjectId,
    new_canonical: ObjectId,
    old_indexed: ObjectId,
) -> IndexResult<ObjectId> {
    let original = objects.get_tree(&old_indexed)?;
    let mut builder = match info.index_type {
        IndexType::QuadTree => RevTreeBuilder::quadtree(
            Arc::clone(objects),
            original,
            QuadTreeConfig {
                max_bounds: info.bounds.unwrap_or_else(strata_model::Envelope::world),
                ..QuadTreeConfig::default()
            },
        ),
        IndexType::Attribute => RevTreeBuilder::canonical(Arc::clone(objects), original),
    };

    let changes = diff_trees(objects.as_ref(), &old_canonical, &new_canonical)?;
    for change in changes {
        match (change.old, change.new) {
            (Some(old), None) => {
                builder.remove(&old)?;
            }
            (None, Some(new)) => {
                builder.put(decorate(objects, info, ftype, &new)?)?;
            }
            (Some(old), Some(new)) => {
                builder.update(&old, decorate(objects, info, ftype, &new)?)?;
            }
            (None, None) => {}
        }
    }

    let tree = builder.build()?;
    debug!(
        tree = info.tree_name,
        attribute = info.attribute,
        indexed = %tree.id().short_hex(),
        "built index tree"
    );
    Ok(tree.id())
}

/// Attach the index's extra materialized attribute values to a node.
fn decorate(
    objects: &Arc<dyn ObjectStore>,
    info: &IndexInfo,
    ftype: &RevFeatureType,
    node: &Node,
) -> IndexResult<Node> {
    if info.extra_attributes.is_empty() {
        return Ok(node.clone());
    }
    let feature = objects.get_feature(&node.object_id())?;
    let mut extra = BTreeMap::new();
    for attribute in &info.extra_attributes {
        let (position, _) =
            ftype
                .descriptor(attribute)
                .ok_or_else(|| IndexError::InvalidAttribute {
                    tree: info.tree_name.clone(),
                    attribute: attribute.clone(),
                    reason: "not a descriptor of the tree's schema".to_string(),
                })?;
        let value = feature.get(position).cloned().unwrap_or(Value::Null);
        extra.insert(attribute.clone(), value);
    }
    Ok(node.clone().with_extra(extra))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_store::InMemoryObjectStore;

    fn store() -> Arc<InMemoryObjectStore> {
        Arc::new(InMemoryObjectStore::new())
    }

    /// A persisted single-feature layer tree, so root trees referencing
    /// it can be built (leaf sizes aggregate over real subtrees).
    fn layer(store: &Arc<InMemoryObjectStore>, name: &str) -> ObjectId {
        let mut builder = RevTreeBuilder::canonical(Arc::clone(store) as _, RevTree::empty());
        builder
            .put(Node::feature(
                format!("{name}/f"),
                ObjectId::hash_of(name.as_bytes()),
            ))
            .unwrap();
        builder.build().unwrap().id()
    }

    fn build_root(store: &Arc<InMemoryObjectStore>, layers: &[(&str, ObjectId)]) -> RevTree {
        let mut builder =
            RevTreeBuilder::canonical(Arc::clone(store) as _, RevTree::empty());
        for (name, id) in layers {
            builder.put(Node::tree(*name, *id)).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn find_tree_node_in_leaf_root() {
        let s = store();
        let roads = layer(&s, "roads");
        let parcels = layer(&s, "parcels");
        let root = build_root(&s, &[("roads", roads), ("parcels", parcels)]);

        let found = find_tree_node(s.as_ref(), &root, "roads").unwrap().unwrap();
        assert_eq!(found.object_id(), roads);
        assert!(find_tree_node(s.as_ref(), &root, "rivers").unwrap().is_none());
    }

    #[test]
    fn find_tree_node_ignores_feature_entries() {
        let s = store();
        let roads = layer(&s, "roads");
        let mut builder =
            RevTreeBuilder::canonical(Arc::clone(&s) as _, RevTree::empty());
        builder.put(Node::tree("roads", roads)).unwrap();
        builder
            .put(Node::feature("loose", ObjectId::hash_of(b"loose")))
            .unwrap();
        let root = builder.build().unwrap();

        assert!(find_tree_node(s.as_ref(), &root, "roads").unwrap().is_some());
        assert!(find_tree_node(s.as_ref(), &root, "loose").unwrap().is_none());
    }

    #[test]
    fn find_tree_node_descends_bucket_roots() {
        let s = store();
        // Enough layers to split the root tree into buckets.
        let layers: Vec<(String, ObjectId)> = (0..600)
            .map(|i| {
                let name = format!("layer{i}");
                let id = layer(&s, &name);
                (name, id)
            })
            .collect();
        let mut builder =
            RevTreeBuilder::canonical(Arc::clone(&s) as _, RevTree::empty());
        for (name, id) in &layers {
            builder.put(Node::tree(name, *id)).unwrap();
        }
        let root = builder.build().unwrap();
        assert!(!root.is_leaf());

        let found = find_tree_node(s.as_ref(), &root, "layer123")
            .unwrap()
            .unwrap();
        assert_eq!(found.object_id(), layers[123].1);
        assert!(find_tree_node(s.as_ref(), &root, "layer9999").unwrap().is_none());
    }
}

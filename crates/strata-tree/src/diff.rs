//! Structural diff of two persisted trees.
//!
//! Because canonical placement puts a given name in the same bucket at
//! every depth, two tree generations can be compared bucket-by-bucket:
//! buckets with equal ids are skipped wholesale, so the cost of a diff is
//! proportional to the change set, not the tree size. Subtree entries are
//! recursed into, producing path-qualified feature entries
//! (`layer/feature`).

use std::collections::{BTreeMap, BTreeSet};

use strata_model::{Node, NodeKind, RevTree};
use strata_store::ObjectStore;
use strata_types::ObjectId;

use crate::error::TreeResult;

/// One feature-level difference between two trees.
#[derive(Clone, Debug, PartialEq)]
pub struct DiffEntry {
    /// Path of the entry, qualified by the subtrees leading to it.
    pub path: String,
    /// State on the left side, `None` when added.
    pub old: Option<Node>,
    /// State on the right side, `None` when removed.
    pub new: Option<Node>,
}

impl DiffEntry {
    pub fn is_add(&self) -> bool {
        self.old.is_none() && self.new.is_some()
    }

    pub fn is_remove(&self) -> bool {
        self.old.is_some() && self.new.is_none()
    }

    pub fn is_change(&self) -> bool {
        self.old.is_some() && self.new.is_some()
    }

    /// The unqualified entry name (last path segment).
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Compare two trees by id and collect every feature-level difference.
pub fn diff_trees(
    store: &dyn ObjectStore,
    left: &ObjectId,
    right: &ObjectId,
) -> TreeResult<Vec<DiffEntry>> {
    let mut out = Vec::new();
    if left == right {
        return Ok(out);
    }
    let left = store.get_tree(left)?;
    let right = store.get_tree(right)?;
    diff_level(store, &left, &right, "", &mut out)?;
    Ok(out)
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

fn diff_level(
    store: &dyn ObjectStore,
    left: &RevTree,
    right: &RevTree,
    prefix: &str,
    out: &mut Vec<DiffEntry>,
) -> TreeResult<()> {
    // Bucket-wise comparison while both sides are inner nodes: equal
    // buckets are skipped without being loaded.
    if !left.is_leaf() && !right.is_leaf() {
        let mut indices: BTreeSet<u8> = left.buckets().keys().copied().collect();
        indices.extend(right.buckets().keys().copied());

        let empty = RevTree::empty_tree_id();
        for index in indices {
            let left_id = left.bucket(index).map(|b| b.object_id).unwrap_or(empty);
            let right_id = right.bucket(index).map(|b| b.object_id).unwrap_or(empty);
            if left_id == right_id {
                continue;
            }
            let left_child = store.get_tree(&left_id)?;
            let right_child = store.get_tree(&right_id)?;
            diff_level(store, &left_child, &right_child, prefix, out)?;
        }
        return Ok(());
    }

    // Shapes differ or both are leaves: compare the flattened name maps
    // of this level.
    let left_entries = flatten(store, left)?;
    let right_entries = flatten(store, right)?;

    for (name, left_node) in &left_entries {
        match right_entries.get(name) {
            Some(right_node) => {
                if left_node == right_node {
                    continue;
                }
                match (left_node.kind(), right_node.kind()) {
                    (NodeKind::Tree, NodeKind::Tree) => {
                        if left_node.object_id() != right_node.object_id() {
                            let sub =
                                diff_trees(store, &left_node.object_id(), &right_node.object_id())?;
                            let nested = join(prefix, name);
                            out.extend(sub.into_iter().map(|e| DiffEntry {
                                path: join(&nested, &e.path),
                                ..e
                            }));
                        }
                    }
                    (NodeKind::Feature, NodeKind::Feature) => out.push(DiffEntry {
                        path: join(prefix, name),
                        old: Some(left_node.clone()),
                        new: Some(right_node.clone()),
                    }),
                    // Kind flipped: report as removal plus addition.
                    _ => {
                        emit_side(store, left_node, prefix, false, out)?;
                        emit_side(store, right_node, prefix, true, out)?;
                    }
                }
            }
            None => emit_side(store, left_node, prefix, false, out)?,
        }
    }

    for (name, right_node) in &right_entries {
        if !left_entries.contains_key(name) {
            emit_side(store, right_node, prefix, true, out)?;
        }
    }

    Ok(())
}

/// Emit one whole node as added (`as_new`) or removed, expanding subtree
/// nodes into their nested feature entries.
fn emit_side(
    store: &dyn ObjectStore,
    node: &Node,
    prefix: &str,
    as_new: bool,
    out: &mut Vec<DiffEntry>,
) -> TreeResult<()> {
    match node.kind() {
        NodeKind::Feature => {
            let (old, new) = if as_new {
                (None, Some(node.clone()))
            } else {
                (Some(node.clone()), None)
            };
            out.push(DiffEntry {
                path: join(prefix, node.name()),
                old,
                new,
            });
        }
        NodeKind::Tree => {
            let empty = RevTree::empty_tree_id();
            let (left_id, right_id) = if as_new {
                (empty, node.object_id())
            } else {
                (node.object_id(), empty)
            };
            let sub = diff_trees(store, &left_id, &right_id)?;
            let nested = join(prefix, node.name());
            out.extend(sub.into_iter().map(|e| DiffEntry {
                path: join(&nested, &e.path),
                ..e
            }));
        }
    }
    Ok(())
}

/// Find a named entry (feature or subtree) in a tree, descending
/// canonical buckets by the name's hash so only one path is loaded.
pub fn find_node(
    store: &dyn ObjectStore,
    tree: &RevTree,
    name: &str,
) -> TreeResult<Option<Node>> {
    find_node_at(store, tree, name, 0)
}

fn find_node_at(
    store: &dyn ObjectStore,
    tree: &RevTree,
    name: &str,
    depth: usize,
) -> TreeResult<Option<Node>> {
    if tree.is_leaf() {
        return Ok(tree
            .find_tree(name)
            .or_else(|| tree.find_feature(name))
            .cloned());
    }
    let bucket_index = strata_model::CanonicalNodeOrder::bucket(name, depth);
    match tree.bucket(bucket_index) {
        Some(bucket) => {
            let child = store.get_tree(&bucket.object_id)?;
            find_node_at(store, &child, name, depth + 1)
        }
        None => Ok(None),
    }
}

/// Resolve a `/`-separated entry path from a root tree, following
/// subtree nodes segment by segment.
pub fn find_path(
    store: &dyn ObjectStore,
    root: &ObjectId,
    path: &str,
) -> TreeResult<Option<Node>> {
    let mut tree = store.get_tree(root)?;
    let mut segments = path.split('/').peekable();
    while let Some(segment) = segments.next() {
        let node = match find_node(store, &tree, segment)? {
            Some(node) => node,
            None => return Ok(None),
        };
        if segments.peek().is_none() {
            return Ok(Some(node));
        }
        if node.kind() != NodeKind::Tree {
            return Ok(None);
        }
        tree = store.get_tree(&node.object_id())?;
    }
    Ok(None)
}

/// The complete name -> node map of one tree level, walking through
/// buckets.
fn flatten(store: &dyn ObjectStore, tree: &RevTree) -> TreeResult<BTreeMap<String, Node>> {
    let mut entries = BTreeMap::new();
    collect(store, tree, &mut entries)?;
    Ok(entries)
}

fn collect(
    store: &dyn ObjectStore,
    tree: &RevTree,
    entries: &mut BTreeMap<String, Node>,
) -> TreeResult<()> {
    if tree.is_leaf() {
        for node in tree.trees().iter().chain(tree.features().iter()) {
            entries.insert(node.name().to_string(), node.clone());
        }
        return Ok(());
    }
    for bucket in tree.buckets().values() {
        let child = store.get_tree(&bucket.object_id)?;
        collect(store, &child, entries)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RevTreeBuilder;
    use std::sync::Arc;
    use strata_store::InMemoryObjectStore;

    fn store() -> Arc<InMemoryObjectStore> {
        Arc::new(InMemoryObjectStore::new())
    }

    fn feature(name: &str) -> Node {
        Node::feature(name, ObjectId::hash_of(name.as_bytes()))
    }

    fn build(store: &Arc<InMemoryObjectStore>, names: &[&str]) -> RevTree {
        let mut builder =
            RevTreeBuilder::canonical(Arc::clone(store) as _, RevTree::empty());
        for name in names {
            builder.put(feature(name)).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn equal_trees_have_no_diff() {
        let s = store();
        let t = build(&s, &["a", "b"]);
        assert!(diff_trees(s.as_ref(), &t.id(), &t.id()).unwrap().is_empty());
    }

    #[test]
    fn leaf_add_remove_change() {
        let s = store();
        let old = build(&s, &["keep", "gone", "mod"]);

        let mut builder = RevTreeBuilder::canonical(Arc::clone(&s) as _, old.clone());
        builder.remove(&feature("gone")).unwrap();
        let modified = feature("mod").update(ObjectId::hash_of(b"new content"));
        builder.update(&feature("mod"), modified).unwrap();
        builder.put(feature("fresh")).unwrap();
        let new = builder.build().unwrap();

        let mut diff = diff_trees(s.as_ref(), &old.id(), &new.id()).unwrap();
        diff.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(diff.len(), 3);
        let by_path: BTreeMap<&str, &DiffEntry> =
            diff.iter().map(|e| (e.path.as_str(), e)).collect();
        assert!(by_path["gone"].is_remove());
        assert!(by_path["fresh"].is_add());
        assert!(by_path["mod"].is_change());
        assert!(!by_path.contains_key("keep"));
    }

    #[test]
    fn nested_subtree_changes_get_qualified_paths() {
        let s = store();
        let layer_old = build(&s, &["f1", "f2"]);
        let layer_new = {
            let mut b = RevTreeBuilder::canonical(Arc::clone(&s) as _, layer_old.clone());
            b.put(feature("f3")).unwrap();
            b.build().unwrap()
        };

        let root_old = {
            let mut b = RevTreeBuilder::canonical(Arc::clone(&s) as _, RevTree::empty());
            b.put(Node::tree("roads", layer_old.id())).unwrap();
            b.build().unwrap()
        };
        let root_new = {
            let mut b = RevTreeBuilder::canonical(Arc::clone(&s) as _, RevTree::empty());
            b.put(Node::tree("roads", layer_new.id())).unwrap();
            b.build().unwrap()
        };

        let diff = diff_trees(s.as_ref(), &root_old.id(), &root_new.id()).unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].path, "roads/f3");
        assert!(diff[0].is_add());
        assert_eq!(diff[0].name(), "f3");
    }

    #[test]
    fn removed_subtree_expands_to_feature_removals() {
        let s = store();
        let layer = build(&s, &["f1", "f2"]);
        let root_old = {
            let mut b = RevTreeBuilder::canonical(Arc::clone(&s) as _, RevTree::empty());
            b.put(Node::tree("roads", layer.id())).unwrap();
            b.build().unwrap()
        };
        let root_new = RevTree::empty();
        s.put(&strata_model::RevObject::Tree(root_new.clone())).unwrap();

        let mut diff = diff_trees(s.as_ref(), &root_old.id(), &root_new.id()).unwrap();
        diff.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(diff.len(), 2);
        assert_eq!(diff[0].path, "roads/f1");
        assert!(diff.iter().all(DiffEntry::is_remove));
    }

    #[test]
    fn bucket_trees_diff_by_change_set() {
        let s = store();
        let names: Vec<String> = (0..600).map(|i| format!("feature.{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let old = build(&s, &refs);

        let mut builder = RevTreeBuilder::canonical(Arc::clone(&s) as _, old.clone());
        builder.put(feature("one-more")).unwrap();
        let new = builder.build().unwrap();

        let diff = diff_trees(s.as_ref(), &old.id(), &new.id()).unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].path, "one-more");
        assert!(diff[0].is_add());
    }

    #[test]
    fn leaf_versus_bucket_shapes_compare() {
        let s = store();
        let small = build(&s, &["feature.0", "feature.1"]);
        let names: Vec<String> = (0..600).map(|i| format!("feature.{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let big = build(&s, &refs);

        let diff = diff_trees(s.as_ref(), &small.id(), &big.id()).unwrap();
        assert_eq!(diff.len(), 598);
        assert!(diff.iter().all(DiffEntry::is_add));
    }
}

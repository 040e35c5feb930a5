//! Materialization of a working DAG into persisted immutable trees.
//!
//! Flushing walks the DAG bottom-up. Changed nodes are rebuilt and
//! written to the store; untouched nodes resolve straight to the original
//! persisted tree they shadow, so unchanged subtrees are structurally
//! shared with the previous tree generation by id. Cancellation is
//! cooperative: the abort flag is polled at tree-node boundaries, and an
//! aborted flush returns `None` without promising anything about
//! partially written subtrees.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use strata_model::{Node, NodeKind, RevObject, RevTree, TreeBucket};
use tracing::debug;

use crate::dag::{DagState, TreeId};
use crate::error::{TreeError, TreeResult};
use crate::working::WorkingDag;

/// Shareable cooperative cancellation flag.
///
/// Long-running builds poll it at discrete node boundaries; in-flight
/// node construction always completes before cancellation is honored.
#[derive(Clone, Debug, Default)]
pub struct AbortFlag {
    cancelled: Arc<AtomicBool>,
}

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// A flag that is already cancelled, for abandoning builds.
    pub fn cancelled() -> Self {
        let flag = Self::new();
        flag.cancel();
        flag
    }
}

/// Flush the working DAG into a persisted [`RevTree`].
///
/// Returns `Ok(None)` when the abort flag was raised before completion.
/// On success, every subtree referenced by the result, transitively, has
/// been written to the builder's store.
pub(crate) fn flush(working: &WorkingDag, abort: &AbortFlag) -> TreeResult<Option<RevTree>> {
    let result = flush_tree(working, &TreeId::root(), abort)?;
    if let Some(tree) = &result {
        debug!(
            id = %tree.id().short_hex(),
            size = tree.size(),
            "flushed working dag"
        );
    }
    Ok(result)
}

fn flush_tree(
    working: &WorkingDag,
    tree_id: &TreeId,
    abort: &AbortFlag,
) -> TreeResult<Option<RevTree>> {
    if abort.is_cancelled() {
        return Ok(None);
    }
    let dag = match working.dag(tree_id) {
        Some(dag) => dag,
        None => return Ok(Some(RevTree::empty())),
    };

    match dag.state() {
        DagState::Changed => {
            let built = if dag.bucket_count() == 0 {
                build_leaf(working, tree_id)?
            } else {
                match build_buckets(working, tree_id, abort)? {
                    Some(tree) => tree,
                    None => return Ok(None),
                }
            };
            if abort.is_cancelled() {
                return Ok(None);
            }
            working.store().put(&RevObject::Tree(built.clone()))?;
            Ok(Some(built))
        }
        // Untouched: reuse the persisted original wholesale.
        DagState::Initialized | DagState::Mirrored => {
            let original = dag.original_tree_id();
            if original.is_null() || original == RevTree::empty_tree_id() {
                Ok(Some(RevTree::empty()))
            } else {
                Ok(Some(working.store().get_tree(&original)?))
            }
        }
    }
}

fn build_leaf(working: &WorkingDag, tree_id: &TreeId) -> TreeResult<RevTree> {
    let dag = working.dag(tree_id).expect("dag present");

    let mut trees: Vec<Node> = Vec::new();
    let mut features: Vec<Node> = Vec::new();
    for child in dag.children() {
        let node = working
            .node(child.name())
            .ok_or_else(|| TreeError::MissingNode {
                name: child.name().to_string(),
            })?;
        if node.object_id().is_null() {
            continue;
        }
        match node.kind() {
            NodeKind::Tree => trees.push(node.clone()),
            NodeKind::Feature => features.push(node.clone()),
        }
    }

    let mut size = features.len() as u64;
    for tree_node in &trees {
        let subtree = working.store().get_tree(&tree_node.object_id())?;
        size += subtree.size();
    }

    Ok(RevTree::leaf(size, trees, features))
}

fn build_buckets(
    working: &WorkingDag,
    tree_id: &TreeId,
    abort: &AbortFlag,
) -> TreeResult<Option<RevTree>> {
    let dag = working.dag(tree_id).expect("dag present");

    let mut size: u64 = 0;
    let mut num_trees: u32 = 0;
    let mut buckets: BTreeMap<u8, TreeBucket> = BTreeMap::new();

    for bucket_id in dag.buckets() {
        let child = match flush_tree(working, bucket_id, abort)? {
            Some(tree) => tree,
            None => return Ok(None),
        };
        if child.is_empty() {
            continue;
        }
        let index = match bucket_id.leaf_bucket() {
            Some(index) => index,
            None => continue,
        };
        size += child.size();
        num_trees += child.num_trees();
        buckets.insert(index, TreeBucket::new(child.id(), child.aggregate_bounds()));
    }

    if buckets.is_empty() {
        return Ok(Some(RevTree::empty()));
    }
    Ok(Some(RevTree::inner(size, num_trees, buckets)))
}

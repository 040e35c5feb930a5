//! The mutable working DAG a build session accumulates changes in.
//!
//! [`WorkingDag`] layers staged insertions and removals over an original
//! persisted tree, loading ("mirroring") only the original subtrees that a
//! mutation's placement path actually touches. Leaves split into buckets
//! when they outgrow the strategy's size limit and collapse back when
//! removals shrink a subtree below it, so the structure is a pure function
//! of the final entry set, never of the mutation order.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use strata_model::{Node, RevTree};
use strata_store::ObjectStore;
use strata_types::ObjectId;
use tracing::trace;

use crate::dag::{Dag, DagState, NodeId, TreeId};
use crate::error::{TreeError, TreeResult};
use crate::strategy::{compute_bucket_path, ClusteringStrategy};

pub(crate) struct WorkingDag {
    strategy: Box<dyn ClusteringStrategy>,
    store: Arc<dyn ObjectStore>,
    /// Arena of mutable DAG nodes, keyed by their bucket path.
    dags: HashMap<TreeId, Dag>,
    /// Staged nodes by name: the latest put (or the mirrored original)
    /// for every child referenced from the DAG.
    nodes: HashMap<String, Node>,
    /// The original root tree, kept so mirroring it needs no store read.
    root_original: RevTree,
}

impl WorkingDag {
    pub fn new(
        strategy: Box<dyn ClusteringStrategy>,
        store: Arc<dyn ObjectStore>,
        original: RevTree,
    ) -> Self {
        let root_id = TreeId::root();
        let mut dags = HashMap::new();
        dags.insert(root_id.clone(), Dag::new(root_id, original.id()));
        Self {
            strategy,
            store,
            dags,
            nodes: HashMap::new(),
            root_original: original,
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn dag(&self, id: &TreeId) -> Option<&Dag> {
        self.dags.get(id)
    }

    /// The staged node for a child name.
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Stage a node. A null target id stages a removal. Returns the net
    /// entry-count delta: `+1` added, `0` replaced or ignored, `-1`
    /// removed.
    pub fn put_node(&mut self, node: &Node) -> TreeResult<i64> {
        self.strategy.check_node(node)?;
        let node_id = match self.strategy.compute_id(node) {
            Some(id) => id,
            // Not clustered at all (e.g. boundless feature under the
            // reject policy).
            None => return Ok(0),
        };
        let remove = node.object_id().is_null();
        let delta = self.put_in(TreeId::root(), &node_id, remove)?;
        trace!(name = node.name(), remove, delta, "staged node");
        if !remove {
            self.nodes.insert(node.name().to_string(), node.clone());
        }
        Ok(delta)
    }

    /// Stage the removal of a node. Returns whether an entry existed and
    /// was removed.
    pub fn remove_node(&mut self, node: &Node) -> TreeResult<bool> {
        let staged = if node.object_id().is_null() {
            node.clone()
        } else {
            node.update(ObjectId::NULL)
        };
        Ok(self.put_node(&staged)? == -1)
    }

    /// Replace `old` by `new`. Returns whether the net tree content
    /// changed; a no-op update returns `false`.
    pub fn update_node(&mut self, old: &Node, new: &Node) -> TreeResult<bool> {
        if old.name() != new.name() {
            return Err(TreeError::NameMismatch {
                old: old.name().to_string(),
                new: new.name().to_string(),
            });
        }
        if old == new {
            return Ok(false);
        }
        if self.remove_node(old)? {
            self.put_node(new)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn put_in(&mut self, tree_id: TreeId, node_id: &NodeId, remove: bool) -> TreeResult<i64> {
        self.ensure_mirrored(&tree_id)?;
        let depth = tree_id.depth();
        let limit = self.strategy.normalized_size_limit(depth);
        let has_buckets = self.dags[&tree_id].bucket_count() > 0;

        let mut changed = false;
        let delta: i64;

        if has_buckets {
            match compute_bucket_path(self.strategy.as_ref(), node_id, depth + 1) {
                Some(bucket_id) => {
                    self.ensure_dag(&bucket_id, RevTree::empty_tree_id());
                    self.dags
                        .get_mut(&tree_id)
                        .expect("dag present")
                        .add_bucket(bucket_id.clone());
                    delta = self.put_in(bucket_id.clone(), node_id, remove)?;
                    let (child_changed, child_empty) = {
                        let bucket = &self.dags[&bucket_id];
                        (
                            bucket.state() == DagState::Changed,
                            bucket.total_child_count() == 0,
                        )
                    };
                    changed = child_changed;
                    if child_empty {
                        self.dags
                            .get_mut(&tree_id)
                            .expect("dag present")
                            .remove_bucket(&bucket_id);
                    }
                }
                // No deeper placement exists; the entry already lives in
                // the leaf that refused to split, so there is nothing to
                // do at this level.
                None => delta = 0,
            }
        } else {
            {
                let dag = self.dags.get_mut(&tree_id).expect("dag present");
                if remove {
                    delta = if dag.remove_child(node_id.name()) { -1 } else { 0 };
                } else {
                    // Content changed even when an identically-named
                    // entry was replaced.
                    changed = true;
                    delta = i64::from(dag.add_child(node_id.clone()));
                }
            }
            if self.dags[&tree_id].children_count() > limit {
                self.split_leaf(&tree_id, remove)?;
            }
        }

        if delta != 0 {
            changed = true;
            let dag = self.dags.get_mut(&tree_id).expect("dag present");
            dag.set_total_child_count(dag.total_child_count() + delta);
            self.shrink_if_underflow(&tree_id)?;
        }
        if changed {
            self.dags.get_mut(&tree_id).expect("dag present").set_changed();
        }
        Ok(delta)
    }

    /// Redistribute an overflowing leaf's children into buckets one level
    /// down. When any child has no deeper placement (name-hash collision
    /// at maximum depth), the leaf stays as it is, whatever its size.
    fn split_leaf(&mut self, tree_id: &TreeId, remove: bool) -> TreeResult<()> {
        let depth = tree_id.depth();
        let children: Vec<NodeId> = self.dags[tree_id].children().cloned().collect();

        let mut promotions: BTreeMap<TreeId, Vec<NodeId>> = BTreeMap::new();
        for child in children {
            match compute_bucket_path(self.strategy.as_ref(), &child, depth + 1) {
                Some(bucket_id) => promotions.entry(bucket_id).or_default().push(child),
                None => return Ok(()),
            }
        }

        trace!(tree = %tree_id, buckets = promotions.len(), "splitting leaf");
        for (bucket_id, children) in promotions {
            self.ensure_dag(&bucket_id, RevTree::empty_tree_id());
            self.dags
                .get_mut(tree_id)
                .expect("dag present")
                .add_bucket(bucket_id.clone());
            for child in children {
                self.put_in(bucket_id.clone(), &child, remove)?;
            }
        }
        self.dags
            .get_mut(tree_id)
            .expect("dag present")
            .clear_children();
        Ok(())
    }

    /// Collapse a bucket node back into a leaf once its total child count
    /// fits the leaf limit again.
    fn shrink_if_underflow(&mut self, tree_id: &TreeId) -> TreeResult<()> {
        let dag = &self.dags[tree_id];
        if dag.bucket_count() == 0 {
            return Ok(());
        }
        let child_count = dag.total_child_count();
        let limit = self.strategy.normalized_size_limit(tree_id.depth()) as i64;
        if child_count > limit {
            return Ok(());
        }

        let children = self.collect_children_recursive(tree_id.clone())?;
        if children.len() as i64 != child_count {
            return Err(TreeError::CountMismatch {
                tree_id: tree_id.to_string(),
                recorded: child_count,
                collected: children.len(),
            });
        }
        let dag = self.dags.get_mut(tree_id).expect("dag present");
        dag.clear_buckets();
        for child in children {
            dag.add_child(child);
        }
        Ok(())
    }

    /// All children reachable under a DAG node, mirroring untouched
    /// original subtrees on the way and dropping emptied bucket DAGs.
    fn collect_children_recursive(&mut self, tree_id: TreeId) -> TreeResult<Vec<NodeId>> {
        self.ensure_mirrored(&tree_id)?;
        let dag = &self.dags[&tree_id];
        if dag.children_count() > 0 {
            return Ok(dag.children().cloned().collect());
        }
        let buckets = dag.bucket_list();
        let mut collected = Vec::new();
        for bucket_id in buckets {
            let children = self.collect_children_recursive(bucket_id.clone())?;
            collected.extend(children);
            self.dags.remove(&bucket_id);
        }
        Ok(collected)
    }

    // -----------------------------------------------------------------------
    // Mirroring
    // -----------------------------------------------------------------------

    fn ensure_dag(&mut self, tree_id: &TreeId, original: ObjectId) {
        self.dags
            .entry(tree_id.clone())
            .or_insert_with(|| Dag::new(tree_id.clone(), original));
    }

    fn original_tree(&self, id: ObjectId) -> TreeResult<RevTree> {
        if id.is_null() || id == RevTree::empty_tree_id() {
            Ok(RevTree::empty())
        } else if id == self.root_original.id() {
            Ok(self.root_original.clone())
        } else {
            Ok(self.store.get_tree(&id)?)
        }
    }

    /// Load the original tree a DAG node shadows, once, so its structure
    /// matches the persisted state before changes apply. Only the trees
    /// on a mutation's placement path ever get loaded.
    fn ensure_mirrored(&mut self, tree_id: &TreeId) -> TreeResult<()> {
        if self.dags[tree_id].state() != DagState::Initialized {
            return Ok(());
        }
        let original = self.original_tree(self.dags[tree_id].original_tree_id())?;

        {
            let dag = self.dags.get_mut(tree_id).expect("dag present");
            dag.set_total_child_count(original.size() as i64 + i64::from(original.num_trees()));
        }

        if original.is_leaf() {
            let mut child_ids = Vec::new();
            for node in original.trees().iter().chain(original.features().iter()) {
                if let Some(node_id) = self.strategy.compute_id(node) {
                    // Never clobber a node staged by a caller.
                    self.nodes
                        .entry(node.name().to_string())
                        .or_insert_with(|| node.clone());
                    child_ids.push(node_id);
                }
            }
            let dag = self.dags.get_mut(tree_id).expect("dag present");
            for child in child_ids {
                dag.add_child(child);
            }
        } else {
            let buckets: Vec<(TreeId, ObjectId)> = original
                .buckets()
                .iter()
                .map(|(index, bucket)| (tree_id.child(*index), bucket.object_id))
                .collect();
            for (child_id, original_id) in buckets {
                self.ensure_dag(&child_id, original_id);
                self.dags
                    .get_mut(tree_id)
                    .expect("dag present")
                    .add_bucket(child_id);
            }
        }
        self.dags.get_mut(tree_id).expect("dag present").set_mirrored();
        Ok(())
    }
}

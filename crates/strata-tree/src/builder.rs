//! The tree builder: single-use accumulation of changes against an
//! original tree, materialized through a clustering strategy.

use std::sync::Arc;

use strata_model::{Node, RevTree};
use strata_store::ObjectStore;
use strata_types::ObjectId;

use crate::error::{TreeError, TreeResult};
use crate::flush::{flush, AbortFlag};
use crate::strategy::{CanonicalStrategy, ClusteringStrategy, QuadTreeConfig, QuadTreeStrategy};
use crate::working::WorkingDag;

/// Accumulates node insertions, removals, and updates against an original
/// [`RevTree`], then deterministically materializes a new persisted tree.
///
/// Builders are single-use and single-writer: once [`build`](Self::build)
/// or [`dispose`](Self::dispose) has run, every further mutation fails
/// with [`TreeError::BuilderDisposed`]. After a successful build, every
/// subtree referenced by the result is present in the backing store.
pub struct RevTreeBuilder {
    working: WorkingDag,
    original: RevTree,
    disposed: bool,
}

impl RevTreeBuilder {
    /// A builder clustering by canonical name order.
    pub fn canonical(store: Arc<dyn ObjectStore>, original: RevTree) -> Self {
        Self::with_strategy(Box::new(CanonicalStrategy), store, original)
    }

    /// A builder clustering spatially by quadrants of
    /// [`QuadTreeConfig::max_bounds`].
    pub fn quadtree(
        store: Arc<dyn ObjectStore>,
        original: RevTree,
        config: QuadTreeConfig,
    ) -> Self {
        Self::with_strategy(Box::new(QuadTreeStrategy::new(config)), store, original)
    }

    /// A builder over any clustering strategy.
    pub fn with_strategy(
        strategy: Box<dyn ClusteringStrategy>,
        store: Arc<dyn ObjectStore>,
        original: RevTree,
    ) -> Self {
        Self {
            working: WorkingDag::new(strategy, store, original.clone()),
            original,
            disposed: false,
        }
    }

    /// The tree this builder accumulates changes against. Updated to the
    /// built tree after a successful [`build`](Self::build).
    pub fn original(&self) -> &RevTree {
        &self.original
    }

    /// Stage a node. Returns `true` when the entry was freshly added,
    /// `false` when it replaced an identically-named entry or was not
    /// clustered by the strategy.
    pub fn put(&mut self, node: Node) -> TreeResult<bool> {
        self.check_not_disposed()?;
        Ok(self.working.put_node(&node)? == 1)
    }

    /// Stage the removal of a node. For spatially clustered builders the
    /// node must carry the same bounds it was inserted with, so its
    /// placement path can be recomputed. Returns whether an entry existed
    /// and was removed.
    pub fn remove(&mut self, node: &Node) -> TreeResult<bool> {
        self.check_not_disposed()?;
        self.working.remove_node(node)
    }

    /// Stage the removal of a feature by bare name. Only meaningful for
    /// canonically clustered builders, where placement depends on the
    /// name alone.
    pub fn remove_named(&mut self, name: &str) -> TreeResult<bool> {
        self.check_not_disposed()?;
        let node = Node::feature(name, ObjectId::NULL);
        self.working.remove_node(&node)
    }

    /// Replace `old` by `new` (same name). Returns whether the net tree
    /// content actually changed; a no-op update returns `false`.
    pub fn update(&mut self, old: &Node, new: Node) -> TreeResult<bool> {
        self.check_not_disposed()?;
        self.working.update_node(old, &new)
    }

    /// Materialize and persist the accumulated state. The builder's
    /// original becomes the built tree and the builder is disposed.
    pub fn build(&mut self) -> TreeResult<RevTree> {
        self.check_not_disposed()?;
        let flag = AbortFlag::new();
        let tree = flush(&self.working, &flag)?.ok_or(TreeError::BuilderDisposed)?;
        self.original = tree.clone();
        self.disposed = true;
        Ok(tree)
    }

    /// Like [`build`](Self::build), but polls `abort` at tree-node
    /// boundaries. When cancelled, returns `Ok(None)`, leaves the
    /// original unchanged, and makes no promise about partially written
    /// subtrees. The builder is disposed either way.
    pub fn build_abortable(&mut self, abort: &AbortFlag) -> TreeResult<Option<RevTree>> {
        self.check_not_disposed()?;
        let result = flush(&self.working, abort)?;
        if let Some(tree) = &result {
            self.original = tree.clone();
        }
        self.disposed = true;
        Ok(result)
    }

    /// Release the builder without materializing a result. Idempotent.
    pub fn dispose(&mut self) {
        self.disposed = true;
    }

    fn check_not_disposed(&self) -> TreeResult<()> {
        if self.disposed {
            Err(TreeError::BuilderDisposed)
        } else {
            Ok(())
        }
    }
}

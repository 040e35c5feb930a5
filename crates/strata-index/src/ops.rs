//! Index management operations: create, update, drop, and the per-commit
//! incremental refresh.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use strata_model::{Envelope, Node, RevCommit, RevFeatureType, RevTree};
use strata_refs::{RefDatabase, HEAD, HEADS_PREFIX};
use strata_store::{GraphDatabase, ObjectStore};
use strata_tree::AbortFlag;
use strata_types::ObjectId;
use tracing::{debug, warn};

use crate::build::{build_index_tree, find_tree_node, NoopProgress, ProgressListener};
use crate::db::IndexDatabase;
use crate::error::{IndexError, IndexResult};
use crate::info::{Index, IndexInfo, IndexType};

/// The collaborators index operations run against.
#[derive(Clone)]
pub struct IndexContext {
    pub objects: Arc<dyn ObjectStore>,
    pub indexes: Arc<dyn IndexDatabase>,
    pub refs: Arc<dyn RefDatabase>,
    pub graph: Arc<dyn GraphDatabase>,
}

impl IndexContext {
    fn head_commit(&self) -> IndexResult<RevCommit> {
        let head = self
            .refs
            .resolve(HEAD)?
            .and_then(|r| r.object_id())
            .ok_or_else(|| IndexError::UnresolvedRef {
                name: HEAD.to_string(),
            })?;
        Ok(self.objects.get_commit(&head)?)
    }
}

/// The canonical layer node and its schema, resolved from a commit's root
/// tree.
fn resolve_layer(
    ctx: &IndexContext,
    commit: &RevCommit,
    tree_name: &str,
) -> IndexResult<(Node, RevFeatureType)> {
    let root = ctx.objects.get_tree(&commit.tree)?;
    let node = find_tree_node(ctx.objects.as_ref(), &root, tree_name)?.ok_or_else(|| {
        IndexError::TreeNameNotFound {
            name: tree_name.to_string(),
        }
    })?;
    let metadata = node
        .metadata_id()
        .ok_or_else(|| IndexError::InvalidAttribute {
            tree: tree_name.to_string(),
            attribute: String::new(),
            reason: "tree carries no schema".to_string(),
        })?;
    let ftype = ctx.objects.get_feature_type(&metadata)?;
    Ok((node, ftype))
}

/// The unique index for a tree, disambiguated by attribute when several
/// exist.
fn resolve_unique(
    ctx: &IndexContext,
    tree_name: &str,
    attribute: Option<&str>,
) -> IndexResult<IndexInfo> {
    match attribute {
        Some(attribute) => ctx
            .indexes
            .get_index_info(tree_name, attribute)?
            .ok_or_else(|| IndexError::NotFound {
                tree: tree_name.to_string(),
            }),
        None => {
            let mut all = ctx.indexes.get_indexes(tree_name)?;
            match all.len() {
                0 => Err(IndexError::NotFound {
                    tree: tree_name.to_string(),
                }),
                1 => Ok(all.remove(0)),
                _ => Err(IndexError::Ambiguous {
                    tree: tree_name.to_string(),
                }),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Creates a secondary index for a canonical feature tree and builds the
/// index tree for the current snapshot, optionally across full history.
#[derive(Clone, Debug)]
pub struct CreateIndexOp {
    pub tree_name: String,
    /// The indexed attribute; defaults to the tree's default geometry
    /// descriptor.
    pub attribute: Option<String>,
    pub index_type: IndexType,
    /// Quad-tree index bounds; defaults to the world extent.
    pub bounds: Option<Envelope>,
    /// Attributes to materialize on every index node.
    pub extra_attributes: Vec<String>,
    /// Also build one indexed snapshot per distinct canonical tree
    /// version reachable from any branch.
    pub index_history: bool,
}

impl CreateIndexOp {
    pub fn new(tree_name: impl Into<String>) -> Self {
        Self {
            tree_name: tree_name.into(),
            attribute: None,
            index_type: IndexType::QuadTree,
            bounds: None,
            extra_attributes: Vec::new(),
            index_history: false,
        }
    }

    pub fn run(&self, ctx: &IndexContext) -> IndexResult<Index> {
        self.run_cancellable(ctx, &AbortFlag::new(), &NoopProgress)
    }

    /// Like [`run`](Self::run), polling `abort` between history commits.
    /// Cancellation keeps already-persisted snapshots; any failure rolls
    /// back the created [`IndexInfo`].
    pub fn run_cancellable(
        &self,
        ctx: &IndexContext,
        abort: &AbortFlag,
        progress: &dyn ProgressListener,
    ) -> IndexResult<Index> {
        let tip = ctx.head_commit()?;
        let (layer_node, ftype) = resolve_layer(ctx, &tip, &self.tree_name)?;

        let attribute = match &self.attribute {
            Some(attribute) => attribute.clone(),
            None => ftype
                .default_geometry()
                .map(|(_, d)| d.name.clone())
                .ok_or_else(|| IndexError::InvalidAttribute {
                    tree: self.tree_name.clone(),
                    attribute: String::new(),
                    reason: "tree has no geometry descriptor".to_string(),
                })?,
        };
        let (_, descriptor) =
            ftype
                .descriptor(&attribute)
                .ok_or_else(|| IndexError::InvalidAttribute {
                    tree: self.tree_name.clone(),
                    attribute: attribute.clone(),
                    reason: "not a descriptor of the tree's schema".to_string(),
                })?;
        if self.index_type == IndexType::QuadTree && !descriptor.is_geometry() {
            return Err(IndexError::InvalidAttribute {
                tree: self.tree_name.clone(),
                attribute,
                reason: "quad-tree indexes require a geometry attribute".to_string(),
            });
        }

        let mut info = IndexInfo::new(&self.tree_name, &attribute, self.index_type);
        info.bounds = match self.index_type {
            IndexType::QuadTree => Some(self.bounds.unwrap_or_else(Envelope::world)),
            IndexType::Attribute => None,
        };
        info.extra_attributes = self.extra_attributes.clone();

        ctx.indexes.create_index_info(info.clone())?;

        let built = self.build_snapshots(ctx, &info, &ftype, &layer_node, abort, progress);
        match built {
            Ok(index) => Ok(index),
            Err(e) => {
                // Local rollback: the metadata record goes away, but any
                // index trees already persisted for earlier history
                // snapshots stay in the object store.
                let _ = ctx.indexes.drop_index(&info);
                Err(e)
            }
        }
    }

    fn build_snapshots(
        &self,
        ctx: &IndexContext,
        info: &IndexInfo,
        ftype: &RevFeatureType,
        layer_node: &Node,
        abort: &AbortFlag,
        progress: &dyn ProgressListener,
    ) -> IndexResult<Index> {
        let empty = RevTree::empty_tree_id();
        let canonical = layer_node.object_id();
        let indexed = build_index_tree(&ctx.objects, info, ftype, empty, canonical, empty)?;
        ctx.indexes.add_indexed_tree(info, canonical, indexed)?;

        if self.index_history {
            build_full_history(ctx, info, false, abort, progress)?;
        }

        Ok(Index {
            info: info.clone(),
            canonical_tree: canonical,
            indexed_tree: indexed,
        })
    }
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// How [`UpdateIndexOp`] combines new extra attributes with existing
/// ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeUpdateMode {
    /// Union the new attributes with the existing list.
    Add,
    /// Replace the existing list.
    Overwrite,
}

/// Changes an existing index's extra materialized attribute list and
/// rebuilds its indexed trees.
#[derive(Clone, Debug)]
pub struct UpdateIndexOp {
    pub tree_name: String,
    pub attribute: Option<String>,
    pub extra_attributes: Vec<String>,
    /// Required when the index already materializes attributes.
    pub mode: Option<AttributeUpdateMode>,
    pub index_history: bool,
}

impl UpdateIndexOp {
    pub fn new(tree_name: impl Into<String>) -> Self {
        Self {
            tree_name: tree_name.into(),
            attribute: None,
            extra_attributes: Vec::new(),
            mode: None,
            index_history: false,
        }
    }

    pub fn run(&self, ctx: &IndexContext) -> IndexResult<Index> {
        self.run_cancellable(ctx, &AbortFlag::new(), &NoopProgress)
    }

    pub fn run_cancellable(
        &self,
        ctx: &IndexContext,
        abort: &AbortFlag,
        progress: &dyn ProgressListener,
    ) -> IndexResult<Index> {
        let info = resolve_unique(ctx, &self.tree_name, self.attribute.as_deref())?;

        if !info.extra_attributes.is_empty() && self.mode.is_none() {
            return Err(IndexError::AttributeModeRequired {
                tree: self.tree_name.clone(),
            });
        }
        let merged = match self.mode {
            Some(AttributeUpdateMode::Add) => {
                let mut merged = info.extra_attributes.clone();
                for attribute in &self.extra_attributes {
                    if !merged.contains(attribute) {
                        merged.push(attribute.clone());
                    }
                }
                merged
            }
            Some(AttributeUpdateMode::Overwrite) | None => self.extra_attributes.clone(),
        };

        let mut updated = info.clone();
        updated.extra_attributes = merged;
        ctx.indexes.update_index_info(updated.clone())?;

        // The materialized payload changed on every node, so the current
        // snapshot is rebuilt from scratch rather than diffed.
        let tip = ctx.head_commit()?;
        let (layer_node, ftype) = resolve_layer(ctx, &tip, &self.tree_name)?;
        let empty = RevTree::empty_tree_id();
        let canonical = layer_node.object_id();
        let indexed = build_index_tree(&ctx.objects, &updated, &ftype, empty, canonical, empty)?;
        ctx.indexes.add_indexed_tree(&updated, canonical, indexed)?;

        if self.index_history {
            build_full_history(ctx, &updated, true, abort, progress)?;
        }

        Ok(Index {
            info: updated,
            canonical_tree: canonical,
            indexed_tree: indexed,
        })
    }
}

// ---------------------------------------------------------------------------
// Drop
// ---------------------------------------------------------------------------

/// Removes an index's metadata and snapshot mappings.
#[derive(Clone, Debug)]
pub struct DropIndexOp {
    pub tree_name: String,
    /// Required when several indexes exist for the tree.
    pub attribute: Option<String>,
}

impl DropIndexOp {
    pub fn new(tree_name: impl Into<String>) -> Self {
        Self {
            tree_name: tree_name.into(),
            attribute: None,
        }
    }

    /// Returns the dropped index metadata.
    pub fn run(&self, ctx: &IndexContext) -> IndexResult<IndexInfo> {
        let info = resolve_unique(ctx, &self.tree_name, self.attribute.as_deref())?;
        if !ctx.indexes.drop_index(&info)? {
            return Err(IndexError::NotFound {
                tree: self.tree_name.clone(),
            });
        }
        debug!(tree = info.tree_name, attribute = info.attribute, "dropped index");
        Ok(info)
    }
}

// ---------------------------------------------------------------------------
// Update all indexes for a ref
// ---------------------------------------------------------------------------

/// Refreshes every index touched by the latest commit of a branch.
///
/// Compares the branch tip against its first parent and rebuilds only
/// indexes whose canonical tree actually changed; an index that already
/// has a snapshot for the new canonical tree is skipped, so re-invoking
/// after every commit is idempotent.
#[derive(Clone, Debug)]
pub struct UpdateIndexesOp {
    pub ref_name: String,
}

impl UpdateIndexesOp {
    pub fn new(ref_name: impl Into<String>) -> Self {
        Self {
            ref_name: ref_name.into(),
        }
    }

    pub fn run(&self, ctx: &IndexContext) -> IndexResult<Vec<Index>> {
        let tip_id = ctx
            .refs
            .resolve(&self.ref_name)?
            .and_then(|r| r.object_id())
            .ok_or_else(|| IndexError::UnresolvedRef {
                name: self.ref_name.clone(),
            })?;
        let tip = ctx.objects.get_commit(&tip_id)?;
        let new_root = ctx.objects.get_tree(&tip.tree)?;
        let old_root = match tip.parent() {
            Some(parent_id) => {
                let parent = ctx.objects.get_commit(&parent_id)?;
                ctx.objects.get_tree(&parent.tree)?
            }
            None => RevTree::empty(),
        };

        let empty = RevTree::empty_tree_id();
        let mut built = Vec::new();
        for info in ctx.indexes.get_all_indexes()? {
            let node = match find_tree_node(ctx.objects.as_ref(), &new_root, &info.tree_name)? {
                Some(node) => node,
                None => continue,
            };
            let canonical = node.object_id();
            if ctx.indexes.resolve_indexed_tree(&info, canonical)?.is_some() {
                continue;
            }

            let (old_canonical, old_indexed) =
                match find_tree_node(ctx.objects.as_ref(), &old_root, &info.tree_name)? {
                    Some(old_node) => {
                        match ctx
                            .indexes
                            .resolve_indexed_tree(&info, old_node.object_id())?
                        {
                            Some(indexed) => (old_node.object_id(), indexed),
                            None => (empty, empty),
                        }
                    }
                    None => (empty, empty),
                };

            let metadata = node
                .metadata_id()
                .ok_or_else(|| IndexError::InvalidAttribute {
                    tree: info.tree_name.clone(),
                    attribute: info.attribute.clone(),
                    reason: "tree carries no schema".to_string(),
                })?;
            let ftype = ctx.objects.get_feature_type(&metadata)?;

            let indexed = build_index_tree(
                &ctx.objects,
                &info,
                &ftype,
                old_canonical,
                canonical,
                old_indexed,
            )?;
            ctx.indexes.add_indexed_tree(&info, canonical, indexed)?;
            built.push(Index {
                info,
                canonical_tree: canonical,
                indexed_tree: indexed,
            });
        }
        Ok(built)
    }
}

// ---------------------------------------------------------------------------
// Full history
// ---------------------------------------------------------------------------

/// Build one indexed snapshot per distinct canonical tree version of
/// `info.tree_name` reachable from any branch.
///
/// Commits are visited oldest-first so each snapshot can be built
/// incrementally against its graph parent's. Cancellation between
/// commits keeps already-persisted snapshots and returns the partial
/// completion count. With `force`, snapshots already recorded in the
/// index database are rebuilt instead of skipped.
pub fn build_full_history(
    ctx: &IndexContext,
    info: &IndexInfo,
    force: bool,
    abort: &AbortFlag,
    progress: &dyn ProgressListener,
) -> IndexResult<usize> {
    let empty = RevTree::empty_tree_id();

    // Every commit reachable from any branch, then processed in reverse
    // discovery order so parents come before children.
    let mut order: Vec<ObjectId> = Vec::new();
    let mut seen: HashSet<ObjectId> = HashSet::new();
    for branch in ctx.refs.get_all(HEADS_PREFIX)? {
        if let Some(tip) = branch.object_id() {
            if seen.insert(tip) {
                order.push(tip);
            }
        }
    }
    let mut cursor = 0;
    while cursor < order.len() {
        let commit = order[cursor];
        cursor += 1;
        for parent in ctx.graph.parents(&commit)? {
            if seen.insert(parent) {
                order.push(parent);
            }
        }
    }

    // Snapshots built during this run, for incremental bases under
    // `force` where the database mappings are stale.
    let mut built_here: HashMap<ObjectId, ObjectId> = HashMap::new();
    let mut built = 0usize;

    for commit_id in order.iter().rev() {
        if abort.is_cancelled() {
            warn!(
                tree = info.tree_name,
                built, "full-history index build cancelled"
            );
            return Ok(built);
        }
        let commit = ctx.objects.get_commit(commit_id)?;
        let root = ctx.objects.get_tree(&commit.tree)?;
        let node = match find_tree_node(ctx.objects.as_ref(), &root, &info.tree_name)? {
            Some(node) => node,
            None => continue,
        };
        let canonical = node.object_id();
        if built_here.contains_key(&canonical) {
            continue;
        }
        if !force && ctx.indexes.resolve_indexed_tree(info, canonical)?.is_some() {
            continue;
        }

        let metadata = node
            .metadata_id()
            .ok_or_else(|| IndexError::InvalidAttribute {
                tree: info.tree_name.clone(),
                attribute: info.attribute.clone(),
                reason: "tree carries no schema".to_string(),
            })?;
        let ftype = ctx.objects.get_feature_type(&metadata)?;

        // Incremental base: the first graph parent whose canonical tree
        // already has a usable snapshot.
        let mut old_canonical = empty;
        let mut old_indexed = empty;
        for parent_id in ctx.graph.parents(commit_id)? {
            let parent = ctx.objects.get_commit(&parent_id)?;
            let parent_root = ctx.objects.get_tree(&parent.tree)?;
            if let Some(parent_node) =
                find_tree_node(ctx.objects.as_ref(), &parent_root, &info.tree_name)?
            {
                let parent_canonical = parent_node.object_id();
                let base = match built_here.get(&parent_canonical) {
                    Some(indexed) => Some(*indexed),
                    None if !force => {
                        ctx.indexes.resolve_indexed_tree(info, parent_canonical)?
                    }
                    None => None,
                };
                if let Some(indexed) = base {
                    old_canonical = parent_canonical;
                    old_indexed = indexed;
                    break;
                }
            }
        }

        let indexed =
            build_index_tree(&ctx.objects, info, &ftype, old_canonical, canonical, old_indexed)?;
        ctx.indexes.add_indexed_tree(info, canonical, indexed)?;
        built_here.insert(canonical, indexed);
        built += 1;
        progress.progress(built as u64);
    }

    debug!(tree = info.tree_name, built, "full-history index build done");
    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryIndexDatabase;
    use strata_model::{
        Crs, FieldKind, Geometry, PropertyDescriptor, RevFeature, RevObject, RevPerson,
        RevFeatureType, Value,
    };
    use strata_refs::{InMemoryRefDatabase, Ref};
    use strata_store::{CountingObjectStore, InMemoryGraphDatabase, InMemoryObjectStore};
    use strata_tree::RevTreeBuilder;

    struct Fixture {
        objects: Arc<InMemoryObjectStore>,
        indexes: Arc<InMemoryIndexDatabase>,
        refs: Arc<InMemoryRefDatabase>,
        graph: Arc<InMemoryGraphDatabase>,
        ftype: RevFeatureType,
    }

    impl Fixture {
        fn new() -> Self {
            let ftype = RevFeatureType::new(
                "roads",
                vec![
                    PropertyDescriptor::new("name", FieldKind::String),
                    PropertyDescriptor::geometry("geom", Crs::Epsg(4326)),
                ],
            );
            let objects = Arc::new(InMemoryObjectStore::new());
            objects.put(&RevObject::FeatureType(ftype.clone())).unwrap();
            Self {
                objects,
                indexes: Arc::new(InMemoryIndexDatabase::new()),
                refs: Arc::new(InMemoryRefDatabase::new()),
                graph: Arc::new(InMemoryGraphDatabase::new()),
                ftype,
            }
        }

        fn ctx(&self) -> IndexContext {
            IndexContext {
                objects: Arc::clone(&self.objects) as _,
                indexes: Arc::clone(&self.indexes) as _,
                refs: Arc::clone(&self.refs) as _,
                graph: Arc::clone(&self.graph) as _,
            }
        }

        /// A context whose object store counts reads and writes.
        fn counting_ctx(&self) -> (IndexContext, Arc<CountingObjectStore>) {
            let counting = Arc::new(CountingObjectStore::new(
                Arc::clone(&self.objects) as Arc<dyn ObjectStore>
            ));
            let ctx = IndexContext {
                objects: Arc::clone(&counting) as _,
                indexes: Arc::clone(&self.indexes) as _,
                refs: Arc::clone(&self.refs) as _,
                graph: Arc::clone(&self.graph) as _,
            };
            (ctx, counting)
        }

        fn feature_node(&self, name: &str, x: f64, y: f64) -> Node {
            let feature = RevFeature::new(vec![
                Value::String(name.to_string()),
                Value::Geometry(Geometry::Point((x, y))),
            ]);
            self.objects.put(&RevObject::Feature(feature.clone())).unwrap();
            Node::feature(name, feature.id()).with_bounds(Envelope::point(x, y))
        }

        /// Commit a "roads" layer holding the given point features, and
        /// point the branch (and HEAD) at the new commit.
        fn commit(
            &self,
            points: &[(&str, f64, f64)],
            parents: Vec<ObjectId>,
            branch: &str,
            message: &str,
        ) -> ObjectId {
            let mut layer =
                RevTreeBuilder::canonical(Arc::clone(&self.objects) as _, RevTree::empty());
            for (name, x, y) in points {
                layer.put(self.feature_node(name, *x, *y)).unwrap();
            }
            let layer_tree = layer.build().unwrap();

            let mut root =
                RevTreeBuilder::canonical(Arc::clone(&self.objects) as _, RevTree::empty());
            root.put(Node::tree("roads", layer_tree.id()).with_metadata(self.ftype.id()))
                .unwrap();
            let root_tree = root.build().unwrap();

            let commit = RevCommit::new(
                root_tree.id(),
                parents.clone(),
                RevPerson::new("alice", "alice@example.com", 1_700_000_000_000),
                message,
            );
            let id = commit.id();
            self.objects.put(&RevObject::Commit(commit)).unwrap();
            self.graph.put(id, &parents).unwrap();
            self.refs
                .put(Ref::direct(format!("refs/heads/{branch}"), id))
                .unwrap();
            self.refs
                .put(Ref::symbolic(HEAD, format!("refs/heads/{branch}")))
                .unwrap();
            id
        }

        /// The canonical id of the "roads" layer in a commit.
        fn layer_tree(&self, commit_id: ObjectId) -> ObjectId {
            let commit = self.objects.get_commit(&commit_id).unwrap();
            let root = self.objects.get_tree(&commit.tree).unwrap();
            find_tree_node(self.objects.as_ref(), &root, "roads")
                .unwrap()
                .unwrap()
                .object_id()
        }
    }

    // ---- create ----

    #[test]
    fn create_builds_the_current_snapshot() {
        let fx = Fixture::new();
        let c1 = fx.commit(&[("a", 1.0, 1.0), ("b", 2.0, 2.0)], vec![], "main", "c1");

        let index = CreateIndexOp::new("roads").run(&fx.ctx()).unwrap();

        assert_eq!(index.info.attribute, "geom");
        assert_eq!(index.info.index_type, IndexType::QuadTree);
        assert_eq!(index.canonical_tree, fx.layer_tree(c1));

        let info = fx.indexes.get_index_info("roads", "geom").unwrap().unwrap();
        assert_eq!(
            fx.indexes
                .resolve_indexed_tree(&info, index.canonical_tree)
                .unwrap(),
            Some(index.indexed_tree)
        );
        let indexed = fx.objects.get_tree(&index.indexed_tree).unwrap();
        assert_eq!(indexed.size(), 2);
    }

    #[test]
    fn duplicate_create_is_a_state_error() {
        let fx = Fixture::new();
        fx.commit(&[("a", 1.0, 1.0)], vec![], "main", "c1");
        CreateIndexOp::new("roads").run(&fx.ctx()).unwrap();

        let err = CreateIndexOp::new("roads").run(&fx.ctx()).unwrap_err();
        assert!(matches!(err, IndexError::AlreadyExists { .. }));
    }

    #[test]
    fn create_requires_a_geometry_attribute_for_quadtrees() {
        let fx = Fixture::new();
        fx.commit(&[("a", 1.0, 1.0)], vec![], "main", "c1");

        let mut op = CreateIndexOp::new("roads");
        op.attribute = Some("name".to_string());
        let err = op.run(&fx.ctx()).unwrap_err();
        assert!(matches!(err, IndexError::InvalidAttribute { .. }));
    }

    #[test]
    fn create_rejects_unknown_attributes() {
        let fx = Fixture::new();
        fx.commit(&[("a", 1.0, 1.0)], vec![], "main", "c1");

        let mut op = CreateIndexOp::new("roads");
        op.attribute = Some("nope".to_string());
        assert!(matches!(
            op.run(&fx.ctx()),
            Err(IndexError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn create_rejects_unknown_trees() {
        let fx = Fixture::new();
        fx.commit(&[("a", 1.0, 1.0)], vec![], "main", "c1");
        assert!(matches!(
            CreateIndexOp::new("rivers").run(&fx.ctx()),
            Err(IndexError::TreeNameNotFound { .. })
        ));
    }

    #[test]
    fn extra_attributes_are_materialized_on_index_nodes() {
        let fx = Fixture::new();
        fx.commit(&[("a", 1.0, 1.0)], vec![], "main", "c1");

        let mut op = CreateIndexOp::new("roads");
        op.extra_attributes = vec!["name".to_string()];
        let index = op.run(&fx.ctx()).unwrap();

        let indexed = fx.objects.get_tree(&index.indexed_tree).unwrap();
        let node = indexed.find_feature("a").unwrap();
        assert_eq!(
            node.extra().get("name"),
            Some(&Value::String("a".to_string()))
        );
    }

    #[test]
    fn failed_create_rolls_back_the_index_info() {
        let fx = Fixture::new();
        fx.commit(&[("a", 1.0, 1.0)], vec![], "main", "c1");

        let mut op = CreateIndexOp::new("roads");
        op.extra_attributes = vec!["bogus".to_string()];
        assert!(matches!(
            op.run(&fx.ctx()),
            Err(IndexError::InvalidAttribute { .. })
        ));
        assert!(fx.indexes.get_index_info("roads", "geom").unwrap().is_none());
    }

    // ---- update ----

    #[test]
    fn update_requires_a_mode_once_attributes_exist() {
        let fx = Fixture::new();
        fx.commit(&[("a", 1.0, 1.0)], vec![], "main", "c1");
        let mut create = CreateIndexOp::new("roads");
        create.extra_attributes = vec!["name".to_string()];
        create.run(&fx.ctx()).unwrap();

        let mut update = UpdateIndexOp::new("roads");
        update.extra_attributes = vec!["name".to_string()];
        assert!(matches!(
            update.run(&fx.ctx()),
            Err(IndexError::AttributeModeRequired { .. })
        ));
    }

    #[test]
    fn update_add_unions_and_overwrite_replaces() {
        let fx = Fixture::new();
        fx.commit(&[("a", 1.0, 1.0)], vec![], "main", "c1");
        let mut create = CreateIndexOp::new("roads");
        create.extra_attributes = vec!["name".to_string()];
        create.run(&fx.ctx()).unwrap();

        let mut add = UpdateIndexOp::new("roads");
        add.extra_attributes = vec!["geom".to_string(), "name".to_string()];
        add.mode = Some(AttributeUpdateMode::Add);
        let index = add.run(&fx.ctx()).unwrap();
        assert_eq!(
            index.info.extra_attributes,
            vec!["name".to_string(), "geom".to_string()]
        );

        let mut overwrite = UpdateIndexOp::new("roads");
        overwrite.extra_attributes = vec![];
        overwrite.mode = Some(AttributeUpdateMode::Overwrite);
        let index = overwrite.run(&fx.ctx()).unwrap();
        assert!(index.info.extra_attributes.is_empty());
    }

    #[test]
    fn update_without_existing_attributes_needs_no_mode() {
        let fx = Fixture::new();
        fx.commit(&[("a", 1.0, 1.0)], vec![], "main", "c1");
        CreateIndexOp::new("roads").run(&fx.ctx()).unwrap();

        let mut update = UpdateIndexOp::new("roads");
        update.extra_attributes = vec!["name".to_string()];
        let index = update.run(&fx.ctx()).unwrap();
        assert_eq!(index.info.extra_attributes, vec!["name".to_string()]);
    }

    // ---- drop ----

    #[test]
    fn drop_removes_the_index() {
        let fx = Fixture::new();
        fx.commit(&[("a", 1.0, 1.0)], vec![], "main", "c1");
        CreateIndexOp::new("roads").run(&fx.ctx()).unwrap();

        let dropped = DropIndexOp::new("roads").run(&fx.ctx()).unwrap();
        assert_eq!(dropped.attribute, "geom");
        assert!(fx.indexes.get_index_info("roads", "geom").unwrap().is_none());

        assert!(matches!(
            DropIndexOp::new("roads").run(&fx.ctx()),
            Err(IndexError::NotFound { .. })
        ));
    }

    #[test]
    fn drop_with_multiple_indexes_requires_the_attribute() {
        let fx = Fixture::new();
        fx.commit(&[("a", 1.0, 1.0)], vec![], "main", "c1");
        CreateIndexOp::new("roads").run(&fx.ctx()).unwrap();
        let mut second = CreateIndexOp::new("roads");
        second.attribute = Some("name".to_string());
        second.index_type = IndexType::Attribute;
        second.run(&fx.ctx()).unwrap();

        assert!(matches!(
            DropIndexOp::new("roads").run(&fx.ctx()),
            Err(IndexError::Ambiguous { .. })
        ));

        let mut by_attr = DropIndexOp::new("roads");
        by_attr.attribute = Some("name".to_string());
        by_attr.run(&fx.ctx()).unwrap();
        assert_eq!(fx.indexes.get_indexes("roads").unwrap().len(), 1);
    }

    // ---- update indexes for a ref ----

    #[test]
    fn update_indexes_refreshes_changed_trees_and_is_idempotent() {
        let fx = Fixture::new();
        let c1 = fx.commit(&[("a", 1.0, 1.0)], vec![], "main", "c1");
        CreateIndexOp::new("roads").run(&fx.ctx()).unwrap();

        let c2 = fx.commit(
            &[("a", 1.0, 1.0), ("b", -170.0, -80.0)],
            vec![c1],
            "main",
            "c2",
        );

        let built = UpdateIndexesOp::new("refs/heads/main")
            .run(&fx.ctx())
            .unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].canonical_tree, fx.layer_tree(c2));

        // Second invocation against the unchanged branch: nothing to
        // build, zero writes through the store.
        let (counting_ctx, counting) = fx.counting_ctx();
        let again = UpdateIndexesOp::new("refs/heads/main")
            .run(&counting_ctx)
            .unwrap();
        assert!(again.is_empty());
        assert_eq!(counting.writes(), 0);
    }

    #[test]
    fn update_indexes_requires_a_resolvable_ref() {
        let fx = Fixture::new();
        fx.commit(&[("a", 1.0, 1.0)], vec![], "main", "c1");
        assert!(matches!(
            UpdateIndexesOp::new("refs/heads/ghost").run(&fx.ctx()),
            Err(IndexError::UnresolvedRef { .. })
        ));
    }

    // ---- full history ----

    #[test]
    fn create_with_history_indexes_every_snapshot() {
        let fx = Fixture::new();
        let c1 = fx.commit(&[("a", 1.0, 1.0)], vec![], "main", "c1");
        let c2 = fx.commit(&[("a", 1.0, 1.0), ("b", 2.0, 2.0)], vec![c1], "main", "c2");
        let c3 = fx.commit(
            &[("a", 1.0, 1.0), ("b", 2.0, 2.0), ("c", 3.0, 3.0)],
            vec![c2],
            "main",
            "c3",
        );

        let mut op = CreateIndexOp::new("roads");
        op.index_history = true;
        let index = op.run(&fx.ctx()).unwrap();

        for commit in [c1, c2, c3] {
            let canonical = fx.layer_tree(commit);
            assert!(
                fx.indexes
                    .resolve_indexed_tree(&index.info, canonical)
                    .unwrap()
                    .is_some(),
                "missing snapshot for {commit:?}"
            );
        }
    }

    #[test]
    fn history_spans_all_branches() {
        let fx = Fixture::new();
        let c1 = fx.commit(&[("a", 1.0, 1.0)], vec![], "main", "c1");
        let side = fx.commit(
            &[("a", 1.0, 1.0), ("side", 9.0, 9.0)],
            vec![c1],
            "topic",
            "side",
        );
        // Leave HEAD on main.
        fx.refs.put(Ref::symbolic(HEAD, "refs/heads/main")).unwrap();

        let mut op = CreateIndexOp::new("roads");
        op.index_history = true;
        let index = op.run(&fx.ctx()).unwrap();

        assert!(fx
            .indexes
            .resolve_indexed_tree(&index.info, fx.layer_tree(side))
            .unwrap()
            .is_some());
    }

    #[test]
    fn cancelled_history_returns_partial_count_without_rollback() {
        let fx = Fixture::new();
        let c1 = fx.commit(&[("a", 1.0, 1.0)], vec![], "main", "c1");
        fx.commit(&[("a", 1.0, 1.0), ("b", 2.0, 2.0)], vec![c1], "main", "c2");

        let mut op = CreateIndexOp::new("roads");
        op.index_history = true;
        let abort = AbortFlag::cancelled();
        let index = op
            .run_cancellable(&fx.ctx(), &abort, &NoopProgress)
            .unwrap();

        // The current snapshot was built before history walking began;
        // the cancelled walk simply stopped, leaving the index in place.
        assert!(fx.indexes.get_index_info("roads", "geom").unwrap().is_some());
        assert!(fx
            .indexes
            .resolve_indexed_tree(&index.info, fx.layer_tree(c1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn history_build_reports_progress() {
        use std::sync::atomic::{AtomicU64, Ordering};

        struct Recording(AtomicU64);
        impl ProgressListener for Recording {
            fn progress(&self, completed: u64) {
                self.0.store(completed, Ordering::Relaxed);
            }
        }

        let fx = Fixture::new();
        let c1 = fx.commit(&[("a", 1.0, 1.0)], vec![], "main", "c1");
        fx.commit(&[("a", 1.0, 1.0), ("b", 2.0, 2.0)], vec![c1], "main", "c2");

        let index = CreateIndexOp::new("roads").run(&fx.ctx()).unwrap();
        let progress = Recording(AtomicU64::new(0));
        let built = build_full_history(
            &fx.ctx(),
            &index.info,
            false,
            &AbortFlag::new(),
            &progress,
        )
        .unwrap();
        assert_eq!(built, 1, "only c1's snapshot was missing");
        assert_eq!(progress.0.load(Ordering::Relaxed), 1);
    }
}

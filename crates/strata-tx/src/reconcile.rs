//! Reconciling divergent commit histories: merge base computation,
//! three-way tree merge, and rebase replay.
//!
//! All reconciliation happens at the feature level over canonical tree
//! diffs. A conflict is any path changed differently on both sides,
//! including modify/delete.

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_model::{Node, RevCommit, RevObject, RevPerson, RevTree};
use strata_store::{GraphDatabase, ObjectStore};
use strata_tree::{diff_trees, find_node, find_path, DiffEntry, RevTreeBuilder};
use strata_types::ObjectId;
use tracing::debug;

use crate::conflicts::Conflict;
use crate::error::TxResult;

/// Result of merging one commit pair.
#[derive(Clone, Debug, PartialEq)]
pub enum MergeOutcome {
    /// A merge commit was created.
    Merged(ObjectId),
    /// `theirs` already contained `ours`; the result is `theirs`.
    FastForward(ObjectId),
    /// `ours` already contained `theirs`; nothing to do.
    AlreadyUpToDate(ObjectId),
    /// Divergent edits on the same entries.
    Conflicts(Vec<Conflict>),
}

/// Result of replaying commits onto a new base.
#[derive(Clone, Debug, PartialEq)]
pub enum RebaseOutcome {
    /// The tip of the replayed history.
    Done(ObjectId),
    /// A replayed change no longer applies onto the new base.
    Conflicts(Vec<Conflict>),
}

/// The nearest common ancestor of two commits, walking the history
/// graph. `None` for unrelated histories.
pub fn merge_base(
    graph: &Arc<dyn GraphDatabase>,
    a: ObjectId,
    b: ObjectId,
) -> TxResult<Option<ObjectId>> {
    let mut ancestors = std::collections::HashSet::new();
    let mut queue = vec![a];
    while let Some(commit) = queue.pop() {
        if ancestors.insert(commit) {
            queue.extend(graph.parents(&commit)?);
        }
    }

    let mut queue = std::collections::VecDeque::from([b]);
    let mut seen = std::collections::HashSet::new();
    while let Some(commit) = queue.pop_front() {
        if !seen.insert(commit) {
            continue;
        }
        if ancestors.contains(&commit) {
            return Ok(Some(commit));
        }
        for parent in graph.parents(&commit)? {
            queue.push_back(parent);
        }
    }
    Ok(None)
}

/// First-parent chain from `tip` down to (excluding) `base`, oldest
/// first. With `base == None` the chain reaches the root commit.
fn first_parent_chain(
    objects: &Arc<dyn ObjectStore>,
    tip: ObjectId,
    base: Option<ObjectId>,
) -> TxResult<Vec<ObjectId>> {
    let mut chain = Vec::new();
    let mut current = Some(tip);
    while let Some(commit_id) = current {
        if Some(commit_id) == base {
            break;
        }
        chain.push(commit_id);
        current = objects.get_commit(&commit_id)?.parent();
    }
    chain.reverse();
    Ok(chain)
}

fn tree_of(objects: &Arc<dyn ObjectStore>, commit: Option<ObjectId>) -> TxResult<ObjectId> {
    match commit {
        Some(id) => Ok(objects.get_commit(&id)?.tree),
        None => Ok(RevTree::empty_tree_id()),
    }
}

/// Apply a set of path-qualified feature changes onto a root tree,
/// rebuilding only the touched layers. Returns the new root tree id.
pub fn apply_changes(
    objects: &Arc<dyn ObjectStore>,
    base: ObjectId,
    changes: Vec<DiffEntry>,
) -> TxResult<ObjectId> {
    if changes.is_empty() {
        return Ok(base);
    }
    let base_tree = objects.get_tree(&base)?;

    let mut direct: Vec<DiffEntry> = Vec::new();
    let mut nested: BTreeMap<String, Vec<DiffEntry>> = BTreeMap::new();
    for change in changes {
        match change.path.split_once('/') {
            Some((layer, rest)) => {
                let layer = layer.to_string();
                let rest = rest.to_string();
                nested
                    .entry(layer)
                    .or_default()
                    .push(DiffEntry {
                        path: rest,
                        ..change
                    });
            }
            None => direct.push(change),
        }
    }

    let mut builder = RevTreeBuilder::canonical(Arc::clone(objects), base_tree.clone());
    for change in direct {
        match (change.old, change.new) {
            (_, Some(new)) => {
                builder.put(new)?;
            }
            (Some(old), None) => {
                builder.remove(&old)?;
            }
            (None, None) => {}
        }
    }

    for (layer, subchanges) in nested {
        let existing = find_node(objects.as_ref(), &base_tree, &layer)?;
        let child_base = existing
            .as_ref()
            .map(|n| n.object_id())
            .unwrap_or_else(RevTree::empty_tree_id);
        let new_child = apply_changes(objects, child_base, subchanges)?;
        if new_child == RevTree::empty_tree_id() {
            if let Some(node) = existing {
                builder.remove(&node)?;
            }
        } else {
            let node = match existing {
                Some(node) => node.update(new_child),
                None => Node::tree(layer, new_child),
            };
            builder.put(node)?;
        }
    }

    Ok(builder.build()?.id())
}

/// Three-way merge of two root trees against their common ancestor.
/// Returns the merged tree id, or the conflicting paths.
pub fn merge_trees(
    objects: &Arc<dyn ObjectStore>,
    base: ObjectId,
    ours: ObjectId,
    theirs: ObjectId,
) -> TxResult<Result<ObjectId, Vec<Conflict>>> {
    let our_changes: BTreeMap<String, DiffEntry> = diff_trees(objects.as_ref(), &base, &ours)?
        .into_iter()
        .map(|e| (e.path.clone(), e))
        .collect();
    let their_changes = diff_trees(objects.as_ref(), &base, &theirs)?;

    let mut conflicts = Vec::new();
    let mut to_apply = Vec::new();
    for their_change in their_changes {
        match our_changes.get(&their_change.path) {
            None => to_apply.push(their_change),
            Some(our_change) => {
                let ours_new = our_change.new.as_ref().map(Node::object_id);
                let theirs_new = their_change.new.as_ref().map(Node::object_id);
                if ours_new == theirs_new {
                    // Both sides made the identical change.
                    continue;
                }
                conflicts.push(Conflict::new(
                    their_change.path.clone(),
                    our_change
                        .old
                        .as_ref()
                        .map(Node::object_id)
                        .unwrap_or(ObjectId::NULL),
                    ours_new.unwrap_or(ObjectId::NULL),
                    theirs_new.unwrap_or(ObjectId::NULL),
                ));
            }
        }
    }

    if !conflicts.is_empty() {
        return Ok(Err(conflicts));
    }
    Ok(Ok(apply_changes(objects, ours, to_apply)?))
}

/// Merge `theirs` into `ours`, creating a merge commit when histories
/// have genuinely diverged.
pub fn merge_commits(
    objects: &Arc<dyn ObjectStore>,
    graph: &Arc<dyn GraphDatabase>,
    ours: ObjectId,
    theirs: ObjectId,
    author: Option<RevPerson>,
) -> TxResult<MergeOutcome> {
    if ours == theirs {
        return Ok(MergeOutcome::AlreadyUpToDate(ours));
    }
    let base = merge_base(graph, ours, theirs)?;
    if base == Some(theirs) {
        return Ok(MergeOutcome::AlreadyUpToDate(ours));
    }
    if base == Some(ours) {
        return Ok(MergeOutcome::FastForward(theirs));
    }

    let base_tree = tree_of(objects, base)?;
    let ours_commit = objects.get_commit(&ours)?;
    let theirs_commit = objects.get_commit(&theirs)?;

    match merge_trees(objects, base_tree, ours_commit.tree, theirs_commit.tree)? {
        Err(conflicts) => Ok(MergeOutcome::Conflicts(conflicts)),
        Ok(merged_tree) => {
            let author = author.unwrap_or_else(|| ours_commit.author.clone());
            let message = format!("Merge commit '{}'", theirs.short_hex());
            let commit = RevCommit::new(merged_tree, vec![ours, theirs], author, message);
            let id = commit.id();
            objects.put(&RevObject::Commit(commit))?;
            graph.put(id, &[ours, theirs])?;
            debug!(merge = %id.short_hex(), "created merge commit");
            Ok(MergeOutcome::Merged(id))
        }
    }
}

/// Replay the commits of `tip` that are not contained in `onto`, oldest
/// first, on top of `onto`. Authorship and messages are preserved; each
/// replayed commit gets the previous replayed commit as its sole parent.
pub fn rebase_onto(
    objects: &Arc<dyn ObjectStore>,
    graph: &Arc<dyn GraphDatabase>,
    tip: ObjectId,
    onto: ObjectId,
) -> TxResult<RebaseOutcome> {
    if tip == onto {
        return Ok(RebaseOutcome::Done(onto));
    }
    let base = merge_base(graph, tip, onto)?;
    if base == Some(tip) {
        return Ok(RebaseOutcome::Done(onto));
    }
    if base == Some(onto) {
        return Ok(RebaseOutcome::Done(tip));
    }

    let mut current = onto;
    for commit_id in first_parent_chain(objects, tip, base)? {
        let commit = objects.get_commit(&commit_id)?;
        let parent_tree = tree_of(objects, commit.parent())?;
        let changes = diff_trees(objects.as_ref(), &parent_tree, &commit.tree)?;
        let current_tree = objects.get_commit(&current)?.tree;

        // A change applies cleanly when the entry at its path still has
        // the value the change expects, or already has the new value.
        let mut conflicts = Vec::new();
        for change in &changes {
            let existing = find_path(objects.as_ref(), &current_tree, &change.path)?;
            let expected = change.old.as_ref().map(Node::object_id);
            let incoming = change.new.as_ref().map(Node::object_id);
            let current_id = existing.as_ref().map(Node::object_id);
            if current_id != expected && current_id != incoming {
                conflicts.push(Conflict::new(
                    change.path.clone(),
                    expected.unwrap_or(ObjectId::NULL),
                    incoming.unwrap_or(ObjectId::NULL),
                    current_id.unwrap_or(ObjectId::NULL),
                ));
            }
        }
        if !conflicts.is_empty() {
            return Ok(RebaseOutcome::Conflicts(conflicts));
        }

        let new_tree = apply_changes(objects, current_tree, changes)?;
        let replayed = RevCommit {
            tree: new_tree,
            parents: vec![current],
            author: commit.author.clone(),
            committer: commit.committer.clone(),
            message: commit.message.clone(),
        };
        let id = replayed.id();
        objects.put(&RevObject::Commit(replayed))?;
        graph.put(id, &[current])?;
        current = id;
    }
    debug!(tip = %current.short_hex(), "rebase complete");
    Ok(RebaseOutcome::Done(current))
}

//! The commit history graph.
//!
//! A lightweight adjacency index over commits, maintained alongside the
//! object store. Full-history index building walks it forward (children)
//! while merge-base computation walks it backward (parents).

use std::collections::HashMap;
use std::sync::RwLock;

use strata_types::ObjectId;

use crate::error::StoreResult;

/// Accessor for the commit ancestry graph.
pub trait GraphDatabase: Send + Sync {
    /// Record a commit and its parent edges. Idempotent.
    fn put(&self, commit: ObjectId, parents: &[ObjectId]) -> StoreResult<()>;

    /// The parents of a commit, in recorded order. Empty when the commit
    /// is unknown or a root.
    fn parents(&self, commit: &ObjectId) -> StoreResult<Vec<ObjectId>>;

    /// The children of a commit: every commit that lists it as a parent.
    fn children(&self, commit: &ObjectId) -> StoreResult<Vec<ObjectId>>;

    /// Whether the commit has been recorded.
    fn exists(&self, commit: &ObjectId) -> StoreResult<bool>;
}

/// In-memory adjacency-map implementation of [`GraphDatabase`].
#[derive(Default)]
pub struct InMemoryGraphDatabase {
    parents: RwLock<HashMap<ObjectId, Vec<ObjectId>>>,
    children: RwLock<HashMap<ObjectId, Vec<ObjectId>>>,
}

impl InMemoryGraphDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphDatabase for InMemoryGraphDatabase {
    fn put(&self, commit: ObjectId, parents: &[ObjectId]) -> StoreResult<()> {
        let mut parent_map = self.parents.write().expect("lock poisoned");
        if parent_map.contains_key(&commit) {
            return Ok(());
        }
        parent_map.insert(commit, parents.to_vec());
        drop(parent_map);

        let mut child_map = self.children.write().expect("lock poisoned");
        for parent in parents {
            let entry = child_map.entry(*parent).or_default();
            if !entry.contains(&commit) {
                entry.push(commit);
            }
        }
        Ok(())
    }

    fn parents(&self, commit: &ObjectId) -> StoreResult<Vec<ObjectId>> {
        let map = self.parents.read().expect("lock poisoned");
        Ok(map.get(commit).cloned().unwrap_or_default())
    }

    fn children(&self, commit: &ObjectId) -> StoreResult<Vec<ObjectId>> {
        let map = self.children.read().expect("lock poisoned");
        Ok(map.get(commit).cloned().unwrap_or_default())
    }

    fn exists(&self, commit: &ObjectId) -> StoreResult<bool> {
        let map = self.parents.read().expect("lock poisoned");
        Ok(map.contains_key(commit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> ObjectId {
        ObjectId::hash_of(&[n])
    }

    #[test]
    fn put_and_lookup_edges() {
        let graph = InMemoryGraphDatabase::new();
        graph.put(id(1), &[]).unwrap();
        graph.put(id(2), &[id(1)]).unwrap();
        graph.put(id(3), &[id(1)]).unwrap();

        assert_eq!(graph.parents(&id(2)).unwrap(), vec![id(1)]);
        assert!(graph.parents(&id(1)).unwrap().is_empty());

        let mut children = graph.children(&id(1)).unwrap();
        children.sort();
        let mut expected = vec![id(2), id(3)];
        expected.sort();
        assert_eq!(children, expected);
    }

    #[test]
    fn put_is_idempotent() {
        let graph = InMemoryGraphDatabase::new();
        graph.put(id(2), &[id(1)]).unwrap();
        graph.put(id(2), &[id(1)]).unwrap();
        assert_eq!(graph.children(&id(1)).unwrap().len(), 1);
    }

    #[test]
    fn merge_commit_has_two_parents() {
        let graph = InMemoryGraphDatabase::new();
        graph.put(id(9), &[id(1), id(2)]).unwrap();
        assert_eq!(graph.parents(&id(9)).unwrap(), vec![id(1), id(2)]);
        assert_eq!(graph.children(&id(1)).unwrap(), vec![id(9)]);
        assert_eq!(graph.children(&id(2)).unwrap(), vec![id(9)]);
    }

    #[test]
    fn unknown_commit_has_no_edges() {
        let graph = InMemoryGraphDatabase::new();
        assert!(!graph.exists(&id(5)).unwrap());
        assert!(graph.children(&id(5)).unwrap().is_empty());
    }
}

//! The [`IndexDatabase`] trait and its in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use strata_types::ObjectId;

use crate::error::{IndexError, IndexResult};
use crate::info::IndexInfo;

/// Storage for index metadata and indexed-tree snapshots.
pub trait IndexDatabase: Send + Sync {
    /// The index for a tree/attribute pair, if any.
    fn get_index_info(&self, tree_name: &str, attribute: &str) -> IndexResult<Option<IndexInfo>>;

    /// All indexes on one canonical tree.
    fn get_indexes(&self, tree_name: &str) -> IndexResult<Vec<IndexInfo>>;

    /// Every index in the repository.
    fn get_all_indexes(&self) -> IndexResult<Vec<IndexInfo>>;

    /// Register a new index. Fails with [`IndexError::AlreadyExists`]
    /// when the tree/attribute pair is already indexed.
    fn create_index_info(&self, info: IndexInfo) -> IndexResult<()>;

    /// Replace the metadata record of an existing index.
    fn update_index_info(&self, info: IndexInfo) -> IndexResult<()>;

    /// Remove an index and its snapshot mappings. Returns `true` when
    /// the index existed.
    fn drop_index(&self, info: &IndexInfo) -> IndexResult<bool>;

    /// Record the index tree built for one canonical tree version.
    fn add_indexed_tree(
        &self,
        info: &IndexInfo,
        canonical_tree: ObjectId,
        indexed_tree: ObjectId,
    ) -> IndexResult<()>;

    /// The index tree previously built for a canonical tree version, if
    /// any.
    fn resolve_indexed_tree(
        &self,
        info: &IndexInfo,
        canonical_tree: ObjectId,
    ) -> IndexResult<Option<ObjectId>>;
}

/// In-memory implementation of [`IndexDatabase`].
#[derive(Default)]
pub struct InMemoryIndexDatabase {
    infos: RwLock<HashMap<ObjectId, IndexInfo>>,
    indexed_trees: RwLock<HashMap<(ObjectId, ObjectId), ObjectId>>,
}

impl InMemoryIndexDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexDatabase for InMemoryIndexDatabase {
    fn get_index_info(&self, tree_name: &str, attribute: &str) -> IndexResult<Option<IndexInfo>> {
        let infos = self.infos.read().expect("lock poisoned");
        Ok(infos
            .values()
            .find(|i| i.tree_name == tree_name && i.attribute == attribute)
            .cloned())
    }

    fn get_indexes(&self, tree_name: &str) -> IndexResult<Vec<IndexInfo>> {
        let infos = self.infos.read().expect("lock poisoned");
        let mut found: Vec<IndexInfo> = infos
            .values()
            .filter(|i| i.tree_name == tree_name)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.attribute.cmp(&b.attribute));
        Ok(found)
    }

    fn get_all_indexes(&self) -> IndexResult<Vec<IndexInfo>> {
        let infos = self.infos.read().expect("lock poisoned");
        let mut all: Vec<IndexInfo> = infos.values().cloned().collect();
        all.sort_by(|a, b| {
            (a.tree_name.as_str(), a.attribute.as_str())
                .cmp(&(b.tree_name.as_str(), b.attribute.as_str()))
        });
        Ok(all)
    }

    fn create_index_info(&self, info: IndexInfo) -> IndexResult<()> {
        let mut infos = self.infos.write().expect("lock poisoned");
        if infos.contains_key(&info.id()) {
            return Err(IndexError::AlreadyExists {
                tree: info.tree_name.clone(),
                attribute: info.attribute.clone(),
            });
        }
        infos.insert(info.id(), info);
        Ok(())
    }

    fn update_index_info(&self, info: IndexInfo) -> IndexResult<()> {
        let mut infos = self.infos.write().expect("lock poisoned");
        if !infos.contains_key(&info.id()) {
            return Err(IndexError::NotFound {
                tree: info.tree_name.clone(),
            });
        }
        infos.insert(info.id(), info);
        Ok(())
    }

    fn drop_index(&self, info: &IndexInfo) -> IndexResult<bool> {
        let existed = {
            let mut infos = self.infos.write().expect("lock poisoned");
            infos.remove(&info.id()).is_some()
        };
        if existed {
            let mut trees = self.indexed_trees.write().expect("lock poisoned");
            trees.retain(|(info_id, _), _| *info_id != info.id());
        }
        Ok(existed)
    }

    fn add_indexed_tree(
        &self,
        info: &IndexInfo,
        canonical_tree: ObjectId,
        indexed_tree: ObjectId,
    ) -> IndexResult<()> {
        let mut trees = self.indexed_trees.write().expect("lock poisoned");
        trees.insert((info.id(), canonical_tree), indexed_tree);
        Ok(())
    }

    fn resolve_indexed_tree(
        &self,
        info: &IndexInfo,
        canonical_tree: ObjectId,
    ) -> IndexResult<Option<ObjectId>> {
        let trees = self.indexed_trees.read().expect("lock poisoned");
        Ok(trees.get(&(info.id(), canonical_tree)).copied())
    }
}

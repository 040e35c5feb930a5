//! Conflict records produced while reconciling divergent edits.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use strata_types::ObjectId;

use crate::error::TxResult;

/// One unresolved conflict: the three versions of an entry at a path.
/// Any of the ids may be null (entry absent on that side).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Path of the conflicting entry (`layer/feature`).
    pub path: String,
    /// The common-ancestor version.
    pub ancestor: ObjectId,
    pub ours: ObjectId,
    pub theirs: ObjectId,
}

impl Conflict {
    pub fn new(path: impl Into<String>, ancestor: ObjectId, ours: ObjectId, theirs: ObjectId) -> Self {
        Self {
            path: path.into(),
            ancestor,
            ours,
            theirs,
        }
    }
}

/// Storage for unresolved conflicts, keyed by path.
pub trait ConflictStore: Send + Sync {
    fn get_conflict(&self, path: &str) -> TxResult<Option<Conflict>>;

    /// All conflicts whose path starts with `prefix`, sorted by path.
    /// Pass `""` for everything.
    fn get_conflicts(&self, prefix: &str) -> TxResult<Vec<Conflict>>;

    fn add_conflict(&self, conflict: Conflict) -> TxResult<()>;

    /// Remove one conflict. Returns `true` when it existed.
    fn remove_conflict(&self, path: &str) -> TxResult<bool>;

    /// Remove every conflict under `prefix`, returning how many were
    /// removed.
    fn remove_conflicts(&self, prefix: &str) -> TxResult<usize>;

    fn has_conflicts(&self) -> TxResult<bool> {
        Ok(!self.get_conflicts("")?.is_empty())
    }
}

/// In-memory implementation of [`ConflictStore`].
#[derive(Default)]
pub struct InMemoryConflictStore {
    conflicts: RwLock<HashMap<String, Conflict>>,
}

impl InMemoryConflictStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConflictStore for InMemoryConflictStore {
    fn get_conflict(&self, path: &str) -> TxResult<Option<Conflict>> {
        let conflicts = self.conflicts.read().expect("lock poisoned");
        Ok(conflicts.get(path).cloned())
    }

    fn get_conflicts(&self, prefix: &str) -> TxResult<Vec<Conflict>> {
        let conflicts = self.conflicts.read().expect("lock poisoned");
        let mut found: Vec<Conflict> = conflicts
            .values()
            .filter(|c| c.path.starts_with(prefix))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }

    fn add_conflict(&self, conflict: Conflict) -> TxResult<()> {
        let mut conflicts = self.conflicts.write().expect("lock poisoned");
        conflicts.insert(conflict.path.clone(), conflict);
        Ok(())
    }

    fn remove_conflict(&self, path: &str) -> TxResult<bool> {
        let mut conflicts = self.conflicts.write().expect("lock poisoned");
        Ok(conflicts.remove(path).is_some())
    }

    fn remove_conflicts(&self, prefix: &str) -> TxResult<usize> {
        let mut conflicts = self.conflicts.write().expect("lock poisoned");
        let before = conflicts.len();
        conflicts.retain(|path, _| !path.starts_with(prefix));
        Ok(before - conflicts.len())
    }
}

/// Prefix-scoping decorator over any [`ConflictStore`].
pub struct NamespacedConflictStore {
    inner: Arc<dyn ConflictStore>,
    namespace: String,
}

impl NamespacedConflictStore {
    pub fn new(inner: Arc<dyn ConflictStore>, namespace: impl Into<String>) -> Self {
        let mut namespace = namespace.into();
        while namespace.ends_with('/') {
            namespace.pop();
        }
        Self { inner, namespace }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Purge every conflict in this namespace.
    pub fn purge(&self) -> TxResult<usize> {
        self.inner.remove_conflicts(&format!("{}/", self.namespace))
    }

    fn qualify(&self, path: &str) -> String {
        format!("{}/{}", self.namespace, path)
    }

    fn strip(&self, mut conflict: Conflict) -> Conflict {
        if let Some(rest) = conflict
            .path
            .strip_prefix(&self.namespace)
            .and_then(|p| p.strip_prefix('/'))
        {
            conflict.path = rest.to_string();
        }
        conflict
    }
}

impl ConflictStore for NamespacedConflictStore {
    fn get_conflict(&self, path: &str) -> TxResult<Option<Conflict>> {
        Ok(self
            .inner
            .get_conflict(&self.qualify(path))?
            .map(|c| self.strip(c)))
    }

    fn get_conflicts(&self, prefix: &str) -> TxResult<Vec<Conflict>> {
        let qualified = if prefix.is_empty() {
            format!("{}/", self.namespace)
        } else {
            self.qualify(prefix)
        };
        Ok(self
            .inner
            .get_conflicts(&qualified)?
            .into_iter()
            .map(|c| self.strip(c))
            .collect())
    }

    fn add_conflict(&self, mut conflict: Conflict) -> TxResult<()> {
        conflict.path = self.qualify(&conflict.path);
        self.inner.add_conflict(conflict)
    }

    fn remove_conflict(&self, path: &str) -> TxResult<bool> {
        self.inner.remove_conflict(&self.qualify(path))
    }

    fn remove_conflicts(&self, prefix: &str) -> TxResult<usize> {
        let qualified = if prefix.is_empty() {
            format!("{}/", self.namespace)
        } else {
            self.qualify(prefix)
        };
        self.inner.remove_conflicts(&qualified)
    }
}

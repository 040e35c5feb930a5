//! Namespace-prefixing decorator over any [`RefDatabase`].
//!
//! The transaction isolation layer scopes every ref a writer session sees
//! under a `transactions/{id}/...` prefix. Rather than a parallel
//! "transactional" implementation per backend, this thin adapter
//! translates names on every call: prefixing on the way in, stripping on
//! the way out. The repository-wide lock is shared with the underlying
//! database, not namespaced.

use std::sync::Arc;
use std::time::Duration;

use crate::error::RefResult;
use crate::traits::RefDatabase;
use crate::types::{Ref, RefChange};

/// A view of a [`RefDatabase`] confined to one name prefix.
pub struct NamespacedRefDatabase {
    inner: Arc<dyn RefDatabase>,
    namespace: String,
}

impl NamespacedRefDatabase {
    /// Wrap `inner`, scoping every ref name under `namespace`
    /// (no trailing slash).
    pub fn new(inner: Arc<dyn RefDatabase>, namespace: impl Into<String>) -> Self {
        let mut namespace = namespace.into();
        while namespace.ends_with('/') {
            namespace.pop();
        }
        Self { inner, namespace }
    }

    /// The namespace prefix this view is confined to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn qualify(&self, name: &str) -> String {
        format!("{}/{}", self.namespace, name)
    }

    fn strip(&self, name: &str) -> String {
        name.strip_prefix(&self.namespace)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(name)
            .to_string()
    }

    fn strip_ref(&self, mut reference: Ref) -> Ref {
        reference.name = self.strip(&reference.name);
        reference
    }

    fn strip_change(&self, change: RefChange) -> RefChange {
        RefChange {
            name: self.strip(&change.name),
            old: change.old.map(|r| self.strip_ref(r)),
            new: change.new.map(|r| self.strip_ref(r)),
        }
    }
}

impl RefDatabase for NamespacedRefDatabase {
    fn get(&self, name: &str) -> RefResult<Option<Ref>> {
        Ok(self
            .inner
            .get(&self.qualify(name))?
            .map(|r| self.strip_ref(r)))
    }

    fn get_all(&self, prefix: &str) -> RefResult<Vec<Ref>> {
        let qualified = if prefix.is_empty() {
            format!("{}/", self.namespace)
        } else {
            self.qualify(prefix)
        };
        Ok(self
            .inner
            .get_all(&qualified)?
            .into_iter()
            .map(|r| self.strip_ref(r))
            .collect())
    }

    fn put(&self, mut reference: Ref) -> RefResult<RefChange> {
        reference.name = self.qualify(&reference.name);
        let change = self.inner.put(reference)?;
        Ok(self.strip_change(change))
    }

    fn delete(&self, name: &str) -> RefResult<RefChange> {
        let change = self.inner.delete(&self.qualify(name))?;
        Ok(self.strip_change(change))
    }

    fn delete_all(&self, prefix: &str) -> RefResult<Vec<RefChange>> {
        let qualified = if prefix.is_empty() {
            format!("{}/", self.namespace)
        } else {
            self.qualify(prefix)
        };
        Ok(self
            .inner
            .delete_all(&qualified)?
            .into_iter()
            .map(|c| self.strip_change(c))
            .collect())
    }

    fn lock(&self, timeout: Duration) -> RefResult<()> {
        self.inner.lock(timeout)
    }

    fn unlock(&self) -> RefResult<()> {
        self.inner.unlock()
    }
}

//! Named blob storage for session-scoped sidecar data.
//!
//! Blobs hold transient, non-versioned payloads keyed by path (merge
//! state, in-progress operation markers). A transaction sees its own blob
//! space through the namespacing decorator, purged when the transaction
//! ends.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::TxResult;

/// Path-keyed byte storage.
pub trait BlobStore: Send + Sync {
    /// Read a blob. Returns `Ok(None)` if absent.
    fn get_blob(&self, path: &str) -> TxResult<Option<Vec<u8>>>;

    /// Create or replace a blob.
    fn put_blob(&self, path: &str, data: Vec<u8>) -> TxResult<()>;

    /// Remove a blob. Returns `true` when it existed.
    fn remove_blob(&self, path: &str) -> TxResult<bool>;

    /// Remove every blob whose path starts with `prefix`, returning how
    /// many were removed.
    fn remove_blobs(&self, prefix: &str) -> TxResult<usize>;
}

/// In-memory implementation of [`BlobStore`].
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn get_blob(&self, path: &str) -> TxResult<Option<Vec<u8>>> {
        let blobs = self.blobs.read().expect("lock poisoned");
        Ok(blobs.get(path).cloned())
    }

    fn put_blob(&self, path: &str, data: Vec<u8>) -> TxResult<()> {
        let mut blobs = self.blobs.write().expect("lock poisoned");
        blobs.insert(path.to_string(), data);
        Ok(())
    }

    fn remove_blob(&self, path: &str) -> TxResult<bool> {
        let mut blobs = self.blobs.write().expect("lock poisoned");
        Ok(blobs.remove(path).is_some())
    }

    fn remove_blobs(&self, prefix: &str) -> TxResult<usize> {
        let mut blobs = self.blobs.write().expect("lock poisoned");
        let before = blobs.len();
        blobs.retain(|path, _| !path.starts_with(prefix));
        Ok(before - blobs.len())
    }
}

/// Prefix-scoping decorator over any [`BlobStore`].
pub struct NamespacedBlobStore {
    inner: Arc<dyn BlobStore>,
    namespace: String,
}

impl NamespacedBlobStore {
    pub fn new(inner: Arc<dyn BlobStore>, namespace: impl Into<String>) -> Self {
        let mut namespace = namespace.into();
        while namespace.ends_with('/') {
            namespace.pop();
        }
        Self { inner, namespace }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Purge every blob in this namespace.
    pub fn purge(&self) -> TxResult<usize> {
        self.inner.remove_blobs(&format!("{}/", self.namespace))
    }

    fn qualify(&self, path: &str) -> String {
        format!("{}/{}", self.namespace, path)
    }
}

impl BlobStore for NamespacedBlobStore {
    fn get_blob(&self, path: &str) -> TxResult<Option<Vec<u8>>> {
        self.inner.get_blob(&self.qualify(path))
    }

    fn put_blob(&self, path: &str, data: Vec<u8>) -> TxResult<()> {
        self.inner.put_blob(&self.qualify(path), data)
    }

    fn remove_blob(&self, path: &str) -> TxResult<bool> {
        self.inner.remove_blob(&self.qualify(path))
    }

    fn remove_blobs(&self, prefix: &str) -> TxResult<usize> {
        self.inner.remove_blobs(&self.qualify(prefix))
    }
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use strata_model::RevObject;
use strata_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. Objects are held as their encoded
/// bytes behind a `RwLock`; reads decode on the way out and verify that the
/// content still hashes to the id it was stored under.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, Vec<u8>>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Remove all objects from the store.
    pub fn clear(&self) {
        self.objects.write().expect("lock poisoned").clear();
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }

    fn try_get(&self, id: &ObjectId) -> StoreResult<Option<RevObject>> {
        let bytes = {
            let map = self.objects.read().expect("lock poisoned");
            match map.get(id) {
                Some(b) => b.clone(),
                None => return Ok(None),
            }
        };
        let object = RevObject::decode(*id, &bytes)?;
        let actual = object.id();
        if actual != *id {
            return Err(StoreError::Corrupt {
                stored: *id,
                actual,
            });
        }
        Ok(Some(object))
    }

    fn put(&self, object: &RevObject) -> StoreResult<bool> {
        let id = object.id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let bytes = object.encode()?;
        let mut map = self.objects.write().expect("lock poisoned");
        // Idempotent: content-addressing guarantees an existing entry
        // already holds identical bytes.
        match map.entry(id) {
            std::collections::hash_map::Entry::Occupied(_) => Ok(false),
            std::collections::hash_map::Entry::Vacant(v) => {
                v.insert(bytes);
                Ok(true)
            }
        }
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}

/// A decorator that counts reads and writes passing through a store.
///
/// Used by tests to verify incremental behavior, e.g. that re-running an
/// index update against an unchanged branch performs zero tree builds.
pub struct CountingObjectStore {
    inner: Arc<dyn ObjectStore>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl CountingObjectStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of `get`/`try_get` calls so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `put` calls so far (including no-op rewrites).
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Reset both counters to zero.
    pub fn reset(&self) {
        self.reads.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
    }
}

impl ObjectStore for CountingObjectStore {
    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        self.inner.exists(id)
    }

    fn try_get(&self, id: &ObjectId) -> StoreResult<Option<RevObject>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.inner.try_get(id)
    }

    fn put(&self, object: &RevObject) -> StoreResult<bool> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.inner.put(object)
    }
}

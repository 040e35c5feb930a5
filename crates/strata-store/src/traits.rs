use strata_model::{RevCommit, RevFeature, RevFeatureType, RevObject, RevTree};
use strata_types::ObjectId;

use crate::error::{StoreError, StoreResult};

/// Callback sink for bulk store operations.
///
/// Every method has a no-op default so callers implement only the events
/// they care about.
pub trait BulkListener {
    /// An object requested by a bulk read was found.
    fn found(&mut self, _id: &ObjectId) {}

    /// An object requested by a bulk read was absent.
    fn not_found(&mut self, _id: &ObjectId) {}

    /// A bulk write newly inserted this object (it was not present before).
    fn inserted(&mut self, _id: &ObjectId) {}
}

/// A listener that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopListener;

impl BulkListener for NoopListener {}

/// Content-addressed store of revision objects.
///
/// Implementations must satisfy these invariants:
/// - Objects are immutable once written; the same content always maps to
///   the same id, so a write of a pre-existing id is a no-op.
/// - Concurrent reads are always safe.
/// - Children must be persisted no later than the tree that references
///   them; the store itself imposes no ordering on unrelated writes.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Check whether an object exists.
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Read an object, or `Ok(None)` if absent.
    fn try_get(&self, id: &ObjectId) -> StoreResult<Option<RevObject>>;

    /// Write an object. Returns `true` when the object was newly
    /// inserted, `false` when an identical object was already present.
    fn put(&self, object: &RevObject) -> StoreResult<bool>;

    /// Read an object, failing with [`StoreError::NotFound`] if absent.
    fn get(&self, id: &ObjectId) -> StoreResult<RevObject> {
        self.try_get(id)?.ok_or(StoreError::NotFound(*id))
    }

    /// Write several objects, reporting each newly inserted id to the
    /// listener. Returns the number of new insertions.
    fn put_all(
        &self,
        objects: &[RevObject],
        listener: &mut dyn BulkListener,
    ) -> StoreResult<usize> {
        let mut inserted = 0;
        for obj in objects {
            if self.put(obj)? {
                listener.inserted(&obj.id());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Read several objects, reporting found/not-found ids to the
    /// listener. Absent ids are skipped, not errors.
    fn get_all(
        &self,
        ids: &[ObjectId],
        listener: &mut dyn BulkListener,
    ) -> StoreResult<Vec<RevObject>> {
        let mut objects = Vec::with_capacity(ids.len());
        for id in ids {
            match self.try_get(id)? {
                Some(obj) => {
                    listener.found(id);
                    objects.push(obj);
                }
                None => listener.not_found(id),
            }
        }
        Ok(objects)
    }

    /// Read a tree. The empty tree id resolves without touching the
    /// backend.
    fn get_tree(&self, id: &ObjectId) -> StoreResult<RevTree> {
        if *id == RevTree::empty_tree_id() {
            return Ok(RevTree::empty());
        }
        Ok(self.get(id)?.into_tree()?)
    }

    /// Read a feature.
    fn get_feature(&self, id: &ObjectId) -> StoreResult<RevFeature> {
        Ok(self.get(id)?.into_feature()?)
    }

    /// Read a feature type.
    fn get_feature_type(&self, id: &ObjectId) -> StoreResult<RevFeatureType> {
        Ok(self.get(id)?.into_feature_type()?)
    }

    /// Read a commit.
    fn get_commit(&self, id: &ObjectId) -> StoreResult<RevCommit> {
        Ok(self.get(id)?.into_commit()?)
    }
}

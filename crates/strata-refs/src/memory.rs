//! In-memory reference database for testing and ephemeral use.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{RefError, RefResult};
use crate::names::validate_ref_name;
use crate::traits::RefDatabase;
use crate::types::{Ref, RefChange};

/// An in-memory implementation of [`RefDatabase`].
///
/// Refs live in a `HashMap` behind a `RwLock`; the repository-wide
/// advisory lock is a boolean guarded by a `Mutex`/`Condvar` pair so that
/// waiters block with a bounded timeout instead of spinning.
pub struct InMemoryRefDatabase {
    refs: RwLock<HashMap<String, Ref>>,
    locked: Mutex<bool>,
    lock_released: Condvar,
}

impl InMemoryRefDatabase {
    /// Create a new empty ref database.
    pub fn new() -> Self {
        Self {
            refs: RwLock::new(HashMap::new()),
            locked: Mutex::new(false),
            lock_released: Condvar::new(),
        }
    }

    /// Number of refs currently stored.
    pub fn len(&self) -> usize {
        self.refs.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryRefDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl RefDatabase for InMemoryRefDatabase {
    fn get(&self, name: &str) -> RefResult<Option<Ref>> {
        let refs = self.refs.read().expect("lock poisoned");
        Ok(refs.get(name).cloned())
    }

    fn get_all(&self, prefix: &str) -> RefResult<Vec<Ref>> {
        let refs = self.refs.read().expect("lock poisoned");
        let mut result: Vec<Ref> = refs
            .values()
            .filter(|r| r.name.starts_with(prefix))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    fn put(&self, reference: Ref) -> RefResult<RefChange> {
        validate_ref_name(&reference.name)?;
        let mut refs = self.refs.write().expect("lock poisoned");
        let old = refs.insert(reference.name.clone(), reference.clone());
        Ok(RefChange::new(reference.name.clone(), old, Some(reference)))
    }

    fn delete(&self, name: &str) -> RefResult<RefChange> {
        let mut refs = self.refs.write().expect("lock poisoned");
        let old = refs.remove(name);
        Ok(RefChange::new(name, old, None))
    }

    fn delete_all(&self, prefix: &str) -> RefResult<Vec<RefChange>> {
        let mut refs = self.refs.write().expect("lock poisoned");
        let names: Vec<String> = refs
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        let mut changes = Vec::with_capacity(names.len());
        for name in names {
            let old = refs.remove(&name);
            changes.push(RefChange::new(name, old, None));
        }
        changes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(changes)
    }

    fn lock(&self, timeout: Duration) -> RefResult<()> {
        let start = Instant::now();
        let mut locked = self.locked.lock().expect("lock poisoned");
        while *locked {
            let waited = start.elapsed();
            if waited >= timeout {
                return Err(RefError::LockTimeout {
                    waited_ms: waited.as_millis() as u64,
                });
            }
            let remaining = timeout - waited;
            let (guard, wait_result) = self
                .lock_released
                .wait_timeout(locked, remaining)
                .expect("lock poisoned");
            locked = guard;
            if wait_result.timed_out() && *locked {
                return Err(RefError::LockTimeout {
                    waited_ms: start.elapsed().as_millis() as u64,
                });
            }
        }
        *locked = true;
        debug!("acquired ref database lock");
        Ok(())
    }

    fn unlock(&self) -> RefResult<()> {
        let mut locked = self.locked.lock().expect("lock poisoned");
        *locked = false;
        self.lock_released.notify_all();
        debug!("released ref database lock");
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryRefDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRefDatabase")
            .field("ref_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HEAD, HEADS_PREFIX};
    use strata_types::ObjectId;

    fn commit_id(n: u8) -> ObjectId {
        ObjectId::hash_of(&[n])
    }

    // ---- Basic CRUD ----

    #[test]
    fn put_and_get() {
        let db = InMemoryRefDatabase::new();
        let change = db
            .put(Ref::direct("refs/heads/main", commit_id(1)))
            .unwrap();
        assert!(change.is_create());

        let read = db.get("refs/heads/main").unwrap().unwrap();
        assert_eq!(read.object_id(), Some(commit_id(1)));
    }

    #[test]
    fn get_missing_returns_none() {
        let db = InMemoryRefDatabase::new();
        assert!(db.get("refs/heads/nope").unwrap().is_none());
    }

    #[test]
    fn put_reports_old_value_on_update() {
        let db = InMemoryRefDatabase::new();
        db.put(Ref::direct("refs/heads/main", commit_id(1))).unwrap();
        let change = db
            .put(Ref::direct("refs/heads/main", commit_id(2)))
            .unwrap();
        assert!(change.is_update());
        assert_eq!(change.old.unwrap().object_id(), Some(commit_id(1)));
        assert_eq!(change.new.unwrap().object_id(), Some(commit_id(2)));
    }

    #[test]
    fn delete_reports_old_value() {
        let db = InMemoryRefDatabase::new();
        db.put(Ref::direct("refs/heads/gone", commit_id(3))).unwrap();
        let change = db.delete("refs/heads/gone").unwrap();
        assert!(change.is_delete());
        assert!(db.get("refs/heads/gone").unwrap().is_none());

        // Deleting again reports nothing removed.
        let change = db.delete("refs/heads/gone").unwrap();
        assert!(change.old.is_none());
        assert!(!change.changed());
    }

    #[test]
    fn put_validates_names() {
        let db = InMemoryRefDatabase::new();
        assert!(db
            .put(Ref::direct("refs/heads/bad..name", commit_id(1)))
            .is_err());
    }

    // ---- Prefix operations ----

    #[test]
    fn get_all_filters_by_prefix_and_sorts() {
        let db = InMemoryRefDatabase::new();
        db.put(Ref::direct("refs/heads/main", commit_id(1))).unwrap();
        db.put(Ref::direct("refs/heads/dev", commit_id(2))).unwrap();
        db.put(Ref::direct("refs/tags/v1", commit_id(3))).unwrap();

        let heads = db.get_all(HEADS_PREFIX).unwrap();
        assert_eq!(heads.len(), 2);
        assert_eq!(heads[0].name, "refs/heads/dev");
        assert_eq!(heads[1].name, "refs/heads/main");

        let all = db.get_all("").unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn delete_all_removes_namespace() {
        let db = InMemoryRefDatabase::new();
        db.put(Ref::direct("transactions/t1/a", commit_id(1))).unwrap();
        db.put(Ref::direct("transactions/t1/b", commit_id(2))).unwrap();
        db.put(Ref::direct("refs/heads/main", commit_id(3))).unwrap();

        let changes = db.delete_all("transactions/t1/").unwrap();
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(RefChange::is_delete));
        assert_eq!(db.len(), 1);
    }

    // ---- Symbolic resolution ----

    #[test]
    fn resolve_follows_symbolic_chain() {
        let db = InMemoryRefDatabase::new();
        db.put(Ref::direct("refs/heads/main", commit_id(9))).unwrap();
        db.put(Ref::symbolic(HEAD, "refs/heads/main")).unwrap();

        let resolved = db.resolve(HEAD).unwrap().unwrap();
        assert_eq!(resolved.name, "refs/heads/main");
        assert_eq!(resolved.object_id(), Some(commit_id(9)));
    }

    #[test]
    fn resolve_missing_target_is_none() {
        let db = InMemoryRefDatabase::new();
        db.put(Ref::symbolic(HEAD, "refs/heads/unborn")).unwrap();
        assert!(db.resolve(HEAD).unwrap().is_none());
    }

    #[test]
    fn resolve_detects_cycles() {
        let db = InMemoryRefDatabase::new();
        db.put(Ref::symbolic("refs/heads/a", "refs/heads/b")).unwrap();
        db.put(Ref::symbolic("refs/heads/b", "refs/heads/a")).unwrap();
        assert!(matches!(
            db.resolve("refs/heads/a"),
            Err(RefError::Unresolvable { .. })
        ));
    }

    // ---- Advisory lock ----

    #[test]
    fn lock_and_unlock() {
        let db = InMemoryRefDatabase::new();
        db.lock(Duration::from_millis(50)).unwrap();
        db.unlock().unwrap();
        db.lock(Duration::from_millis(50)).unwrap();
        db.unlock().unwrap();
    }

    #[test]
    fn lock_times_out_when_held() {
        let db = InMemoryRefDatabase::new();
        db.lock(Duration::from_millis(50)).unwrap();

        let err = db.lock(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, RefError::LockTimeout { .. }));

        db.unlock().unwrap();
    }

    #[test]
    fn lock_wakes_blocked_waiter() {
        use std::sync::Arc;
        use std::thread;

        let db = Arc::new(InMemoryRefDatabase::new());
        db.lock(Duration::from_millis(500)).unwrap();

        let waiter = {
            let db = Arc::clone(&db);
            thread::spawn(move || db.lock(Duration::from_millis(500)))
        };

        thread::sleep(Duration::from_millis(30));
        db.unlock().unwrap();

        waiter
            .join()
            .expect("thread should not panic")
            .expect("waiter should acquire the lock after release");
        db.unlock().unwrap();
    }
}

//! The [`RefDatabase`] trait defining named-reference storage.

use std::time::Duration;

use crate::error::{RefError, RefResult};
use crate::types::{Ref, RefChange, RefTarget};

/// Maximum symbolic indirections followed by [`RefDatabase::resolve`].
const MAX_SYMBOLIC_DEPTH: usize = 10;

/// Storage backend for named references.
///
/// Implementations must be thread-safe and provide atomic mutations, each
/// returning a [`RefChange`] describing the before/after state. The
/// namespace follows a hierarchical layout:
///
/// - `HEAD`, `WORK_HEAD`, `STAGE_HEAD` for the checked-out state
/// - `refs/heads/*` for branches, `refs/tags/*` for tags
/// - `transactions/{id}/...` for transaction namespaces
///
/// The database also carries the repository-wide advisory lock that
/// serializes transaction begin/commit against other writers.
pub trait RefDatabase: Send + Sync {
    /// Read a ref by name. Returns `Ok(None)` if absent.
    fn get(&self, name: &str) -> RefResult<Option<Ref>>;

    /// List all refs whose name starts with `prefix`, sorted by name.
    /// Pass `""` to list everything.
    fn get_all(&self, prefix: &str) -> RefResult<Vec<Ref>>;

    /// Create or update a ref.
    fn put(&self, reference: Ref) -> RefResult<RefChange>;

    /// Apply several updates, in order, as one batch.
    fn put_all(&self, refs: Vec<Ref>) -> RefResult<Vec<RefChange>> {
        refs.into_iter().map(|r| self.put(r)).collect()
    }

    /// Delete a ref by name. The returned change has `new == None`; its
    /// `old` is `None` when the ref did not exist.
    fn delete(&self, name: &str) -> RefResult<RefChange>;

    /// Delete every ref under `prefix`, returning one change per deleted
    /// ref.
    fn delete_all(&self, prefix: &str) -> RefResult<Vec<RefChange>>;

    /// Acquire the repository-wide advisory lock, waiting at most
    /// `timeout`. Fails with [`RefError::LockTimeout`] on expiry; the
    /// core never retries past that bound.
    fn lock(&self, timeout: Duration) -> RefResult<()>;

    /// Release the repository-wide advisory lock.
    fn unlock(&self) -> RefResult<()>;

    /// Follow symbolic refs until a direct ref is reached.
    ///
    /// Returns `Ok(None)` when the name (or any link of the chain) does
    /// not exist, and [`RefError::Unresolvable`] when the chain exceeds
    /// the indirection bound (a cycle).
    fn resolve(&self, name: &str) -> RefResult<Option<Ref>> {
        let mut current = match self.get(name)? {
            Some(r) => r,
            None => return Ok(None),
        };
        for _ in 0..MAX_SYMBOLIC_DEPTH {
            match &current.target {
                RefTarget::Direct(_) => return Ok(Some(current)),
                RefTarget::Symbolic(target) => match self.get(target)? {
                    Some(next) => current = next,
                    None => return Ok(None),
                },
            }
        }
        Err(RefError::Unresolvable {
            name: name.to_string(),
        })
    }
}

//! Transaction isolation for strata.
//!
//! Multiple writers work against one repository by scoping every ref,
//! conflict, and blob they touch under a generated transaction
//! namespace. A [`Transaction`] is begun under the repository-wide
//! advisory lock, mutated freely through its namespaced views, and ended
//! by either committing (reconciling changed refs back into the live ref
//! space, rebasing or merging branches that moved concurrently) or
//! aborting (discarding the namespace).
//!
//! Merge and rebase conflicts at commit time are recoverable: they are
//! recorded in the transaction's [`ConflictStore`] and surfaced as
//! [`TxError::Conflict`], leaving the transaction open for the caller to
//! resolve and retry.

pub mod blobs;
pub mod conflicts;
pub mod error;
pub mod reconcile;
pub mod transaction;

pub use blobs::{BlobStore, InMemoryBlobStore, NamespacedBlobStore};
pub use conflicts::{Conflict, ConflictStore, InMemoryConflictStore, NamespacedConflictStore};
pub use error::{TxError, TxResult};
pub use reconcile::{
    apply_changes, merge_base, merge_commits, merge_trees, rebase_onto, MergeOutcome,
    RebaseOutcome,
};
pub use transaction::{
    CommitMode, RepoContext, Transaction, DEFAULT_LOCK_TIMEOUT, TRANSACTIONS_PREFIX,
};

//! Error types for transaction isolation.

use strata_model::ModelError;
use strata_refs::RefError;
use strata_store::StoreError;
use strata_tree::TreeError;
use thiserror::Error;

/// Errors that can occur beginning, using, or ending a transaction.
#[derive(Debug, Error)]
pub enum TxError {
    /// A transaction was begun from inside another transaction's
    /// context. Programmer misuse, not a data problem.
    #[error("cannot begin a transaction within a transaction")]
    NestedTransaction,

    /// The transaction has already been committed or aborted.
    #[error("transaction already closed")]
    TransactionClosed,

    /// Reconciling the transaction against the live refs hit a merge or
    /// rebase conflict.
    ///
    /// Recoverable: the transaction stays open; the caller resolves the
    /// recorded conflicts and commits again.
    #[error("CONFLICT: cannot reconcile {ref_name}: {paths:?}")]
    Conflict {
        ref_name: String,
        paths: Vec<String>,
    },

    /// Ref database failure, including lock timeouts (propagated as-is,
    /// never retried internally).
    #[error(transparent)]
    Ref(#[from] RefError),

    /// Object store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Tree building or diffing failure.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Object model failure.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Convenience alias for transaction operations.
pub type TxResult<T> = std::result::Result<T, TxError>;

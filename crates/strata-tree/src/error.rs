//! Error types for tree building.

use strata_model::ModelError;
use strata_store::StoreError;
use thiserror::Error;

/// Errors that can occur building or diffing trees.
#[derive(Debug, Error)]
pub enum TreeError {
    /// A mutating method was called on a builder after `build()` or
    /// `dispose()`. Programmer misuse, not a data problem.
    #[error("tree builder already disposed")]
    BuilderDisposed,

    /// `update` was given nodes with different names.
    #[error("update requires matching node names: {old} vs {new}")]
    NameMismatch { old: String, new: String },

    /// A non-feature node was offered to a quad-tree builder.
    #[error("only feature nodes can be clustered spatially: {name}")]
    NonFeatureNode { name: String },

    /// A pending-change DAG's recorded child count disagrees with its
    /// actual children. Invariant violation; fatal.
    #[error("child count mismatch at {tree_id}: recorded {recorded}, collected {collected}")]
    CountMismatch {
        tree_id: String,
        recorded: i64,
        collected: usize,
    },

    /// A staged child has no node recorded for it. Invariant violation.
    #[error("no staged node for child {name}")]
    MissingNode { name: String },

    /// Object store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Object model failure.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Convenience alias for tree operations.
pub type TreeResult<T> = std::result::Result<T, TreeError>;

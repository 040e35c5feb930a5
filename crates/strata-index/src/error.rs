//! Error types for index management.

use strata_model::ModelError;
use strata_refs::RefError;
use strata_store::StoreError;
use strata_tree::TreeError;
use thiserror::Error;

/// Errors that can occur creating, updating, or dropping indexes.
#[derive(Debug, Error)]
pub enum IndexError {
    /// An index already exists for this tree and attribute.
    #[error("an index already exists for tree {tree:?} attribute {attribute:?}")]
    AlreadyExists { tree: String, attribute: String },

    /// No index matched the given tree (and attribute).
    #[error("no index found for tree {tree:?}")]
    NotFound { tree: String },

    /// Several indexes exist for the tree; the attribute must be given.
    #[error("multiple indexes found for tree {tree:?}, specify the attribute")]
    Ambiguous { tree: String },

    /// The attribute is absent from the tree's schema or not usable for
    /// the requested index type.
    #[error("invalid index attribute {attribute:?} on tree {tree:?}: {reason}")]
    InvalidAttribute {
        tree: String,
        attribute: String,
        reason: String,
    },

    /// The index already materializes attributes; changing them requires
    /// an explicit add or overwrite mode.
    #[error("index for tree {tree:?} already has extra attributes, specify add or overwrite")]
    AttributeModeRequired { tree: String },

    /// The named feature tree does not exist in the commit's root tree.
    #[error("feature tree not found: {name}")]
    TreeNameNotFound { name: String },

    /// The ref the operation targets does not exist or has no commit.
    #[error("cannot resolve ref: {name}")]
    UnresolvedRef { name: String },

    /// Ref database failure.
    #[error(transparent)]
    Ref(#[from] RefError),

    /// Object store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Tree builder failure.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Object model failure.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Convenience alias for index operations.
pub type IndexResult<T> = std::result::Result<T, IndexError>;

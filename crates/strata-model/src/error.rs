//! Error types for the revision object model.

use strata_types::ObjectId;
use thiserror::Error;

/// Errors that can occur constructing or decoding revision objects.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A feature's value count does not match its schema's descriptor count.
    #[error("feature has {actual} values but the type defines {expected} descriptors")]
    ValueCountMismatch { expected: usize, actual: usize },

    /// A tree was given both direct children and buckets.
    ///
    /// Leaf and inner shapes are mutually exclusive; a mixed node would
    /// break the size/num_trees accounting and is an internal invariant
    /// violation, never a recoverable condition.
    #[error("tree cannot hold both direct children and buckets")]
    MixedTree,

    /// A tree's declared size is inconsistent with its children.
    #[error("tree size mismatch: declared {declared}, computed {computed}")]
    SizeMismatch { declared: u64, computed: u64 },

    /// An object failed to encode to its canonical byte form.
    #[error("encode error: {0}")]
    Encode(String),

    /// A stored byte sequence failed to decode as a revision object.
    #[error("decode error for {id:?}: {reason}")]
    Decode { id: ObjectId, reason: String },

    /// The decoded object was not of the expected kind.
    #[error("object {id:?} is a {actual}, expected {expected}")]
    KindMismatch {
        id: ObjectId,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Convenience alias for model operations.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

//! Error types for object storage.

use strata_model::ModelError;
use strata_types::ObjectId;
use thiserror::Error;

/// Errors that can occur reading or writing revision objects.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested object is not present in the store.
    #[error("object not found: {0:?}")]
    NotFound(ObjectId),

    /// A stored object decoded to content whose hash does not match the
    /// id it was stored under. Indicates store corruption; never
    /// recovered automatically.
    #[error("corrupt object: stored as {stored:?} but content hashes to {actual:?}")]
    Corrupt { stored: ObjectId, actual: ObjectId },

    /// Attempted to store an object under the null id.
    #[error("cannot store an object with the null id")]
    NullObjectId,

    /// Encoding or decoding through the object model failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// I/O failure in a persistent backend.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

//! Error types for reference operations.

use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The reference was not found.
    #[error("ref not found: {name}")]
    NotFound { name: String },

    /// The ref name is invalid.
    #[error("invalid ref name: {name}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A symbolic ref chain did not resolve to a direct ref.
    #[error("symbolic ref does not resolve: {name}")]
    Unresolvable { name: String },

    /// The repository lock could not be acquired within the bounded wait.
    ///
    /// Propagated as-is; retry policy is a caller concern.
    #[error("timed out waiting for the ref database lock after {waited_ms}ms")]
    LockTimeout { waited_ms: u64 },

    /// I/O failure in a persistent backend.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for ref operations.
pub type RefResult<T> = std::result::Result<T, RefError>;

//! Error types for identifier parsing and validation.

use thiserror::Error;

/// Errors that can occur constructing or parsing foundation types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    /// A hex string could not be decoded.
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    /// A byte sequence had the wrong length for the target type.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

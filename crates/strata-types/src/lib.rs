//! Foundation types for strata.
//!
//! This crate provides the content-addressed identity type used throughout
//! the strata system. Every other strata crate depends on `strata-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`] — Content-addressed identifier (BLAKE3 hash) of a revision
//!   object's canonical encoding
//! - [`TypeError`] — Errors for identifier parsing and validation

pub mod error;
pub mod object;

pub use error::TypeError;
pub use object::ObjectId;

//! Named reference management for strata.
//!
//! Refs are the mutable entry points into the immutable object graph:
//! branches, tags, and the `HEAD` family of symbolic refs. Every mutation
//! returns a [`RefChange`] describing before and after, which the
//! transaction layer relies on to reconcile concurrent sessions. The
//! [`RefDatabase`] also carries the repository-wide advisory lock.
//!
//! # Key Types
//!
//! - [`Ref`] / [`RefTarget`] — direct and symbolic named pointers
//! - [`RefChange`] — before/after mutation descriptor
//! - [`RefDatabase`] — the storage trait, with bounded-wait `lock()`
//! - [`InMemoryRefDatabase`] — test/embedding implementation
//! - [`NamespacedRefDatabase`] — prefix-scoping decorator used by
//!   transactions

pub mod error;
pub mod memory;
pub mod names;
pub mod namespace;
pub mod traits;
pub mod types;

pub use error::{RefError, RefResult};
pub use memory::InMemoryRefDatabase;
pub use names::validate_ref_name;
pub use namespace::NamespacedRefDatabase;
pub use traits::RefDatabase;
pub use types::{
    Ref, RefChange, RefTarget, HEAD, HEADS_PREFIX, REFS_PREFIX, STAGE_HEAD, TAGS_PREFIX, WORK_HEAD,
};

//! Secondary index management for strata.
//!
//! An index is a tree structure, spatially or attribute clustered, that
//! mirrors one canonical feature tree for accelerated queries. Index
//! metadata lives in an [`IndexDatabase`]; one indexed tree snapshot is
//! recorded per canonical tree version, so history can be queried through
//! the index too. Index trees are ordinary
//! [`RevTree`](strata_model::RevTree)s built with the quad-tree or
//! canonical clustering strategies and share storage with everything
//! else.
//!
//! # Operations
//!
//! - [`CreateIndexOp`] — register an index and build the current (and
//!   optionally every historic) snapshot
//! - [`UpdateIndexOp`] — change the materialized attribute list
//! - [`DropIndexOp`] — remove an index
//! - [`UpdateIndexesOp`] — incremental per-commit refresh of every index
//!   on a branch
//! - [`build_full_history`] — cancellable whole-history indexing

pub mod build;
pub mod db;
pub mod error;
pub mod info;
pub mod ops;

pub use build::{find_tree_node, NoopProgress, ProgressListener};
pub use db::{InMemoryIndexDatabase, IndexDatabase};
pub use error::{IndexError, IndexResult};
pub use info::{Index, IndexInfo, IndexType};
pub use ops::{
    build_full_history, AttributeUpdateMode, CreateIndexOp, DropIndexOp, IndexContext,
    UpdateIndexOp, UpdateIndexesOp,
};

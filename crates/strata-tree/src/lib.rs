//! Tree building for strata.
//!
//! This crate turns unordered sets of feature records into deterministic,
//! hash-addressed, sharded trees, and incrementally updates them under
//! insert/remove/update. The structure of a tree is decided by a
//! pluggable [`ClusteringStrategy`]; two ship with the crate:
//!
//! - [`CanonicalStrategy`] — name-hash ordered trees whose shape is a
//!   pure function of the entry set;
//! - [`QuadTreeStrategy`] — spatial trees subdividing a fixed envelope
//!   into quadrants.
//!
//! Mutations accumulate in an in-memory pending-change DAG
//! ([`dag`]) layered over the original persisted tree; [`RevTreeBuilder`]
//! materializes it into immutable [`RevTree`](strata_model::RevTree)s at
//! build time, rewriting only changed subtrees. [`diff`] compares two
//! tree generations in time proportional to their difference.

pub mod builder;
pub mod dag;
pub mod diff;
pub mod error;
mod flush;
pub mod quad;
pub mod strategy;
mod working;

pub use builder::RevTreeBuilder;
pub use dag::{Dag, DagState, NodeId, TreeId};
pub use diff::{diff_trees, find_node, find_path, DiffEntry};
pub use error::{TreeError, TreeResult};
pub use flush::AbortFlag;
pub use quad::{Quadrant, QUADRANTS};
pub use strategy::{
    CanonicalStrategy, ClusteringStrategy, MissingBoundsPolicy, Placement, QuadTreeConfig,
    QuadTreeStrategy, UNPROMOTABLE_BUCKET,
};

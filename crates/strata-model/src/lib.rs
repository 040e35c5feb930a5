//! Revision object model for strata.
//!
//! Every versioned state of a dataset is expressed with the immutable,
//! content-addressed objects defined here: feature records and their
//! schemas, persistent hash trees, and commit/tag metadata. Objects never
//! mutate after construction; identity and equality are defined by the
//! BLAKE3 hash of each object's canonical encoding.
//!
//! # Key Types
//!
//! - [`Value`] / [`Geometry`] — typed attribute values
//! - [`RevFeature`] — one record's ordered attribute array
//! - [`RevFeatureType`] — an immutable schema
//! - [`RevTree`] / [`Node`] / [`TreeBucket`] — the persistent hash tree
//! - [`RevCommit`] / [`RevTag`] / [`RevPerson`] — history metadata
//! - [`CanonicalNodeOrder`] — the fixed storage order of tree entries
//! - [`RevObject`] — the closed union the object store persists

pub mod commit;
pub mod error;
pub mod feature;
pub mod feature_type;
pub mod geometry;
pub mod hash;
pub mod order;
pub mod revobject;
pub mod tree;
pub mod value;

pub use commit::{RevCommit, RevPerson, RevTag};
pub use error::{ModelError, ModelResult};
pub use feature::RevFeature;
pub use feature_type::{Crs, PropertyDescriptor, RevFeatureType};
pub use geometry::{Coord, Envelope, Geometry};
pub use hash::ContentHasher;
pub use order::CanonicalNodeOrder;
pub use revobject::{ObjectKind, RevObject};
pub use tree::{Node, NodeKind, RevTree, TreeBucket};
pub use value::{FieldKind, Value};

//! Index metadata records.

use serde::{Deserialize, Serialize};
use strata_model::Envelope;
use strata_types::ObjectId;

/// How an index clusters the mirrored feature tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexType {
    /// Clustered canonically, with attribute values materialized on the
    /// nodes.
    Attribute,
    /// Clustered spatially by quadrants of the index bounds.
    QuadTree,
}

/// Persisted description of one secondary index: which canonical tree it
/// mirrors, by which attribute, and how.
///
/// Never mutated in place; updates replace the record through
/// [`IndexDatabase::update_index_info`](crate::IndexDatabase::update_index_info).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    /// Name of the canonical feature tree this index mirrors.
    pub tree_name: String,
    /// The indexed attribute.
    pub attribute: String,
    pub index_type: IndexType,
    /// The fixed envelope a quad-tree index subdivides.
    pub bounds: Option<Envelope>,
    /// Attribute values materialized on every index node, so filters on
    /// them can be evaluated without loading features.
    pub extra_attributes: Vec<String>,
}

impl IndexInfo {
    pub fn new(
        tree_name: impl Into<String>,
        attribute: impl Into<String>,
        index_type: IndexType,
    ) -> Self {
        Self {
            tree_name: tree_name.into(),
            attribute: attribute.into(),
            index_type,
            bounds: None,
            extra_attributes: Vec::new(),
        }
    }

    /// Identifier of this index, derived from the tree and attribute
    /// names: one index per (tree, attribute) pair.
    pub fn id(&self) -> ObjectId {
        ObjectId::hash_of(format!("{}\0{}", self.tree_name, self.attribute).as_bytes())
    }
}

/// One indexed snapshot: the index metadata paired with the id of the
/// index tree mirroring a specific canonical tree version. Many `Index`
/// values accumulate over time for one [`IndexInfo`].
#[derive(Clone, Debug, PartialEq)]
pub struct Index {
    pub info: IndexInfo,
    /// The canonical feature tree version this snapshot mirrors.
    pub canonical_tree: ObjectId,
    /// The root of the index tree built for that version.
    pub indexed_tree: ObjectId,
}

//! The closed set of hash-addressed revision objects.

use serde::{Deserialize, Serialize};
use strata_types::ObjectId;

use crate::commit::{RevCommit, RevTag};
use crate::error::{ModelError, ModelResult};
use crate::feature::RevFeature;
use crate::feature_type::RevFeatureType;
use crate::tree::RevTree;

/// The kind tag of a revision object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Tree,
    Feature,
    FeatureType,
    Commit,
    Tag,
}

impl ObjectKind {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::Feature => "feature",
            Self::FeatureType => "featuretype",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Any hash-addressed object: the unit the object store reads and writes.
///
/// Equality is defined by content, which by construction is equivalent to
/// equality of [`ObjectId`]s.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RevObject {
    Tree(RevTree),
    Feature(RevFeature),
    FeatureType(RevFeatureType),
    Commit(RevCommit),
    Tag(RevTag),
}

impl RevObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Tree(_) => ObjectKind::Tree,
            Self::Feature(_) => ObjectKind::Feature,
            Self::FeatureType(_) => ObjectKind::FeatureType,
            Self::Commit(_) => ObjectKind::Commit,
            Self::Tag(_) => ObjectKind::Tag,
        }
    }

    /// The content-addressed id of the wrapped object.
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Tree(t) => t.id(),
            Self::Feature(f) => f.id(),
            Self::FeatureType(t) => t.id(),
            Self::Commit(c) => c.id(),
            Self::Tag(t) => t.id(),
        }
    }

    /// Serialize to the byte form the object store persists.
    pub fn encode(&self) -> ModelResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| ModelError::Encode(e.to_string()))
    }

    /// Decode from stored bytes.
    pub fn decode(id: ObjectId, bytes: &[u8]) -> ModelResult<Self> {
        bincode::deserialize(bytes).map_err(|e| ModelError::Decode {
            id,
            reason: e.to_string(),
        })
    }

    pub fn into_tree(self) -> ModelResult<RevTree> {
        match self {
            Self::Tree(t) => Ok(t),
            other => Err(kind_mismatch(&other, ObjectKind::Tree)),
        }
    }

    pub fn into_feature(self) -> ModelResult<RevFeature> {
        match self {
            Self::Feature(f) => Ok(f),
            other => Err(kind_mismatch(&other, ObjectKind::Feature)),
        }
    }

    pub fn into_feature_type(self) -> ModelResult<RevFeatureType> {
        match self {
            Self::FeatureType(t) => Ok(t),
            other => Err(kind_mismatch(&other, ObjectKind::FeatureType)),
        }
    }

    pub fn into_commit(self) -> ModelResult<RevCommit> {
        match self {
            Self::Commit(c) => Ok(c),
            other => Err(kind_mismatch(&other, ObjectKind::Commit)),
        }
    }

    pub fn into_tag(self) -> ModelResult<RevTag> {
        match self {
            Self::Tag(t) => Ok(t),
            other => Err(kind_mismatch(&other, ObjectKind::Tag)),
        }
    }
}

fn kind_mismatch(obj: &RevObject, expected: ObjectKind) -> ModelError {
    ModelError::KindMismatch {
        id: obj.id(),
        expected: expected.name(),
        actual: obj.kind().name(),
    }
}

impl From<RevTree> for RevObject {
    fn from(t: RevTree) -> Self {
        Self::Tree(t)
    }
}

impl From<RevFeature> for RevObject {
    fn from(f: RevFeature) -> Self {
        Self::Feature(f)
    }
}

impl From<RevFeatureType> for RevObject {
    fn from(t: RevFeatureType) -> Self {
        Self::FeatureType(t)
    }
}

impl From<RevCommit> for RevObject {
    fn from(c: RevCommit) -> Self {
        Self::Commit(c)
    }
}

impl From<RevTag> for RevObject {
    fn from(t: RevTag) -> Self {
        Self::Tag(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn encode_decode_roundtrip() {
        let obj = RevObject::Feature(RevFeature::new(vec![
            Value::Long(7),
            Value::String("main".into()),
        ]));
        let id = obj.id();
        let bytes = obj.encode().unwrap();
        let decoded = RevObject::decode(id, &bytes).unwrap();
        assert_eq!(obj, decoded);
        assert_eq!(decoded.id(), id);
    }

    #[test]
    fn tree_roundtrip_preserves_id() {
        let tree = RevTree::leaf(
            1,
            vec![],
            vec![crate::tree::Node::feature("f", ObjectId::hash_of(b"f"))],
        );
        let obj = RevObject::Tree(tree);
        let id = obj.id();
        let decoded = RevObject::decode(id, &obj.encode().unwrap()).unwrap();
        assert_eq!(decoded.id(), id);
    }

    #[test]
    fn kind_accessors_enforce_kind() {
        let obj = RevObject::Feature(RevFeature::new(vec![Value::Null]));
        let err = obj.into_tree().unwrap_err();
        assert!(matches!(
            err,
            ModelError::KindMismatch {
                expected: "tree",
                actual: "feature",
                ..
            }
        ));
    }

    #[test]
    fn decode_garbage_fails() {
        let err = RevObject::decode(ObjectId::NULL, &[0xff, 0xfe, 0xfd]).unwrap_err();
        assert!(matches!(err, ModelError::Decode { .. }));
    }

    #[test]
    fn kind_names() {
        assert_eq!(ObjectKind::Tree.to_string(), "tree");
        assert_eq!(ObjectKind::FeatureType.to_string(), "featuretype");
    }
}

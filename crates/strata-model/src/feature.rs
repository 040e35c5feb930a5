//! Feature records: immutable, ordered attribute-value arrays.

use serde::{Deserialize, Serialize};
use strata_types::ObjectId;

use crate::error::{ModelError, ModelResult};
use crate::feature_type::RevFeatureType;
use crate::geometry::Envelope;
use crate::hash;
use crate::value::Value;

/// One record: a fixed-length, ordered sequence of attribute values.
///
/// Value count and positional order match the associated
/// [`RevFeatureType`]'s descriptor order. Geometry values are normalized
/// (canonical ring winding) at construction, before hashing, so that
/// semantically identical geometries always produce the same id regardless
/// of input winding order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevFeature {
    values: Vec<Value>,
}

impl RevFeature {
    /// Build a feature from attribute values, canonicalizing geometries.
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values: values.into_iter().map(Value::normalized).collect(),
        }
    }

    /// Build a feature and check the value count against a schema.
    pub fn with_type(values: Vec<Value>, ftype: &RevFeatureType) -> ModelResult<Self> {
        if values.len() != ftype.descriptors().len() {
            return Err(ModelError::ValueCountMismatch {
                expected: ftype.descriptors().len(),
                actual: values.len(),
            });
        }
        Ok(Self::new(values))
    }

    /// The content-addressed id of this feature.
    pub fn id(&self) -> ObjectId {
        hash::hash_feature(self)
    }

    /// Number of attribute values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value at a given descriptor position.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// All values in descriptor order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The union envelope of every geometry value, or `None` when the
    /// feature carries no geometry.
    pub fn bounds(&self) -> Option<Envelope> {
        let mut env = Envelope::empty();
        for v in &self.values {
            if let Some(g) = v.as_geometry() {
                if let Some(e) = g.envelope() {
                    env.expand_to_include(&e);
                }
            }
        }
        if env.is_empty() {
            None
        } else {
            Some(env)
        }
    }
}

//! Typed attribute values.
//!
//! A [`Value`] is one slot of a feature's attribute array. Values are
//! immutable, serializable, and totally ordered within a kind so that
//! attribute-clustered indexes have a stable ordering to work with.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;

/// The declared kind of an attribute, as carried by a schema descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Bool,
    Int,
    Long,
    Float,
    Double,
    String,
    Uuid,
    Bytes,
    Geometry,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Uuid => "uuid",
            Self::Bytes => "bytes",
            Self::Geometry => "geometry",
        };
        write!(f, "{name}")
    }
}

/// One immutable attribute value. `Null` is a valid member of every kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Uuid(uuid::Uuid),
    Bytes(Vec<u8>),
    Geometry(Geometry),
}

impl Value {
    /// The kind this value belongs to, or `None` for `Null` (null carries
    /// no kind of its own; the schema descriptor does).
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(FieldKind::Bool),
            Value::Int(_) => Some(FieldKind::Int),
            Value::Long(_) => Some(FieldKind::Long),
            Value::Float(_) => Some(FieldKind::Float),
            Value::Double(_) => Some(FieldKind::Double),
            Value::String(_) => Some(FieldKind::String),
            Value::Uuid(_) => Some(FieldKind::Uuid),
            Value::Bytes(_) => Some(FieldKind::Bytes),
            Value::Geometry(_) => Some(FieldKind::Geometry),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The geometry payload, when this value is a geometry.
    pub fn as_geometry(&self) -> Option<&Geometry> {
        match self {
            Value::Geometry(g) => Some(g),
            _ => None,
        }
    }

    /// Canonicalize the value for hashing. Geometries get their ring
    /// winding normalized; every other kind is already canonical.
    pub fn normalized(self) -> Value {
        match self {
            Value::Geometry(g) => Value::Geometry(g.normalized()),
            other => other,
        }
    }

    /// Total order across values of the same kind, used by attribute
    /// clustering. Nulls sort first; mismatched kinds fall back to the
    /// kind's declaration order.
    pub fn compare(&self, other: &Value) -> Ordering {
        use Value::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Long(a), Long(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Double(a), Double(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (Uuid(a), Uuid(b)) => a.cmp(b),
            (Bytes(a), Bytes(b)) => a.cmp(b),
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }
}

fn rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) => 2,
        Value::Long(_) => 3,
        Value::Float(_) => 4,
        Value::Double(_) => 5,
        Value::String(_) => 6,
        Value::Uuid(_) => 7,
        Value::Bytes(_) => 8,
        Value::Geometry(_) => 9,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_of_values() {
        assert_eq!(Value::Null.kind(), None);
        assert_eq!(Value::Bool(true).kind(), Some(FieldKind::Bool));
        assert_eq!(Value::Long(7).kind(), Some(FieldKind::Long));
        assert_eq!(
            Value::Geometry(Geometry::Point((0.0, 0.0))).kind(),
            Some(FieldKind::Geometry)
        );
    }

    #[test]
    fn null_sorts_first() {
        assert_eq!(Value::Null.compare(&Value::Int(0)), Ordering::Less);
        assert_eq!(Value::Int(0).compare(&Value::Null), Ordering::Greater);
        assert_eq!(Value::Null.compare(&Value::Null), Ordering::Equal);
    }

    #[test]
    fn same_kind_ordering() {
        assert_eq!(Value::Int(1).compare(&Value::Int(2)), Ordering::Less);
        assert_eq!(
            Value::String("a".into()).compare(&Value::String("b".into())),
            Ordering::Less
        );
        assert_eq!(
            Value::Double(1.5).compare(&Value::Double(1.5)),
            Ordering::Equal
        );
    }

    #[test]
    fn normalized_only_touches_geometries() {
        let v = Value::String("unchanged".into());
        assert_eq!(v.clone().normalized(), v);

        let cw = vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)];
        let normalized = Value::Geometry(Geometry::Polygon(vec![cw])).normalized();
        let ccw = vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)];
        assert_eq!(normalized, Value::Geometry(Geometry::Polygon(vec![ccw])));
    }

    #[test]
    fn serde_roundtrip() {
        let v = Value::Geometry(Geometry::LineString(vec![(0.0, 0.0), (1.0, 1.0)]));
        let json = serde_json::to_string(&v).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v, parsed);
    }
}

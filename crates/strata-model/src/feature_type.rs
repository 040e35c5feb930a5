//! Feature schemas: ordered property descriptors with optional CRS.

use serde::{Deserialize, Serialize};
use strata_types::ObjectId;

use crate::hash;
use crate::value::FieldKind;

/// A coordinate reference system attached to a geometry descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crs {
    /// An EPSG code, e.g. `4326` for geographic WGS84.
    Epsg(u32),
    /// A raw well-known-text definition for systems without an EPSG code.
    Wkt(String),
}

/// The WGS84 longitude/latitude definition that equivalent geodetic WKT
/// renderings are collapsed to, so schema hashes stay stable across them.
pub const EPSG_4326: Crs = Crs::Epsg(4326);

/// Substring that identifies a WKT definition as geographic WGS84 in
/// longitude/latitude axis order.
const WGS84_WKT_MARKER: &str = "GEOGCS[\"WGS 84\"";

impl Crs {
    /// Collapse equivalent geodetic definitions onto the canonical EPSG
    /// code. A WKT body describing geographic WGS84 hashes identically to
    /// `Crs::Epsg(4326)` after this substitution.
    pub fn normalized(self) -> Crs {
        match self {
            Crs::Wkt(ref wkt) if wkt.starts_with(WGS84_WKT_MARKER) => EPSG_4326,
            other => other,
        }
    }
}

/// One attribute slot of a schema: name, kind, and (for geometry
/// attributes) the coordinate reference system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub crs: Option<Crs>,
}

impl PropertyDescriptor {
    /// A non-geometry descriptor.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            crs: None,
        }
    }

    /// A geometry descriptor with a CRS. The CRS is normalized so that
    /// equivalent geodetic definitions hash identically.
    pub fn geometry(name: impl Into<String>, crs: Crs) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Geometry,
            crs: Some(crs.normalized()),
        }
    }

    pub fn is_geometry(&self) -> bool {
        self.kind == FieldKind::Geometry
    }
}

/// An immutable feature schema: the ordered list of property descriptors
/// features of this type conform to.
///
/// Built once from an external schema definition, hashed, stored; never
/// mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevFeatureType {
    name: String,
    descriptors: Vec<PropertyDescriptor>,
}

impl RevFeatureType {
    pub fn new(name: impl Into<String>, descriptors: Vec<PropertyDescriptor>) -> Self {
        Self {
            name: name.into(),
            descriptors,
        }
    }

    /// The content-addressed id of this schema.
    pub fn id(&self) -> ObjectId {
        hash::hash_feature_type(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptors in positional order.
    pub fn descriptors(&self) -> &[PropertyDescriptor] {
        &self.descriptors
    }

    /// Find a descriptor and its position by attribute name.
    pub fn descriptor(&self, attribute: &str) -> Option<(usize, &PropertyDescriptor)> {
        self.descriptors
            .iter()
            .enumerate()
            .find(|(_, d)| d.name == attribute)
    }

    /// The first geometry descriptor, the default one spatial operations
    /// apply to.
    pub fn default_geometry(&self) -> Option<(usize, &PropertyDescriptor)> {
        self.descriptors
            .iter()
            .enumerate()
            .find(|(_, d)| d.is_geometry())
    }
}

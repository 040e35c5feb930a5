//! Geometry values and axis-aligned bounding envelopes.
//!
//! Geometries are plain coordinate sequences over `f64`. Before a feature is
//! hashed, every polygonal geometry is [normalized](Geometry::normalized) so
//! that ring winding order is canonical: exterior rings counter-clockwise,
//! interior rings clockwise. Two geometries that differ only in input winding
//! therefore always produce the same canonical encoding and the same
//! [`ObjectId`](strata_types::ObjectId).

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in coordinate units.
///
/// An envelope may be *empty* (`min > max`), representing the bounds of
/// nothing. Empty envelopes contain nothing and intersect nothing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Create an envelope from min/max coordinates.
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// An empty envelope.
    pub fn empty() -> Self {
        Self {
            min_x: 0.0,
            min_y: 0.0,
            max_x: -1.0,
            max_y: -1.0,
        }
    }

    /// The world extent in geographic degrees, the default maximum bounds
    /// for quad-tree clustering.
    pub fn world() -> Self {
        Self::new(-180.0, 180.0, -90.0, 90.0)
    }

    /// An envelope covering a single point.
    pub fn point(x: f64, y: f64) -> Self {
        Self::new(x, x, y, y)
    }

    /// Returns `true` if this envelope covers nothing.
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_x - self.min_x
        }
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_y - self.min_y
        }
    }

    /// Grow this envelope to include the given point.
    pub fn expand_to_point(&mut self, x: f64, y: f64) {
        if self.is_empty() {
            *self = Self::point(x, y);
        } else {
            self.min_x = self.min_x.min(x);
            self.min_y = self.min_y.min(y);
            self.max_x = self.max_x.max(x);
            self.max_y = self.max_y.max(y);
        }
    }

    /// Grow this envelope to include another envelope.
    pub fn expand_to_include(&mut self, other: &Envelope) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = *other;
        } else {
            self.min_x = self.min_x.min(other.min_x);
            self.min_y = self.min_y.min(other.min_y);
            self.max_x = self.max_x.max(other.max_x);
            self.max_y = self.max_y.max(other.max_y);
        }
    }

    /// Returns `true` if `other` lies entirely within this envelope.
    pub fn contains(&self, other: &Envelope) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Returns `true` if the two envelopes overlap.
    pub fn intersects(&self, other: &Envelope) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && other.min_x <= self.max_x
            && other.max_x >= self.min_x
            && other.min_y <= self.max_y
            && other.max_y >= self.min_y
    }
}

/// A 2D coordinate.
pub type Coord = (f64, f64);

/// A geometry value attached to a feature attribute.
///
/// Rings of polygons are closed coordinate sequences (first == last point).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point(Coord),
    LineString(Vec<Coord>),
    /// First ring is the exterior shell, the rest are interior holes.
    Polygon(Vec<Vec<Coord>>),
    MultiPoint(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Vec<Vec<Coord>>>),
    GeometryCollection(Vec<Geometry>),
}

impl Geometry {
    /// The bounding envelope of this geometry, or `None` when the geometry
    /// has no coordinates at all.
    pub fn envelope(&self) -> Option<Envelope> {
        let mut env = Envelope::empty();
        self.expand(&mut env);
        if env.is_empty() {
            None
        } else {
            Some(env)
        }
    }

    fn expand(&self, env: &mut Envelope) {
        match self {
            Geometry::Point((x, y)) => env.expand_to_point(*x, *y),
            Geometry::LineString(coords) | Geometry::MultiPoint(coords) => {
                for (x, y) in coords {
                    env.expand_to_point(*x, *y);
                }
            }
            Geometry::Polygon(rings) | Geometry::MultiLineString(rings) => {
                for ring in rings {
                    for (x, y) in ring {
                        env.expand_to_point(*x, *y);
                    }
                }
            }
            Geometry::MultiPolygon(polys) => {
                for rings in polys {
                    for ring in rings {
                        for (x, y) in ring {
                            env.expand_to_point(*x, *y);
                        }
                    }
                }
            }
            Geometry::GeometryCollection(geoms) => {
                for g in geoms {
                    g.expand(env);
                }
            }
        }
    }

    /// Canonicalize ring winding order, recursively through multi-geometries
    /// and collections: exterior rings counter-clockwise, interior rings
    /// clockwise. Point and line geometries are returned unchanged.
    pub fn normalized(self) -> Geometry {
        match self {
            Geometry::Polygon(rings) => Geometry::Polygon(normalize_rings(rings)),
            Geometry::MultiPolygon(polys) => {
                Geometry::MultiPolygon(polys.into_iter().map(normalize_rings).collect())
            }
            Geometry::GeometryCollection(geoms) => Geometry::GeometryCollection(
                geoms.into_iter().map(Geometry::normalized).collect(),
            ),
            other => other,
        }
    }
}

fn normalize_rings(rings: Vec<Vec<Coord>>) -> Vec<Vec<Coord>> {
    rings
        .into_iter()
        .enumerate()
        .map(|(i, ring)| {
            let exterior = i == 0;
            orient_ring(ring, exterior)
        })
        .collect()
}

/// Reverse a closed ring when its winding does not match the requested
/// orientation. A counter-clockwise ring has positive signed area.
fn orient_ring(mut ring: Vec<Coord>, counter_clockwise: bool) -> Vec<Coord> {
    let area = signed_area(&ring);
    let is_ccw = area > 0.0;
    if area != 0.0 && is_ccw != counter_clockwise {
        ring.reverse();
    }
    ring
}

/// Twice-signed shoelace area of a closed ring. Positive when the ring is
/// wound counter-clockwise.
fn signed_area(ring: &[Coord]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for w in ring.windows(2) {
        let (x1, y1) = w[0];
        let (x2, y2) = w[1];
        sum += (x2 - x1) * (y2 + y1);
    }
    // The sum above is positive for clockwise rings; flip the sign so that
    // counter-clockwise comes out positive.
    -sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_ccw() -> Vec<Coord> {
        vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]
    }

    fn square_cw() -> Vec<Coord> {
        vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)]
    }

    // -----------------------------------------------------------------------
    // Envelope
    // -----------------------------------------------------------------------

    #[test]
    fn empty_envelope_covers_nothing() {
        let empty = Envelope::empty();
        assert!(empty.is_empty());
        assert!(!empty.contains(&Envelope::point(0.0, 0.0)));
        assert!(!empty.intersects(&Envelope::world()));
        assert_eq!(empty.width(), 0.0);
    }

    #[test]
    fn expand_from_empty_adopts_point() {
        let mut env = Envelope::empty();
        env.expand_to_point(3.0, 4.0);
        assert_eq!(env, Envelope::point(3.0, 4.0));
    }

    #[test]
    fn expand_to_include_unions() {
        let mut env = Envelope::point(0.0, 0.0);
        env.expand_to_include(&Envelope::point(10.0, -5.0));
        assert_eq!(env, Envelope::new(0.0, 10.0, -5.0, 0.0));

        // Including an empty envelope is a no-op.
        env.expand_to_include(&Envelope::empty());
        assert_eq!(env, Envelope::new(0.0, 10.0, -5.0, 0.0));
    }

    #[test]
    fn contains_and_intersects() {
        let world = Envelope::world();
        let small = Envelope::new(0.0, 1.0, 0.0, 1.0);
        assert!(world.contains(&small));
        assert!(!small.contains(&world));
        assert!(world.intersects(&small));

        let east = Envelope::new(10.0, 20.0, 0.0, 1.0);
        assert!(!small.intersects(&east));
    }

    // -----------------------------------------------------------------------
    // Geometry envelopes
    // -----------------------------------------------------------------------

    #[test]
    fn point_envelope() {
        let env = Geometry::Point((1.5, -2.5)).envelope().unwrap();
        assert_eq!(env, Envelope::point(1.5, -2.5));
    }

    #[test]
    fn polygon_envelope() {
        let env = Geometry::Polygon(vec![square_ccw()]).envelope().unwrap();
        assert_eq!(env, Envelope::new(0.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn empty_linestring_has_no_envelope() {
        assert!(Geometry::LineString(vec![]).envelope().is_none());
    }

    #[test]
    fn collection_envelope_unions_members() {
        let g = Geometry::GeometryCollection(vec![
            Geometry::Point((-10.0, 0.0)),
            Geometry::Point((10.0, 5.0)),
        ]);
        assert_eq!(g.envelope().unwrap(), Envelope::new(-10.0, 10.0, 0.0, 5.0));
    }

    // -----------------------------------------------------------------------
    // Normalization
    // -----------------------------------------------------------------------

    #[test]
    fn signed_area_sign_matches_winding() {
        assert!(signed_area(&square_ccw()) > 0.0);
        assert!(signed_area(&square_cw()) < 0.0);
    }

    #[test]
    fn clockwise_exterior_is_reversed() {
        let normalized = Geometry::Polygon(vec![square_cw()]).normalized();
        let expected = Geometry::Polygon(vec![square_ccw()]).normalized();
        assert_eq!(normalized, expected);
    }

    #[test]
    fn counter_clockwise_exterior_is_kept() {
        let g = Geometry::Polygon(vec![square_ccw()]);
        assert_eq!(g.clone().normalized(), g);
    }

    #[test]
    fn holes_are_oriented_clockwise() {
        let hole_ccw = vec![
            (0.25, 0.25),
            (0.75, 0.25),
            (0.75, 0.75),
            (0.25, 0.75),
            (0.25, 0.25),
        ];
        let g = Geometry::Polygon(vec![square_ccw(), hole_ccw.clone()]).normalized();
        if let Geometry::Polygon(rings) = g {
            assert!(signed_area(&rings[0]) > 0.0, "exterior must stay ccw");
            assert!(signed_area(&rings[1]) < 0.0, "hole must be flipped cw");
        } else {
            panic!("normalization changed the geometry kind");
        }
    }

    #[test]
    fn multipolygon_members_normalized() {
        let g = Geometry::MultiPolygon(vec![vec![square_cw()], vec![square_ccw()]]).normalized();
        if let Geometry::MultiPolygon(polys) = g {
            for rings in &polys {
                assert!(signed_area(&rings[0]) > 0.0);
            }
        } else {
            panic!("normalization changed the geometry kind");
        }
    }

    #[test]
    fn normalization_is_idempotent() {
        let g = Geometry::Polygon(vec![square_cw()]).normalized();
        assert_eq!(g.clone().normalized(), g);
    }
}

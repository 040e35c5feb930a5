//! Quadrant subdivision of a bounding envelope.

use strata_model::Envelope;

/// The four quadrants of an envelope, in bucket-index order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quadrant {
    SouthWest,
    NorthWest,
    NorthEast,
    SouthEast,
}

/// All quadrants, indexed by their bucket number.
pub const QUADRANTS: [Quadrant; 4] = [
    Quadrant::SouthWest,
    Quadrant::NorthWest,
    Quadrant::NorthEast,
    Quadrant::SouthEast,
];

impl Quadrant {
    /// The bucket index this quadrant maps to inside an inner tree node.
    pub fn bucket(&self) -> u8 {
        match self {
            Quadrant::SouthWest => 0,
            Quadrant::NorthWest => 1,
            Quadrant::NorthEast => 2,
            Quadrant::SouthEast => 3,
        }
    }

    /// The sub-envelope this quadrant occupies within `parent`.
    pub fn slice(&self, parent: &Envelope) -> Envelope {
        let mid_x = (parent.min_x + parent.max_x) / 2.0;
        let mid_y = (parent.min_y + parent.max_y) / 2.0;
        match self {
            Quadrant::SouthWest => Envelope::new(parent.min_x, mid_x, parent.min_y, mid_y),
            Quadrant::NorthWest => Envelope::new(parent.min_x, mid_x, mid_y, parent.max_y),
            Quadrant::NorthEast => Envelope::new(mid_x, parent.max_x, mid_y, parent.max_y),
            Quadrant::SouthEast => Envelope::new(mid_x, parent.max_x, parent.min_y, mid_y),
        }
    }
}

/// The quadrant of `max_bounds` that fully contains `bounds` at the given
/// depth index, following the containing quadrant chain down from depth 0.
///
/// Returns `None` when the bounds cross a quadrant boundary before
/// reaching `depth_index`, i.e. the node is unpromotable at that depth.
pub fn quadrant_at(
    max_bounds: &Envelope,
    bounds: &Envelope,
    depth_index: usize,
) -> Option<Quadrant> {
    if bounds.is_empty() {
        return None;
    }
    let mut parent = *max_bounds;
    for depth in 0..=depth_index {
        let mut containing = None;
        for quadrant in QUADRANTS {
            let slice = quadrant.slice(&parent);
            if slice.contains(bounds) {
                containing = Some((quadrant, slice));
                break;
            }
        }
        match containing {
            Some((quadrant, slice)) => {
                if depth == depth_index {
                    return Some(quadrant);
                }
                parent = slice;
            }
            None => return None,
        }
    }
    None
}

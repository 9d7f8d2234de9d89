/// Projected grid coordinates.
/// All coordinate math uses f64 in the grid's native unit (metres).
use serde::{Deserialize, Serialize};

/// A point on a national projected grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Metres east of the grid's false origin.
    pub easting: f64,
    /// Metres north of the grid's false origin.
    pub northing: f64,
}

impl Coordinate {
    pub fn new(easting: f64, northing: f64) -> Self {
        Self { easting, northing }
    }

    /// Straight-line distance on the grid.
    pub fn distance_to(self, other: Coordinate) -> f64 {
        let de = self.easting - other.easting;
        let dn = self.northing - other.northing;
        (de * de + dn * dn).sqrt()
    }

    #[inline]
    pub fn as_array(self) -> [f64; 2] {
        [self.easting, self.northing]
    }

    pub fn is_finite(self) -> bool {
        self.easting.is_finite() && self.northing.is_finite()
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from(p: [f64; 2]) -> Self {
        Self::new(p[0], p[1])
    }
}

impl From<Coordinate> for geo::Coord<f64> {
    fn from(c: Coordinate) -> Self {
        geo::Coord { x: c.easting, y: c.northing }
    }
}

impl From<geo::Coord<f64>> for Coordinate {
    fn from(c: geo::Coord<f64>) -> Self {
        Self::new(c.x, c.y)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.easting, self.northing)
    }
}

/// Closest point to `p` on the segment `a`–`b`, with the segment parameter t in [0, 1].
pub(crate) fn project_onto_segment(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> ([f64; 2], f64) {
    let ab = [b[0] - a[0], b[1] - a[1]];
    let ap = [p[0] - a[0], p[1] - a[1]];
    let ab_ab = ab[0] * ab[0] + ab[1] * ab[1];
    if ab_ab == 0.0 {
        // Degenerate segment.
        return (a, 0.0);
    }
    let t = ((ab[0] * ap[0] + ab[1] * ap[1]) / ab_ab).clamp(0.0, 1.0);
    ([a[0] + t * ab[0], a[1] + t * ab[1]], t)
}

/// Squared distance from `p` to the segment `a`–`b`.
pub(crate) fn segment_distance_2(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let (q, _) = project_onto_segment(p, a, b);
    let dx = p[0] - q[0];
    let dy = p[1] - q[1];
    dx * dx + dy * dy
}

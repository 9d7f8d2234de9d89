use geo::{Area, BoundingRect, Centroid, Intersects, MultiPolygon, Point, Rect};
use serde::{Deserialize, Serialize};

use crate::coords::Coordinate;

/// Stable identifier of a precomputed catchment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatchmentId(pub String);

impl CatchmentId {
    /// Identifier derived from the drainage point, used when the dataset
    /// carries no explicit id.
    pub fn from_drainage_point(p: Coordinate) -> Self {
        Self(format!("E{:.0}N{:.0}", p.easting, p.northing))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CatchmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The total upstream drainage area of one drainage point.
/// Immutable once built; sessions share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct Catchment {
    pub id: CatchmentId,
    /// Outlet that defines the catchment.
    pub drainage_point: Coordinate,
    pub boundary: MultiPolygon<f64>,
    /// Planar area of `boundary` in m².
    pub area_m2: f64,
    /// Gauging station the catchment was delineated for, if any.
    pub station: Option<String>,
    bbox: Rect<f64>,
}

impl Catchment {
    /// Returns `None` for empty or zero-area boundaries.
    pub fn new(
        id: CatchmentId,
        drainage_point: Coordinate,
        boundary: MultiPolygon<f64>,
        station: Option<String>,
    ) -> Option<Self> {
        let bbox = boundary.bounding_rect()?;
        let area_m2 = boundary.unsigned_area();
        if area_m2.is_nan() || area_m2 <= 0.0 {
            return None;
        }
        Some(Self {
            id,
            drainage_point,
            boundary,
            area_m2,
            station,
            bbox,
        })
    }

    pub fn area_km2(&self) -> f64 {
        self.area_m2 / 1.0e6
    }

    pub fn bbox(&self) -> Rect<f64> {
        self.bbox
    }

    /// True when `c` lies inside the boundary or on its edge. Drainage points
    /// normally sit on the edge, so edges count.
    pub fn covers(&self, c: Coordinate) -> bool {
        let p = Point::new(c.easting, c.northing);
        self.boundary.intersects(&p)
    }

    /// Area-weighted polygon centroid (QCNE/QCNN).
    pub fn centroid(&self) -> Option<Coordinate> {
        self.boundary
            .centroid()
            .map(|p| Coordinate::new(p.x(), p.y()))
    }

    pub fn summary(&self) -> CatchmentSummary {
        CatchmentSummary {
            id: self.id.clone(),
            drainage_point: self.drainage_point,
            area_km2: self.area_km2(),
            centroid: self.centroid(),
            station: self.station.clone(),
        }
    }
}

/// Geometry-free view of a catchment for reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatchmentSummary {
    pub id: CatchmentId,
    pub drainage_point: Coordinate,
    pub area_km2: f64,
    pub centroid: Option<Coordinate>,
    pub station: Option<String>,
}

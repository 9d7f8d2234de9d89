//! River reaches and their R-tree segment nodes.
use std::path::Path;

use anyhow::{Context, Result};
use geo::MultiLineString;
use rstar::{PointDistance, RTreeObject, AABB};
use tracing::warn;

use crate::coords::segment_distance_2;
use crate::vector::{as_multilinestring, f64_property, numeric_id, read_features};

/// A known watercourse used as a snapping target.
#[derive(Debug, Clone)]
pub struct RiverReach {
    pub id: u64,
    pub geometry: MultiLineString<f64>,
    /// Number of grid cells draining through the reach, when recorded.
    pub upstream_cells: Option<u32>,
}

/// One straight segment of a reach. Reaches are indexed per segment so the
/// R-tree distance is exact.
#[derive(Debug, Clone)]
pub(crate) struct ReachSegment {
    pub reach_id: u64,
    /// Position of the segment along its reach, for deterministic ordering.
    pub seq: u32,
    pub upstream_cells: Option<u32>,
    pub start: [f64; 2],
    pub end: [f64; 2],
}

impl RTreeObject for ReachSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.start, self.end)
    }
}

impl PointDistance for ReachSegment {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        segment_distance_2(*point, self.start, self.end)
    }
}

impl RiverReach {
    pub(crate) fn segments(&self) -> impl Iterator<Item = ReachSegment> + '_ {
        self.geometry
            .0
            .iter()
            .flat_map(|ls| ls.lines())
            .enumerate()
            .map(move |(seq, line)| ReachSegment {
                reach_id: self.id,
                seq: seq as u32,
                upstream_cells: self.upstream_cells,
                start: [line.start.x, line.start.y],
                end: [line.end.x, line.end.y],
            })
    }
}

/// Load reaches from a GeoJSON line dataset.
pub fn load_reaches(path: &Path) -> Result<Vec<RiverReach>> {
    let features = read_features(path)?;
    let mut reaches = Vec::with_capacity(features.len());
    for (index, feature) in features.iter().enumerate() {
        let Some(geometry) = &feature.geometry else {
            warn!(path = %path.display(), index, "river reach without geometry, skipping");
            continue;
        };
        let lines = as_multilinestring(&geometry.value)
            .with_context(|| format!("river reach feature {index}"))?;
        let id = numeric_id(feature, "id").unwrap_or(index as u64);
        let upstream_cells = f64_property(feature, "upstream_cells")
            .filter(|v| *v >= 0.0)
            .map(|v| v.min(u32::MAX as f64) as u32);
        reaches.push(RiverReach { id, geometry: lines, upstream_cells });
    }
    Ok(reaches)
}

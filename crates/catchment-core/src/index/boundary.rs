//! Precomputed catchment boundaries and their R-tree nodes.
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use rstar::{RTreeObject, AABB};
use tracing::warn;

use crate::catchment::{Catchment, CatchmentId};
use crate::coords::Coordinate;
use crate::vector::{as_multipolygon, f64_property, read_features, string_property};

/// Bounding-box wrapper so boundaries can be found by envelope intersection
/// before the exact polygon test.
#[derive(Debug, Clone)]
pub(crate) struct IndexedCatchment {
    pub catchment: Arc<Catchment>,
    envelope: AABB<[f64; 2]>,
}

impl IndexedCatchment {
    pub fn new(catchment: Catchment) -> Self {
        let bbox = catchment.bbox();
        Self {
            envelope: AABB::from_corners([bbox.min().x, bbox.min().y], [bbox.max().x, bbox.max().y]),
            catchment: Arc::new(catchment),
        }
    }
}

impl RTreeObject for IndexedCatchment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Load catchment boundaries from a GeoJSON polygon dataset.
///
/// Every feature needs `outlet_easting` and `outlet_northing`; `id` and
/// `station` are optional. Zero-area boundaries are skipped with a warning.
pub fn load_catchments(path: &Path) -> Result<Vec<Catchment>> {
    let features = read_features(path)?;
    let mut catchments = Vec::with_capacity(features.len());
    for (index, feature) in features.iter().enumerate() {
        let geometry = feature
            .geometry
            .as_ref()
            .ok_or_else(|| anyhow!("catchment feature {index} has no geometry"))?;
        let boundary = as_multipolygon(&geometry.value)
            .with_context(|| format!("catchment feature {index}"))?;
        let outlet = match (
            f64_property(feature, "outlet_easting"),
            f64_property(feature, "outlet_northing"),
        ) {
            (Some(e), Some(n)) => Coordinate::new(e, n),
            _ => return Err(anyhow!("catchment feature {index} has no drainage point")),
        };
        let id = string_property(feature, "id")
            .map(CatchmentId)
            .unwrap_or_else(|| CatchmentId::from_drainage_point(outlet));
        let station = string_property(feature, "station");
        match Catchment::new(id, outlet, boundary, station) {
            Some(c) => catchments.push(c),
            None => warn!(path = %path.display(), index, "degenerate catchment boundary, skipping"),
        }
    }
    Ok(catchments)
}

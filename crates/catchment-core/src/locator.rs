//! Resolution of a coordinate to the precomputed catchment that drains it.
use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::catchment::Catchment;
use crate::config::LocatorSettings;
use crate::coords::Coordinate;
use crate::error::{CatchmentError, Result};
use crate::index::SpatialIndex;

pub struct CatchmentLocator<'a> {
    index: &'a SpatialIndex,
    settings: &'a LocatorSettings,
}

impl<'a> CatchmentLocator<'a> {
    pub fn new(index: &'a SpatialIndex, settings: &'a LocatorSettings) -> Self {
        Self { index, settings }
    }

    /// Find the catchment whose drainage point is the closest network node
    /// to `coordinate` among all catchments covering it.
    ///
    /// Nested catchments share upstream area, so a headwater point is covered
    /// by every catchment downstream of it; the nearest outlet is the
    /// innermost one. Ties on outlet distance go to the smaller catchment,
    /// then the lowest id, so the result is fully deterministic.
    pub fn locate(&self, coordinate: Coordinate) -> Result<Arc<Catchment>> {
        if !coordinate.is_finite() {
            return Err(CatchmentError::CatchmentNotFound { coordinate });
        }
        let max_outlet = self.settings.max_outlet_distance_m;
        let best = self
            .index
            .catchments_covering(coordinate)
            .into_iter()
            .map(|c| (coordinate.distance_to(c.drainage_point), c))
            .filter(|(d, _)| max_outlet.map_or(true, |m| *d <= m))
            .min_by(|(da, a), (db, b)| {
                da.partial_cmp(db)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.area_m2.partial_cmp(&b.area_m2).unwrap_or(Ordering::Equal))
                    .then_with(|| a.id.cmp(&b.id))
            });

        match best {
            Some((outlet_distance, catchment)) => {
                debug!(
                    %coordinate,
                    catchment = %catchment.id,
                    outlet_distance,
                    area_km2 = catchment.area_km2(),
                    "catchment located"
                );
                Ok(catchment)
            }
            None => {
                debug!(%coordinate, "no catchment covers coordinate");
                Err(CatchmentError::CatchmentNotFound { coordinate })
            }
        }
    }
}

//! Immutable spatial indices over river reaches and catchment boundaries.
//!
//! Built once per region when the engine loads and never mutated afterwards,
//! so any number of sessions may query one index concurrently without locks.
//!
//! ```text
//! SpatialIndex
//! ├── reaches:    RTree<ReachSegment>      nearest-neighbour snapping
//! └── catchments: RTree<IndexedCatchment>  envelope filter → exact cover test
//! ```

pub mod boundary;
pub mod reach;

use std::path::Path;
use std::sync::Arc;

use rstar::{RTree, AABB};
use tracing::info;

use crate::catchment::Catchment;
use crate::coords::Coordinate;
use crate::error::{CatchmentError, Result};
use boundary::{load_catchments, IndexedCatchment};
use reach::{load_reaches, ReachSegment};

pub use reach::RiverReach;

pub struct SpatialIndex {
    reaches: RTree<ReachSegment>,
    catchments: RTree<IndexedCatchment>,
    reach_count: usize,
}

impl SpatialIndex {
    /// Bulk-load the index from in-memory datasets.
    pub fn build(reaches: Vec<RiverReach>, catchments: Vec<Catchment>) -> Self {
        let reach_count = reaches.len();
        let segments: Vec<ReachSegment> = reaches.iter().flat_map(|r| r.segments()).collect();
        let indexed: Vec<IndexedCatchment> = catchments.into_iter().map(IndexedCatchment::new).collect();
        let index = Self {
            reaches: RTree::bulk_load(segments),
            catchments: RTree::bulk_load(indexed),
            reach_count,
        };
        info!(
            reaches = index.reach_count,
            segments = index.reaches.size(),
            catchments = index.catchments.size(),
            "spatial index built"
        );
        index
    }

    /// Load both vector datasets from disk. Any failure is fatal.
    pub fn load(river_reaches: &Path, catchments: &Path) -> Result<Self> {
        let reaches = load_reaches(river_reaches)
            .map_err(|e| CatchmentError::data_unavailable(river_reaches, &e))?;
        let catchments = load_catchments(catchments)
            .map_err(|e| CatchmentError::data_unavailable(catchments, &e))?;
        Ok(Self::build(reaches, catchments))
    }

    /// Reach segments within `max_radius` of `p`, nearest first, with their
    /// distances.
    pub(crate) fn reach_segments_near(
        &self,
        p: Coordinate,
        max_radius: f64,
    ) -> impl Iterator<Item = (&ReachSegment, f64)> + '_ {
        let limit_2 = max_radius * max_radius;
        self.reaches
            .nearest_neighbor_iter_with_distance_2(&p.as_array())
            .take_while(move |(_, d2)| *d2 <= limit_2)
            .map(|(seg, d2)| (seg, d2.sqrt()))
    }

    /// Every catchment whose boundary covers `p`, edges included.
    pub fn catchments_covering(&self, p: Coordinate) -> Vec<Arc<Catchment>> {
        let query = AABB::from_point(p.as_array());
        self.catchments
            .locate_in_envelope_intersecting(&query)
            .filter(|ic| ic.catchment.covers(p))
            .map(|ic| Arc::clone(&ic.catchment))
            .collect()
    }

    pub fn reach_count(&self) -> usize {
        self.reach_count
    }

    pub fn catchment_count(&self) -> usize {
        self.catchments.size()
    }

    pub fn is_empty(&self) -> bool {
        self.reach_count == 0 && self.catchments.size() == 0
    }
}

//! Correction of imprecise coordinates by snapping to the nearest river reach.
use serde::Serialize;
use tracing::debug;

use crate::config::SnapSettings;
use crate::coords::{project_onto_segment, Coordinate};
use crate::error::{CatchmentError, Result};
use crate::index::SpatialIndex;

/// Outcome of a successful snap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SnappedPoint {
    pub coordinate: Coordinate,
    pub reach_id: u64,
    /// Distance moved, in metres.
    pub distance_m: f64,
}

pub struct CoordinateResolver<'a> {
    index: &'a SpatialIndex,
    settings: &'a SnapSettings,
}

impl<'a> CoordinateResolver<'a> {
    pub fn new(index: &'a SpatialIndex, settings: &'a SnapSettings) -> Self {
        Self { index, settings }
    }

    /// Return `coordinate` unchanged, or its projection onto the nearest
    /// eligible river reach when `snap_to_river` is set.
    pub fn resolve(&self, coordinate: Coordinate, snap_to_river: bool) -> Result<Coordinate> {
        if !snap_to_river {
            return Ok(coordinate);
        }
        self.snap(coordinate).map(|s| s.coordinate)
    }

    /// Project `coordinate` onto the nearest eligible reach within the
    /// configured radius.
    ///
    /// Reaches whose distances differ by no more than the tie tolerance are
    /// equidistant; among those the lowest reach id wins, then the earliest
    /// segment along that reach.
    pub fn snap(&self, coordinate: Coordinate) -> Result<SnappedPoint> {
        let s = self.settings;
        let mut nearest: Option<f64> = None;
        let mut best: Option<(u64, u32, [f64; 2], f64)> = None;

        let eligible = self
            .index
            .reach_segments_near(coordinate, s.max_radius_m)
            .filter(|(seg, _)| seg.upstream_cells.map_or(true, |n| n >= s.min_upstream_cells));

        for (seg, dist) in eligible {
            let d0 = *nearest.get_or_insert(dist);
            if dist - d0 > s.tie_tolerance_m {
                break;
            }
            let key = (seg.reach_id, seg.seq);
            if best.map_or(true, |(id, seq, _, _)| key < (id, seq)) {
                let (q, _) = project_onto_segment(coordinate.as_array(), seg.start, seg.end);
                best = Some((seg.reach_id, seg.seq, q, dist));
            }
        }

        let Some((reach_id, _, q, distance_m)) = best else {
            return Err(CatchmentError::NoRiverWithinRange {
                coordinate,
                radius_m: s.max_radius_m,
            });
        };
        let snapped = Coordinate::from(q);
        debug!(from = %coordinate, to = %snapped, reach_id, distance_m, "snapped to river");
        Ok(SnappedPoint {
            coordinate: snapped,
            reach_id,
            distance_m,
        })
    }
}

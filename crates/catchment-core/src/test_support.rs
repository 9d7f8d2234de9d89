//! In-memory fixtures: a small NI drainage network.
//!
//! ```text
//!  N+3000 ┌──────────┬──────────┐
//!         │ NI-HEAD  │          │
//!         │    │10   │    │20   │
//!  N+1000 ├────o─────┤  NI-EAST │
//!         │    │     │          │
//!      N  └────o─────┴────o─────┘
//!         E         E+2000    E+4000
//! ```
//!
//! NI-MAIN is the whole western block and contains NI-HEAD. Reach 10 is the
//! main channel, reach 20 drains NI-EAST, reach 30 is a ditch at E+1500
//! below the snapping threshold.
use std::collections::BTreeMap;

use geo::{polygon, LineString, MultiLineString, MultiPolygon};
use geojson::Feature;
use serde_json::json;

use crate::catchment::{Catchment, CatchmentId};
use crate::config::EngineConfig;
use crate::coords::Coordinate;
use crate::engine::{CatchmentEngine, RegionalData};
use crate::feh::FehDataset;
use crate::index::{RiverReach, SpatialIndex};
use crate::lcm::{CategoryRaster, LandCoverLayers, Vintage};
use crate::region::Region;

pub const ORIGIN_E: f64 = 79_000.0;
pub const ORIGIN_N: f64 = 479_000.0;

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon![
        (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)
    ]])
}

fn rect_json(x0: f64, y0: f64, x1: f64, y1: f64) -> serde_json::Value {
    json!({
        "type": "Polygon",
        "coordinates": [[[x0, y0], [x1, y0], [x1, y1], [x0, y1], [x0, y0]]]
    })
}

pub fn fixture_catchments() -> Vec<Catchment> {
    let (e, n) = (ORIGIN_E, ORIGIN_N);
    let mk = |id: &str, outlet: (f64, f64), boundary| {
        Catchment::new(
            CatchmentId(id.into()),
            Coordinate::new(outlet.0, outlet.1),
            boundary,
            None,
        )
        .unwrap()
    };
    vec![
        mk("NI-MAIN", (e + 1000.0, n), rect(e, n, e + 2000.0, n + 3000.0)),
        mk("NI-HEAD", (e + 1000.0, n + 1000.0), rect(e, n + 1000.0, e + 2000.0, n + 3000.0)),
        mk("NI-EAST", (e + 3000.0, n), rect(e + 2000.0, n, e + 4000.0, n + 3000.0)),
    ]
}

pub fn fixture_catchment(id: &str) -> Catchment {
    fixture_catchments()
        .into_iter()
        .find(|c| c.id.as_str() == id)
        .unwrap()
}

pub fn fixture_reaches() -> Vec<RiverReach> {
    let (e, n) = (ORIGIN_E, ORIGIN_N);
    let reach = |id, points: Vec<(f64, f64)>, upstream_cells| RiverReach {
        id,
        geometry: MultiLineString::new(vec![LineString::from(points)]),
        upstream_cells: Some(upstream_cells),
    };
    vec![
        reach(10, vec![(e + 1000.0, n), (e + 1000.0, n + 1000.0), (e + 1000.0, n + 3000.0)], 5000),
        reach(20, vec![(e + 3000.0, n), (e + 3000.0, n + 3000.0)], 800),
        reach(30, vec![(e + 1500.0, n + 2000.0), (e + 1500.0, n + 2500.0)], 50),
    ]
}

pub fn fixture_index() -> SpatialIndex {
    SpatialIndex::build(fixture_reaches(), fixture_catchments())
}

/// NI-HEAD has its own row; everything else is weighted from two zones split
/// at E+1000.
pub fn fixture_feh() -> FehDataset {
    let (e, n) = (ORIGIN_E, ORIGIN_N);
    let features: Vec<Feature> = [
        json!({
            "type": "Feature",
            "geometry": null,
            "properties": {
                "catchment_id": "NI-HEAD",
                "CCAR": 1600, "QB19": null, "QUC2": -9999,
                "QS69": 1150, "QBFI": 0.42, "QDPS": 95.1
            }
        }),
        json!({
            "type": "Feature",
            "geometry": rect_json(e - 500.0, n - 500.0, e + 1000.0, n + 3500.0),
            "properties": { "QS69": 1000, "QBFI": 0.4 }
        }),
        json!({
            "type": "Feature",
            "geometry": rect_json(e + 1000.0, n - 500.0, e + 4500.0, n + 3500.0),
            "properties": { "QS69": 1200, "QBFI": -9999 }
        }),
    ]
    .into_iter()
    .map(|v| serde_json::from_value(v).unwrap())
    .collect();
    FehDataset::from_features(&features).unwrap()
}

/// 100 m rasters over [E-1000, E+5000] × [N-1000, N+4000].
/// 2015: grassland (4) west of E+1000, woodland (1) east.
/// 2007: arable (3) everywhere.
/// 2000: improved grassland (51) south of N+2000, woodland (11) north.
pub fn fixture_land_cover() -> LandCoverLayers {
    let (e, n) = (ORIGIN_E, ORIGIN_N);
    let (w, h, cs) = (60usize, 50usize, 100.0);
    let origin = [e - 1000.0, n + 4000.0];
    let raster = |class: &dyn Fn(f64, f64) -> u16| {
        let mut data = Vec::with_capacity(w * h);
        for row in 0..h {
            for col in 0..w {
                let x = origin[0] + (col as f64 + 0.5) * cs;
                let y = origin[1] - (row as f64 + 0.5) * cs;
                data.push(class(x, y));
            }
        }
        CategoryRaster::new(origin, cs, w, h, 0, data).unwrap()
    };

    let mut layers = LandCoverLayers::new();
    layers.insert(
        Vintage::Lcm2015,
        vec![raster(&|x, _| if x < e + 1000.0 { 4 } else { 1 })],
    );
    layers.insert(Vintage::Lcm2007, vec![raster(&|_, _| 3)]);
    layers.insert(
        Vintage::Lcm2000,
        vec![raster(&|_, y| if y < n + 2000.0 { 51 } else { 11 })],
    );
    layers
}

pub fn fixture_config() -> EngineConfig {
    EngineConfig::default()
}

pub fn fixture_engine_with(config: EngineConfig) -> CatchmentEngine {
    let ni = RegionalData {
        index: fixture_index(),
        feh: fixture_feh(),
        land_cover: fixture_land_cover(),
    };
    CatchmentEngine::new(config, BTreeMap::from([(Region::Ni, ni)]))
}

pub fn fixture_engine() -> CatchmentEngine {
    fixture_engine_with(fixture_config())
}

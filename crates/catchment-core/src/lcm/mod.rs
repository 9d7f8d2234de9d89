//! Land Cover Map (LCM) aggregation.
//!
//! A catchment boundary is overlaid on the categorical raster of one survey
//! vintage. Area per class is accumulated with partial-cell weighting at the
//! boundary and normalised over the classified area, so nodata cells never
//! dilute the fractions.

pub mod classes;
pub mod raster;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catchment::{Catchment, CatchmentId};
use crate::config::{LandCoverConfig, RasterTileConfig};
use crate::error::{CatchmentError, Result};
pub use classes::{AggregateClass, ClassificationScheme, UNKNOWN_CLASS};
pub use raster::{CategoryRaster, CoverTally};

/// Supported LCM survey vintages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Vintage {
    #[serde(rename = "LCM2000")]
    Lcm2000,
    #[serde(rename = "LCM2007")]
    Lcm2007,
    #[serde(rename = "LCM2015")]
    Lcm2015,
}

impl Vintage {
    pub const ALL: [Vintage; 3] = [Vintage::Lcm2000, Vintage::Lcm2007, Vintage::Lcm2015];

    pub fn year(self) -> u16 {
        match self {
            Vintage::Lcm2000 => 2000,
            Vintage::Lcm2007 => 2007,
            Vintage::Lcm2015 => 2015,
        }
    }

    pub fn scheme(self) -> ClassificationScheme {
        match self {
            Vintage::Lcm2000 => ClassificationScheme::Lcm2000Subclass,
            Vintage::Lcm2007 => ClassificationScheme::Lcm2007,
            Vintage::Lcm2015 => ClassificationScheme::Lcm2015,
        }
    }

    /// Descriptor-type tag, e.g. `LCM2015`.
    pub fn tag(self) -> &'static str {
        match self {
            Vintage::Lcm2000 => "LCM2000",
            Vintage::Lcm2007 => "LCM2007",
            Vintage::Lcm2015 => "LCM2015",
        }
    }
}

impl TryFrom<u16> for Vintage {
    type Error = CatchmentError;

    fn try_from(year: u16) -> Result<Self> {
        Vintage::ALL
            .into_iter()
            .find(|v| v.year() == year)
            .ok_or(CatchmentError::UnsupportedVintage(year))
    }
}

impl std::fmt::Display for Vintage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

// ── Records ──────────────────────────────────────────────────────────────────

/// Land cover of one catchment for one vintage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LandCoverRecord {
    pub catchment: CatchmentId,
    pub vintage: Vintage,
    pub vintage_year: u16,
    pub classification_scheme: ClassificationScheme,
    /// Class code → share of the classified area, in [0, 1].
    pub fractions: BTreeMap<u16, f64>,
    pub class_areas_km2: BTreeMap<u16, f64>,
    pub classified_area_km2: f64,
    /// Classified area over catchment area. Below 1 where the catchment runs
    /// off the survey or over nodata cells.
    pub coverage: f64,
}

/// One NRFA aggregate share with the member classes that contributed to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateShare {
    pub class: AggregateClass,
    pub fraction: f64,
    pub members: Vec<u16>,
}

impl LandCoverRecord {
    pub fn total_fraction(&self) -> f64 {
        self.fractions.values().sum()
    }

    pub fn fraction(&self, class: u16) -> f64 {
        self.fractions.get(&class).copied().unwrap_or(0.0)
    }

    pub fn class_name(&self, class: u16) -> Option<&'static str> {
        self.classification_scheme.class_name(class)
    }

    /// Shares of the NRFA aggregate classes. Aggregates with no member class
    /// present in the catchment are left out.
    pub fn aggregates(&self) -> Vec<AggregateShare> {
        let scheme = self.classification_scheme;
        let mut shares: BTreeMap<AggregateClass, AggregateShare> = BTreeMap::new();
        for (&code, &fraction) in &self.fractions {
            let class = AggregateClass::of(scheme, code);
            let share = shares.entry(class).or_insert_with(|| AggregateShare {
                class,
                fraction: 0.0,
                members: Vec::new(),
            });
            share.fraction += fraction;
            share.members.push(code);
        }
        shares.into_values().collect()
    }
}

// ── Layers ───────────────────────────────────────────────────────────────────

/// Raster tiles of every loaded vintage for one region.
#[derive(Debug, Default)]
pub struct LandCoverLayers {
    tiles: BTreeMap<Vintage, Vec<CategoryRaster>>,
}

impl LandCoverLayers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, vintage: Vintage, tiles: Vec<CategoryRaster>) {
        self.tiles.insert(vintage, tiles);
    }

    /// Load every configured tile. Any unreadable tile is fatal.
    pub fn load(config: &LandCoverConfig) -> Result<Self> {
        let mut layers = Self::new();
        let configured: [(Vintage, &Vec<RasterTileConfig>); 3] = [
            (Vintage::Lcm2000, &config.lcm2000),
            (Vintage::Lcm2007, &config.lcm2007),
            (Vintage::Lcm2015, &config.lcm2015),
        ];
        for (vintage, tiles) in configured {
            if tiles.is_empty() {
                continue;
            }
            let rasters = tiles
                .iter()
                .map(|t| CategoryRaster::load(t).map_err(|e| CatchmentError::data_unavailable(&t.path, &e)))
                .collect::<Result<Vec<_>>>()?;
            info!(%vintage, tiles = rasters.len(), "land cover loaded");
            layers.insert(vintage, rasters);
        }
        Ok(layers)
    }

    pub fn tiles(&self, vintage: Vintage) -> &[CategoryRaster] {
        self.tiles.get(&vintage).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn vintages(&self) -> impl Iterator<Item = Vintage> + '_ {
        self.tiles.keys().copied()
    }
}

// ── Aggregator ───────────────────────────────────────────────────────────────

pub struct LandCoverAggregator<'a> {
    layers: &'a LandCoverLayers,
}

impl<'a> LandCoverAggregator<'a> {
    pub fn new(layers: &'a LandCoverLayers) -> Self {
        Self { layers }
    }

    /// Per-class area fractions of `catchment` for the survey of `vintage_year`.
    pub fn aggregate(&self, catchment: &Catchment, vintage_year: u16) -> Result<LandCoverRecord> {
        let vintage = Vintage::try_from(vintage_year)?;
        self.aggregate_vintage(catchment, vintage)
    }

    pub fn aggregate_vintage(&self, catchment: &Catchment, vintage: Vintage) -> Result<LandCoverRecord> {
        let bbox = catchment.bbox();
        let tiles = self.layers.tiles(vintage);
        if tiles.is_empty() {
            warn!(%vintage, catchment = %catchment.id, "no land cover tiles loaded for vintage");
        }

        let mut tally = CoverTally::default();
        for tile in tiles {
            let tb = tile.bounds();
            let disjoint = tb.max().x <= bbox.min().x
                || tb.min().x >= bbox.max().x
                || tb.max().y <= bbox.min().y
                || tb.min().y >= bbox.max().y;
            if !disjoint {
                tile.accumulate(&catchment.boundary, bbox, &mut tally);
            }
        }

        let classified_m2 = tally.classified_m2();
        if classified_m2 <= 0.0 {
            return Err(CatchmentError::NoLandCover {
                vintage,
                catchment: catchment.id.clone(),
            });
        }

        let scheme = vintage.scheme();
        for code in tally.classes.keys().filter(|c| !scheme.is_defined(**c)) {
            warn!(%vintage, code, "class code not defined by {scheme}");
        }

        let fractions = tally
            .classes
            .iter()
            .map(|(&code, &area)| (code, area / classified_m2))
            .collect();
        let class_areas_km2 = tally
            .classes
            .iter()
            .map(|(&code, &area)| (code, area / 1.0e6))
            .collect();
        let coverage = (classified_m2 / catchment.area_m2).min(1.0);
        debug!(
            catchment = %catchment.id,
            %vintage,
            classes = tally.classes.len(),
            coverage,
            nodata_km2 = tally.nodata_m2 / 1.0e6,
            "land cover aggregated"
        );

        Ok(LandCoverRecord {
            catchment: catchment.id.clone(),
            vintage,
            vintage_year: vintage.year(),
            classification_scheme: scheme,
            fractions,
            class_areas_km2,
            classified_area_km2: classified_m2 / 1.0e6,
            coverage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture_catchment, fixture_land_cover};
    use approx::assert_relative_eq;

    #[test]
    fn vintage_years_round_trip_and_reject_others() {
        for v in Vintage::ALL {
            assert_eq!(Vintage::try_from(v.year()).unwrap(), v);
        }
        assert_eq!(Vintage::try_from(1999), Err(CatchmentError::UnsupportedVintage(1999)));
        assert_eq!(Vintage::Lcm2015.to_string(), "LCM2015");
    }

    #[test]
    fn headwater_2015_split_between_woodland_and_grassland() {
        let layers = fixture_land_cover();
        let head = fixture_catchment("NI-HEAD");
        let rec = LandCoverAggregator::new(&layers).aggregate(&head, 2015).unwrap();
        assert_eq!(rec.vintage_year, 2015);
        assert_eq!(rec.classification_scheme, ClassificationScheme::Lcm2015);
        assert_relative_eq!(rec.fraction(1), 0.5, epsilon = 1e-9);
        assert_relative_eq!(rec.fraction(4), 0.5, epsilon = 1e-9);
        assert_relative_eq!(rec.total_fraction(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(rec.coverage, 1.0, epsilon = 1e-9);
        assert_eq!(rec.class_name(4), Some("Improved grassland"));

        let aggs = rec.aggregates();
        let names: Vec<_> = aggs.iter().map(|a| a.class).collect();
        assert_eq!(names, vec![AggregateClass::Woodland, AggregateClass::Grassland]);
        assert_eq!(aggs[1].members, vec![4]);
    }

    #[test]
    fn vintages_use_their_own_schemes() {
        let layers = fixture_land_cover();
        let main = fixture_catchment("NI-MAIN");
        let agg = LandCoverAggregator::new(&layers);
        let r2000 = agg.aggregate(&main, 2000).unwrap();
        let r2007 = agg.aggregate(&main, 2007).unwrap();
        assert_eq!(r2000.classification_scheme, ClassificationScheme::Lcm2000Subclass);
        assert_relative_eq!(r2007.fraction(3), 1.0, epsilon = 1e-9);
        assert_eq!(r2007.class_name(3), Some("Arable and horticulture"));
        // Main catchment: 2 km of 3 km lies south of the class boundary.
        assert_relative_eq!(r2000.fraction(51), 2.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(r2000.fraction(11), 1.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(r2000.classified_area_km2, main.area_km2(), epsilon = 1e-9);
    }

    #[test]
    fn fractions_always_normalise() {
        let layers = fixture_land_cover();
        let agg = LandCoverAggregator::new(&layers);
        for id in ["NI-MAIN", "NI-HEAD", "NI-EAST"] {
            let c = fixture_catchment(id);
            for v in Vintage::ALL {
                let rec = agg.aggregate_vintage(&c, v).unwrap();
                assert_relative_eq!(rec.total_fraction(), 1.0, epsilon = 1e-6);
                assert!(rec.fractions.values().all(|f| (0.0..=1.0).contains(f)));
                let agg_total: f64 = rec.aggregates().iter().map(|a| a.fraction).sum();
                assert_relative_eq!(agg_total, 1.0, epsilon = 1e-6);
            }
        }
    }

    /// The fixture rasters cut into four tiles at (E+1500, N+1500), so every
    /// fixture catchment straddles a tile seam.
    fn quartered_land_cover() -> LandCoverLayers {
        let whole = fixture_land_cover();
        let mut layers = LandCoverLayers::new();
        for v in Vintage::ALL {
            let src = &whole.tiles(v)[0];
            let cs = src.cell_size();
            let (w, h) = src.dimensions();
            let b = src.bounds();
            let (split_col, split_row) = (25, 25);
            let mut tiles = Vec::new();
            for (c0, c1) in [(0, split_col), (split_col, w)] {
                for (r0, r1) in [(0, split_row), (split_row, h)] {
                    let mut data = Vec::with_capacity((c1 - c0) * (r1 - r0));
                    for row in r0..r1 {
                        for col in c0..c1 {
                            let x = b.min().x + (col as f64 + 0.5) * cs;
                            let y = b.max().y - (row as f64 + 0.5) * cs;
                            data.push(src.value_at(x, y).unwrap());
                        }
                    }
                    let origin = [b.min().x + c0 as f64 * cs, b.max().y - r0 as f64 * cs];
                    tiles.push(CategoryRaster::new(origin, cs, c1 - c0, r1 - r0, 0, data).unwrap());
                }
            }
            layers.insert(v, tiles);
        }
        layers
    }

    #[test]
    fn tiles_of_one_vintage_accumulate_together() {
        let whole = fixture_land_cover();
        let quartered = quartered_land_cover();
        assert_eq!(quartered.tiles(Vintage::Lcm2015).len(), 4);
        for id in ["NI-MAIN", "NI-HEAD", "NI-EAST"] {
            let c = fixture_catchment(id);
            for v in Vintage::ALL {
                let one = LandCoverAggregator::new(&whole).aggregate_vintage(&c, v).unwrap();
                let four = LandCoverAggregator::new(&quartered).aggregate_vintage(&c, v).unwrap();
                assert_eq!(
                    one.fractions.keys().collect::<Vec<_>>(),
                    four.fractions.keys().collect::<Vec<_>>()
                );
                for (code, f) in &one.fractions {
                    assert_relative_eq!(four.fraction(*code), *f, epsilon = 1e-9);
                }
                assert_relative_eq!(four.classified_area_km2, one.classified_area_km2, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn unsupported_year_is_rejected_before_overlay() {
        let layers = LandCoverLayers::new();
        let head = fixture_catchment("NI-HEAD");
        let err = LandCoverAggregator::new(&layers).aggregate(&head, 1999).unwrap_err();
        assert_eq!(err, CatchmentError::UnsupportedVintage(1999));
    }

    #[test]
    fn catchment_off_the_survey_has_no_land_cover() {
        let layers = LandCoverLayers::new();
        let head = fixture_catchment("NI-HEAD");
        let err = LandCoverAggregator::new(&layers).aggregate(&head, 2015).unwrap_err();
        assert_eq!(err.kind(), "NoLandCover");
        assert!(!err.is_fatal());
    }

    #[test]
    fn unreadable_tile_is_data_unavailable() {
        let config = LandCoverConfig {
            lcm2015: vec![RasterTileConfig::new("/nonexistent/lcm2015.json")],
            ..LandCoverConfig::default()
        };
        let err = LandCoverLayers::load(&config).unwrap_err();
        assert_eq!(err.kind(), "DataUnavailable");
    }
}

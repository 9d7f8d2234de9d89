//! Engine configuration, read from TOML.
//!
//! ```toml
//! [snapping]
//! max_radius_m = 1000.0
//! min_upstream_cells = 200
//!
//! [regions.gb]
//! river_reaches = "gb/rivers.geojson"
//! catchments = "gb/catchments.geojson"
//! feh = "gb/feh.geojson"
//!
//! [[regions.gb.land_cover.lcm2015]]
//! path = "gb/lcm2015.tif"
//! origin_easting = 0.0
//! origin_northing = 1300000.0
//! cell_size = 25.0
//! ```
//!
//! Relative paths resolve against the directory holding the config file.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CatchmentError, Result};
use crate::region::Region;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapSettings {
    /// Maximum distance a coordinate may move when snapped, in metres.
    pub max_radius_m: f64,
    /// Reaches with fewer recorded upstream cells are never snap targets.
    pub min_upstream_cells: u32,
    /// Distances closer than this are treated as equal for tie-breaking.
    pub tie_tolerance_m: f64,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            max_radius_m: 1000.0,
            min_upstream_cells: 200,
            tie_tolerance_m: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorSettings {
    /// Reject containing catchments whose drainage point is farther than this.
    pub max_outlet_distance_m: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Upper bound on worker threads; `None` uses one per core.
    pub max_workers: Option<usize>,
}

/// One raster tile of a land cover vintage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterTileConfig {
    pub path: PathBuf,
    /// Top-left corner; required for GeoTIFFs without georeference tags.
    pub origin_easting: Option<f64>,
    pub origin_northing: Option<f64>,
    pub cell_size: Option<f64>,
    pub nodata: Option<u16>,
}

impl RasterTileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            origin_easting: None,
            origin_northing: None,
            cell_size: None,
            nodata: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LandCoverConfig {
    pub lcm2000: Vec<RasterTileConfig>,
    pub lcm2007: Vec<RasterTileConfig>,
    pub lcm2015: Vec<RasterTileConfig>,
}

/// Dataset locations for one region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    pub river_reaches: PathBuf,
    pub catchments: PathBuf,
    pub feh: PathBuf,
    #[serde(default)]
    pub land_cover: LandCoverConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub snapping: SnapSettings,
    pub locator: LocatorSettings,
    pub batch: BatchSettings,
    /// Keyed by region name (`gb`, `ni`).
    pub regions: BTreeMap<String, RegionConfig>,
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(s).map_err(|e| CatchmentError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file and resolve its relative dataset paths.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CatchmentError::DataUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for region in self.regions.values_mut() {
            join(&mut region.river_reaches);
            join(&mut region.catchments);
            join(&mut region.feh);
            let lc = &mut region.land_cover;
            for tile in lc.lcm2000.iter_mut().chain(&mut lc.lcm2007).chain(&mut lc.lcm2015) {
                join(&mut tile.path);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.snapping;
        if !s.max_radius_m.is_finite() || s.max_radius_m <= 0.0 {
            return Err(CatchmentError::InvalidConfig(format!(
                "snapping.max_radius_m must be positive, got {}",
                s.max_radius_m
            )));
        }
        if s.tie_tolerance_m.is_nan() || s.tie_tolerance_m < 0.0 {
            return Err(CatchmentError::InvalidConfig(
                "snapping.tie_tolerance_m must be non-negative".into(),
            ));
        }
        if let Some(d) = self.locator.max_outlet_distance_m {
            if d.is_nan() || d <= 0.0 {
                return Err(CatchmentError::InvalidConfig(
                    "locator.max_outlet_distance_m must be positive".into(),
                ));
            }
        }
        if self.batch.max_workers == Some(0) {
            return Err(CatchmentError::InvalidConfig("batch.max_workers must be at least 1".into()));
        }
        if self.regions.is_empty() {
            return Err(CatchmentError::InvalidConfig("no regions configured".into()));
        }
        for name in self.regions.keys() {
            name.parse::<Region>()?;
        }
        Ok(())
    }

    /// Configured regions with their parsed keys.
    pub fn regions(&self) -> Result<Vec<(Region, &RegionConfig)>> {
        self.regions
            .iter()
            .map(|(name, rc)| Ok((name.parse::<Region>()?, rc)))
            .collect()
    }
}

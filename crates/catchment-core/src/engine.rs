//! Process-wide engine: every regional dataset, loaded once.
use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use crate::config::{EngineConfig, RegionConfig};
use crate::coords::Coordinate;
use crate::error::Result;
use crate::feh::FehDataset;
use crate::index::SpatialIndex;
use crate::lcm::LandCoverLayers;
use crate::region::Region;
use crate::session::{CatchmentDataSession, SnapMode};

/// Static datasets of one national grid.
pub struct RegionalData {
    pub index: SpatialIndex,
    pub feh: FehDataset,
    pub land_cover: LandCoverLayers,
}

impl RegionalData {
    pub fn load(config: &RegionConfig) -> Result<Self> {
        Ok(Self {
            index: SpatialIndex::load(&config.river_reaches, &config.catchments)?,
            feh: FehDataset::load(&config.feh)?,
            land_cover: LandCoverLayers::load(&config.land_cover)?,
        })
    }
}

/// Immutable after construction and `Send + Sync`, so one engine serves any
/// number of concurrent sessions.
pub struct CatchmentEngine {
    config: EngineConfig,
    regions: BTreeMap<Region, RegionalData>,
}

impl CatchmentEngine {
    /// Read the config file and load every dataset it names.
    pub fn load(config_path: &Path) -> Result<Self> {
        Self::from_config(EngineConfig::load(config_path)?)
    }

    pub fn from_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let mut regions = BTreeMap::new();
        for (region, rc) in config.regions()? {
            info!(%region, "loading regional datasets");
            regions.insert(region, RegionalData::load(rc)?);
        }
        Ok(Self::new(config, regions))
    }

    /// Assemble an engine from datasets already in memory.
    pub fn new(config: EngineConfig, regions: BTreeMap<Region, RegionalData>) -> Self {
        for (region, data) in &regions {
            info!(
                %region,
                reaches = data.index.reach_count(),
                catchments = data.index.catchment_count(),
                feh_rows = data.feh.row_count(),
                feh_zones = data.feh.zone_count(),
                lcm_vintages = data.land_cover.vintages().count(),
                "region ready"
            );
        }
        Self { config, regions }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn regional(&self, region: Region) -> Option<&RegionalData> {
        self.regions.get(&region)
    }

    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.regions.keys().copied()
    }

    /// Start a query for one coordinate. Nothing is resolved until a
    /// descriptor is requested.
    pub fn session(&self, coordinate: Coordinate, snap: impl Into<SnapMode>) -> CatchmentDataSession<'_> {
        CatchmentDataSession::new(self, coordinate, snap.into())
    }
}

//! Catchment data extraction: resolve a grid coordinate to the catchment
//! that drains it, then extract FEH descriptors and land cover fractions.
//!
//! ```text
//! CatchmentEngine (loaded once, shared)
//! └── session(coordinate, snap)
//!     ├── CoordinateResolver   optional snap onto a river reach
//!     ├── CatchmentLocator     point → precomputed catchment (cached)
//!     ├── DescriptorExtractor  FEH record
//!     └── LandCoverAggregator  LCM fractions per vintage
//! ```
pub mod batch;
pub mod catchment;
pub mod config;
pub mod coords;
pub mod engine;
pub mod error;
pub mod export;
pub mod feh;
pub mod geometry;
pub mod index;
pub mod lcm;
pub mod locator;
pub mod logging;
pub mod region;
pub mod resolver;
pub mod session;
mod vector;

#[cfg(test)]
pub(crate) mod test_support;

pub use batch::{process_sites, BatchReport, BatchSummary, SiteOutcome, SiteQuery, SiteStatus};
pub use catchment::{Catchment, CatchmentId, CatchmentSummary};
pub use config::EngineConfig;
pub use coords::Coordinate;
pub use engine::{CatchmentEngine, RegionalData};
pub use error::{CatchmentError, Result};
pub use export::{write_property_rows_csv, PropertyRow};
pub use feh::{DescriptorExtractor, FehDescriptor, FehDescriptorRecord, FehMethod};
pub use index::SpatialIndex;
pub use lcm::{LandCoverAggregator, LandCoverRecord, Vintage};
pub use locator::CatchmentLocator;
pub use region::Region;
pub use resolver::{CoordinateResolver, SnappedPoint};
pub use session::{
    CatchmentDataSession, CatchmentDescriptors, DescriptorRecord, DescriptorSelection,
    DescriptorType, SessionState, SnapMode,
};

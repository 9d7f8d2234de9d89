//! Error taxonomy for catchment resolution and descriptor extraction.
use std::path::PathBuf;

use thiserror::Error;

use crate::catchment::CatchmentId;
use crate::coords::Coordinate;
use crate::lcm::Vintage;

/// Every failure the engine can report.
///
/// `DataUnavailable` and `InvalidConfig` are raised while loading and are
/// fatal for the process. All other variants describe a single query and are
/// reported per coordinate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatchmentError {
    #[error("dataset unavailable: {}: {reason}", path.display())]
    DataUnavailable { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no river reach within {radius_m} m of {coordinate}")]
    NoRiverWithinRange { coordinate: Coordinate, radius_m: f64 },

    #[error("no mapped catchment drains to {coordinate}")]
    CatchmentNotFound { coordinate: Coordinate },

    #[error("unsupported land cover vintage {0} (supported: 2000, 2007, 2015)")]
    UnsupportedVintage(u16),

    #[error("invalid descriptor type {0:?} (valid: FEH, LCM2000, LCM2007, LCM2015)")]
    InvalidDescriptorType(String),

    #[error("catchment {catchment} has no classified {vintage} land cover cells")]
    NoLandCover { vintage: Vintage, catchment: CatchmentId },
}

impl CatchmentError {
    pub(crate) fn data_unavailable(path: impl Into<PathBuf>, err: &anyhow::Error) -> Self {
        Self::DataUnavailable {
            path: path.into(),
            reason: format!("{err:#}"),
        }
    }

    /// True for failures raised while loading datasets or configuration.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DataUnavailable { .. } | Self::InvalidConfig(_))
    }

    /// Stable taxonomy name, used as the key in batch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataUnavailable { .. } => "DataUnavailable",
            Self::InvalidConfig(_) => "InvalidConfig",
            Self::NoRiverWithinRange { .. } => "NoRiverWithinRange",
            Self::CatchmentNotFound { .. } => "CatchmentNotFound",
            Self::UnsupportedVintage(_) => "UnsupportedVintage",
            Self::InvalidDescriptorType(_) => "InvalidDescriptorType",
            Self::NoLandCover { .. } => "NoLandCover",
        }
    }
}

pub type Result<T> = std::result::Result<T, CatchmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_load_failures_are_fatal() {
        let load = CatchmentError::DataUnavailable {
            path: "rivers.geojson".into(),
            reason: "missing".into(),
        };
        assert!(load.is_fatal());
        assert!(CatchmentError::InvalidConfig("x".into()).is_fatal());

        let query = CatchmentError::CatchmentNotFound {
            coordinate: Coordinate::new(0.0, 0.0),
        };
        assert!(!query.is_fatal());
        assert!(!CatchmentError::UnsupportedVintage(1999).is_fatal());
    }

    #[test]
    fn messages_name_the_offending_input() {
        let e = CatchmentError::UnsupportedVintage(1999);
        assert!(e.to_string().contains("1999"));
        let e = CatchmentError::InvalidDescriptorType("LCM1990".into());
        assert!(e.to_string().contains("LCM1990"));
        assert_eq!(e.kind(), "InvalidDescriptorType");
    }
}

use serde::{Deserialize, Serialize};

use crate::coords::Coordinate;
use crate::error::CatchmentError;

/// National coverage a coordinate belongs to. Each region carries its own
/// datasets since the two use different national grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// Great Britain.
    Gb,
    /// Northern Ireland.
    Ni,
}

/// NI bounding boxes as [x_min, y_min, x_max, y_max], inclusive.
const NI_WEST: [f64; 4] = [0.0, 469_190.0, 143_723.0, 614_827.0];
const NI_EAST: [f64; 4] = [143_723.0, 469_190.0, 185_797.0, 597_050.0];

fn in_box(c: Coordinate, b: &[f64; 4]) -> bool {
    c.easting >= b[0] && c.easting <= b[2] && c.northing >= b[1] && c.northing <= b[3]
}

impl Region {
    pub const ALL: [Region; 2] = [Region::Gb, Region::Ni];

    /// Anything outside the two NI boxes is treated as GB.
    pub fn of(c: Coordinate) -> Self {
        if in_box(c, &NI_WEST) || in_box(c, &NI_EAST) {
            Region::Ni
        } else {
            Region::Gb
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Region::Gb => "gb",
            Region::Ni => "ni",
        }
    }
}

impl std::str::FromStr for Region {
    type Err = CatchmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gb" => Ok(Region::Gb),
            "ni" => Ok(Region::Ni),
            other => Err(CatchmentError::InvalidConfig(format!(
                "unknown region {other:?} (expected gb or ni)"
            ))),
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//! FEH catchment descriptors.
//!
//! The descriptor dataset holds two kinds of feature: rows keyed by
//! `catchment_id`, already aggregated over a catchment, and source zones
//! whose values are area-weighted over any catchment they intersect. A
//! catchment with its own row is read directly.
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;

use geo::{Area, BooleanOps, BoundingRect, MultiPolygon};
use geojson::{Feature, JsonValue};
use rstar::{RTree, RTreeObject, AABB};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::catchment::{Catchment, CatchmentId};
use crate::error::{CatchmentError, Result};
use crate::vector::{as_multipolygon, property, read_features, string_property};

/// Values at or below this are error codes in the source grids.
const ERROR_SENTINEL: f64 = -5000.0;

macro_rules! feh_descriptors {
    ($($variant:ident => $code:literal, $long:literal;)+) => {
        /// One field of the fixed FEH descriptor schema.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum FehDescriptor {
            $($variant),+
        }

        impl FehDescriptor {
            /// Every descriptor, in schema order.
            pub const ALL: &'static [FehDescriptor] = &[$(FehDescriptor::$variant),+];

            /// Four-character FEH code, e.g. `QB19`.
            pub fn code(self) -> &'static str {
                match self {
                    $(FehDescriptor::$variant => $code),+
                }
            }

            /// Long name, e.g. `BFIHOST19`.
            pub fn long_name(self) -> &'static str {
                match self {
                    $(FehDescriptor::$variant => $long),+
                }
            }
        }
    };
}

feh_descriptors! {
    Ccar => "CCAR", "ihdtm-catchment-area";
    Hght => "HGHT", "ihdtm-height";
    QddfC => "Q__C", "ddf-c-catchment";
    QddfE => "Q__E", "ddf-e-catchment";
    QddfF => "Q__F", "ddf-f-catchment";
    QddfD1 => "Q_D1", "ddf-d1-catchment";
    QddfD2 => "Q_D2", "ddf-d2-catchment";
    QddfD3 => "Q_D3", "ddf-d3-catchment";
    Qalt => "QALT", "altbar";
    Qasb => "QASB", "aspbar";
    Qasv => "QASV", "aspvar";
    Qb19 => "QB19", "BFIHOST19";
    Qbfi => "QBFI", "bfihost";
    Qdpb => "QDPB", "dplbar";
    Qdps => "QDPS", "dpsbar";
    Qfar => "QFAR", "farl";
    Qfpd => "QFPD", "mean-flood-plain-depth";
    Qfpl => "QFPL", "mean-flood-plain-location";
    Qfpx => "QFPX", "mean-flood-plain-extent";
    Qldp => "QLDP", "ldp";
    Qprw => "QPRW", "propwet";
    Qr1d => "QR1D", "rmed-1d";
    Qr1h => "QR1H", "rmed-1h";
    Qr2d => "QR2D", "rmed-2d";
    Qs47 => "QS47", "saar-1941-1970";
    Qs69 => "QS69", "saar-1961-1990";
    Qspr => "QSPR", "sprhost";
    Quc2 => "QUC2", "urbconc-2000";
    Quco => "QUCO", "urbconc-1990";
    Que2 => "QUE2", "urbext-2000";
    Quex => "QUEX", "urbext-1990";
    Qul2 => "QUL2", "urbloc-2000";
    Qulo => "QULO", "urbloc-1990";
    RmC => "RM_C", "ddf-c";
    RmE => "RM_E", "ddf-e";
    RmF => "RM_F", "ddf-f";
    Rmd1 => "RMD1", "ddf-d1";
    Rmd2 => "RMD2", "ddf-d2";
    Rmd3 => "RMD3", "ddf-d3";
}

impl FehDescriptor {
    pub const COUNT: usize = Self::ALL.len();

    /// Look a descriptor up by code or long name.
    pub fn from_code(s: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.code() == s || d.long_name() == s)
    }

    /// The code, or the long name when `long` is set.
    pub fn label(self, long: bool) -> &'static str {
        if long {
            self.long_name()
        } else {
            self.code()
        }
    }
}

impl std::fmt::Display for FehDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for FehDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

type DescriptorValues = [Option<f64>; FehDescriptor::COUNT];

/// Read a descriptor value, treating nulls, non-numbers and error sentinels
/// as absent.
fn descriptor_value(v: Option<&JsonValue>) -> Option<f64> {
    v.and_then(JsonValue::as_f64)
        .filter(|x| x.is_finite() && *x > ERROR_SENTINEL)
}

fn feature_values(feature: &Feature) -> DescriptorValues {
    let mut values = [None; FehDescriptor::COUNT];
    for (slot, d) in values.iter_mut().zip(FehDescriptor::ALL) {
        *slot = descriptor_value(property(feature, d.code()));
    }
    values
}

// ── Record ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FehMethod {
    /// Read from a row aggregated for this catchment.
    PreAggregated,
    /// Area-weighted over intersecting source zones.
    AreaWeighted,
}

/// The full FEH schema for one catchment. Every descriptor has a slot;
/// inapplicable or missing ones are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct FehDescriptorRecord {
    pub catchment: CatchmentId,
    pub method: FehMethod,
    values: DescriptorValues,
}

impl FehDescriptorRecord {
    pub fn get(&self, d: FehDescriptor) -> Option<f64> {
        self.values[d as usize]
    }

    /// Every schema field in order, present or not.
    pub fn iter(&self) -> impl Iterator<Item = (FehDescriptor, Option<f64>)> + '_ {
        FehDescriptor::ALL.iter().copied().zip(self.values.iter().copied())
    }

    pub fn present(&self) -> impl Iterator<Item = (FehDescriptor, f64)> + '_ {
        self.iter().filter_map(|(d, v)| v.map(|v| (d, v)))
    }

    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

struct SchemaMap<'a>(&'a DescriptorValues);

impl Serialize for SchemaMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FehDescriptor::COUNT))?;
        for (d, v) in FehDescriptor::ALL.iter().zip(self.0) {
            map.serialize_entry(d.code(), v)?;
        }
        map.end()
    }
}

impl Serialize for FehDescriptorRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("FehDescriptorRecord", 3)?;
        s.serialize_field("catchment", &self.catchment)?;
        s.serialize_field("method", &self.method)?;
        s.serialize_field("descriptors", &SchemaMap(&self.values))?;
        s.end()
    }
}

// ── Dataset ──────────────────────────────────────────────────────────────────

struct FehZone {
    boundary: MultiPolygon<f64>,
    envelope: AABB<[f64; 2]>,
    values: DescriptorValues,
}

impl RTreeObject for FehZone {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

pub struct FehDataset {
    rows: HashMap<CatchmentId, DescriptorValues>,
    zones: RTree<FehZone>,
}

impl FehDataset {
    pub fn load(path: &Path) -> Result<Self> {
        let features = read_features(path).map_err(|e| CatchmentError::data_unavailable(path, &e))?;
        let dataset =
            Self::from_features(&features).map_err(|e| CatchmentError::data_unavailable(path, &e))?;
        info!(
            path = %path.display(),
            rows = dataset.rows.len(),
            zones = dataset.zones.size(),
            "FEH descriptors loaded"
        );
        Ok(dataset)
    }

    pub fn from_features(features: &[Feature]) -> anyhow::Result<Self> {
        let mut rows = HashMap::new();
        let mut zones = Vec::new();
        for (index, feature) in features.iter().enumerate() {
            let values = feature_values(feature);
            if let Some(id) = string_property(feature, "catchment_id") {
                match rows.entry(CatchmentId(id)) {
                    Entry::Vacant(slot) => {
                        slot.insert(values);
                    }
                    Entry::Occupied(slot) => {
                        warn!(index, catchment = %slot.key(), "duplicate FEH catchment row, keeping the first");
                    }
                }
                continue;
            }
            let Some(geometry) = &feature.geometry else {
                anyhow::bail!("FEH feature {index} has neither catchment_id nor geometry");
            };
            let boundary = as_multipolygon(&geometry.value)
                .map_err(|e| e.context(format!("FEH zone {index}")))?;
            let Some(bbox) = boundary.bounding_rect() else {
                continue;
            };
            zones.push(FehZone {
                envelope: AABB::from_corners([bbox.min().x, bbox.min().y], [bbox.max().x, bbox.max().y]),
                boundary,
                values,
            });
        }
        Ok(Self {
            rows,
            zones: RTree::bulk_load(zones),
        })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn zone_count(&self) -> usize {
        self.zones.size()
    }
}

// ── Extractor ────────────────────────────────────────────────────────────────

pub struct DescriptorExtractor<'a> {
    dataset: &'a FehDataset,
}

impl<'a> DescriptorExtractor<'a> {
    pub fn new(dataset: &'a FehDataset) -> Self {
        Self { dataset }
    }

    pub fn extract(&self, catchment: &Catchment) -> FehDescriptorRecord {
        if let Some(values) = self.dataset.rows.get(&catchment.id) {
            debug!(catchment = %catchment.id, "FEH descriptors read from catchment row");
            return FehDescriptorRecord {
                catchment: catchment.id.clone(),
                method: FehMethod::PreAggregated,
                values: *values,
            };
        }

        let bbox = catchment.bbox();
        let query = AABB::from_corners([bbox.min().x, bbox.min().y], [bbox.max().x, bbox.max().y]);
        let mut weight = [0.0_f64; FehDescriptor::COUNT];
        let mut weighted = [0.0_f64; FehDescriptor::COUNT];
        let mut zones = 0usize;
        for zone in self.dataset.zones.locate_in_envelope_intersecting(&query) {
            let overlap = catchment.boundary.intersection(&zone.boundary).unsigned_area();
            if overlap <= 0.0 {
                continue;
            }
            zones += 1;
            for (i, v) in zone.values.iter().enumerate() {
                if let Some(v) = v {
                    weight[i] += overlap;
                    weighted[i] += overlap * v;
                }
            }
        }

        let mut values = [None; FehDescriptor::COUNT];
        for (i, slot) in values.iter_mut().enumerate() {
            if weight[i] > 0.0 {
                *slot = Some(weighted[i] / weight[i]);
            }
        }
        debug!(catchment = %catchment.id, zones, "FEH descriptors area-weighted");
        FehDescriptorRecord {
            catchment: catchment.id.clone(),
            method: FehMethod::AreaWeighted,
            values,
        }
    }
}

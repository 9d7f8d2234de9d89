//! Per-coordinate query sessions.
//!
//! A session resolves its coordinate to a catchment at most once. The first
//! descriptor request drives the resolution and its outcome is cached:
//!
//! ```text
//! Unresolved ──resolve──► Resolved   every later request reuses the catchment
//!                    └──► Failed     every later request replays the error
//! ```
//!
//! Input validation (vintage years, descriptor names) happens before the
//! state machine is touched, so a bad request never triggers resolution.
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catchment::{Catchment, CatchmentSummary};
use crate::coords::Coordinate;
use crate::engine::{CatchmentEngine, RegionalData};
use crate::error::{CatchmentError, Result};
use crate::feh::{DescriptorExtractor, FehDescriptorRecord};
use crate::lcm::{LandCoverAggregator, LandCoverRecord, Vintage};
use crate::locator::CatchmentLocator;
use crate::region::Region;
use crate::resolver::{CoordinateResolver, SnappedPoint};

// ── Request types ────────────────────────────────────────────────────────────

/// Whether and how a session corrects its coordinate onto a river.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapMode {
    #[default]
    Off,
    /// Snap, and fail the session when no river is in range.
    Required,
    /// Snap when a river is in range, otherwise use the raw coordinate.
    BestEffort,
}

impl From<bool> for SnapMode {
    fn from(snap_to_river: bool) -> Self {
        if snap_to_river {
            SnapMode::Required
        } else {
            SnapMode::Off
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DescriptorType {
    #[serde(rename = "FEH")]
    Feh,
    #[serde(rename = "LCM2000")]
    Lcm2000,
    #[serde(rename = "LCM2007")]
    Lcm2007,
    #[serde(rename = "LCM2015")]
    Lcm2015,
}

impl DescriptorType {
    pub const ALL: [DescriptorType; 4] = [
        DescriptorType::Feh,
        DescriptorType::Lcm2000,
        DescriptorType::Lcm2007,
        DescriptorType::Lcm2015,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            DescriptorType::Feh => "FEH",
            DescriptorType::Lcm2000 => "LCM2000",
            DescriptorType::Lcm2007 => "LCM2007",
            DescriptorType::Lcm2015 => "LCM2015",
        }
    }

    /// Land cover vintage, `None` for FEH.
    pub fn vintage(self) -> Option<Vintage> {
        match self {
            DescriptorType::Feh => None,
            DescriptorType::Lcm2000 => Some(Vintage::Lcm2000),
            DescriptorType::Lcm2007 => Some(Vintage::Lcm2007),
            DescriptorType::Lcm2015 => Some(Vintage::Lcm2015),
        }
    }
}

impl From<Vintage> for DescriptorType {
    fn from(v: Vintage) -> Self {
        match v {
            Vintage::Lcm2000 => DescriptorType::Lcm2000,
            Vintage::Lcm2007 => DescriptorType::Lcm2007,
            Vintage::Lcm2015 => DescriptorType::Lcm2015,
        }
    }
}

impl FromStr for DescriptorType {
    type Err = CatchmentError;

    fn from_str(s: &str) -> Result<Self> {
        let t = s.trim();
        DescriptorType::ALL
            .into_iter()
            .find(|d| d.tag().eq_ignore_ascii_case(t))
            .ok_or_else(|| CatchmentError::InvalidDescriptorType(s.to_string()))
    }
}

impl std::fmt::Display for DescriptorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// The descriptor types a combined request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorSelection {
    All,
    Only(BTreeSet<DescriptorType>),
}

impl DescriptorSelection {
    /// Parse a list of names. `"all"` anywhere selects every type. Every
    /// name is checked, so one unknown name or an empty list is rejected
    /// even alongside `"all"`.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        if names.is_empty() {
            return Err(CatchmentError::InvalidDescriptorType(String::new()));
        }
        let mut set = BTreeSet::new();
        let mut all = false;
        for name in names {
            let name = name.as_ref();
            if name.trim().eq_ignore_ascii_case("all") {
                all = true;
            } else {
                set.insert(name.parse::<DescriptorType>()?);
            }
        }
        Ok(if all {
            DescriptorSelection::All
        } else {
            DescriptorSelection::Only(set)
        })
    }

    /// Requested types in canonical order.
    pub fn types(&self) -> Vec<DescriptorType> {
        match self {
            DescriptorSelection::All => DescriptorType::ALL.to_vec(),
            DescriptorSelection::Only(set) => set.iter().copied().collect(),
        }
    }
}

impl FromStr for DescriptorSelection {
    type Err = CatchmentError;

    /// `"all"` or a comma-separated list such as `"FEH,LCM2015"`.
    fn from_str(s: &str) -> Result<Self> {
        let names: Vec<&str> = s.split(',').collect();
        Self::parse(&names)
    }
}

impl From<DescriptorType> for DescriptorSelection {
    fn from(t: DescriptorType) -> Self {
        DescriptorSelection::Only(BTreeSet::from([t]))
    }
}

// ── Results ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unresolved,
    Resolved,
    Failed,
}

/// How a session's coordinate was turned into a catchment.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub region: Region,
    /// Coordinate handed to the locator: the snapped point, or the raw input.
    pub query_coordinate: Coordinate,
    pub snapped: Option<SnappedPoint>,
    pub catchment: Arc<Catchment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DescriptorRecord {
    Feh(FehDescriptorRecord),
    Lcm(LandCoverRecord),
}

/// Per-type outcome. A failed extraction is kept as an explicit entry.
pub type DescriptorResult = Result<DescriptorRecord>;

/// Merged result of a combined request, keyed by descriptor type.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchmentDescriptors {
    pub coordinate: Coordinate,
    pub station: Option<String>,
    pub query_coordinate: Option<Coordinate>,
    pub catchment: Option<CatchmentSummary>,
    pub entries: BTreeMap<DescriptorType, DescriptorResult>,
}

impl CatchmentDescriptors {
    pub fn get(&self, t: DescriptorType) -> Option<&DescriptorResult> {
        self.entries.get(&t)
    }

    pub fn feh(&self) -> Option<&FehDescriptorRecord> {
        match self.entries.get(&DescriptorType::Feh) {
            Some(Ok(DescriptorRecord::Feh(r))) => Some(r),
            _ => None,
        }
    }

    pub fn lcm(&self, vintage: Vintage) -> Option<&LandCoverRecord> {
        match self.entries.get(&DescriptorType::from(vintage)) {
            Some(Ok(DescriptorRecord::Lcm(r))) => Some(r),
            _ => None,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = (DescriptorType, &CatchmentError)> + '_ {
        self.entries
            .iter()
            .filter_map(|(t, r)| r.as_ref().err().map(|e| (*t, e)))
    }

    pub fn succeeded(&self) -> usize {
        self.entries.values().filter(|r| r.is_ok()).count()
    }
}

// ── Session ──────────────────────────────────────────────────────────────────

struct Resolved<'e> {
    data: &'e RegionalData,
    resolution: Resolution,
}

pub struct CatchmentDataSession<'e> {
    engine: &'e CatchmentEngine,
    coordinate: Coordinate,
    snap: SnapMode,
    station: Option<String>,
    resolution: Option<Result<Resolved<'e>>>,
    feh: Option<FehDescriptorRecord>,
    lcm: BTreeMap<Vintage, Result<LandCoverRecord>>,
}

fn resolve_coordinate(
    engine: &CatchmentEngine,
    coordinate: Coordinate,
    snap: SnapMode,
) -> Result<Resolved<'_>> {
    let region = Region::of(coordinate);
    let Some(data) = engine.regional(region) else {
        debug!(%coordinate, %region, "no datasets loaded for region");
        return Err(CatchmentError::CatchmentNotFound { coordinate });
    };
    let config = engine.config();

    let resolver = CoordinateResolver::new(&data.index, &config.snapping);
    let snapped = match snap {
        SnapMode::Off => None,
        SnapMode::Required => Some(resolver.snap(coordinate)?),
        SnapMode::BestEffort => match resolver.snap(coordinate) {
            Ok(s) => Some(s),
            Err(err @ CatchmentError::NoRiverWithinRange { .. }) => {
                warn!(%coordinate, error = %err, "snapping failed, using raw coordinate");
                None
            }
            Err(err) => return Err(err),
        },
    };
    let query_coordinate = snapped.map_or(coordinate, |s| s.coordinate);

    let catchment = CatchmentLocator::new(&data.index, &config.locator).locate(query_coordinate)?;
    Ok(Resolved {
        data,
        resolution: Resolution {
            region,
            query_coordinate,
            snapped,
            catchment,
        },
    })
}

impl<'e> CatchmentDataSession<'e> {
    pub(crate) fn new(engine: &'e CatchmentEngine, coordinate: Coordinate, snap: SnapMode) -> Self {
        Self {
            engine,
            coordinate,
            snap,
            station: None,
            resolution: None,
            feh: None,
            lcm: BTreeMap::new(),
        }
    }

    /// Attach the gauging-station reference used in exported rows.
    pub fn with_station(mut self, station: impl Into<String>) -> Self {
        self.station = Some(station.into());
        self
    }

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    pub fn snap_mode(&self) -> SnapMode {
        self.snap
    }

    pub fn station(&self) -> Option<&str> {
        self.station.as_deref()
    }

    pub fn state(&self) -> SessionState {
        match &self.resolution {
            None => SessionState::Unresolved,
            Some(Ok(_)) => SessionState::Resolved,
            Some(Err(_)) => SessionState::Failed,
        }
    }

    fn resolved(&mut self) -> Result<&Resolved<'e>> {
        let (engine, coordinate, snap) = (self.engine, self.coordinate, self.snap);
        let outcome = self.resolution.get_or_insert_with(|| {
            let outcome = resolve_coordinate(engine, coordinate, snap);
            match &outcome {
                Ok(r) => debug!(
                    %coordinate,
                    catchment = %r.resolution.catchment.id,
                    snapped = r.resolution.snapped.is_some(),
                    "session resolved"
                ),
                Err(e) => debug!(%coordinate, error = %e, "session failed"),
            }
            outcome
        });
        outcome.as_ref().map_err(Clone::clone)
    }

    /// Resolve the catchment, or return the cached outcome.
    pub fn resolve(&mut self) -> Result<Resolution> {
        self.resolved().map(|r| r.resolution.clone())
    }

    pub fn catchment(&mut self) -> Result<Arc<Catchment>> {
        self.resolved().map(|r| Arc::clone(&r.resolution.catchment))
    }

    pub fn get_feh_data(&mut self) -> Result<FehDescriptorRecord> {
        if let Some(rec) = &self.feh {
            return Ok(rec.clone());
        }
        let r = self.resolved()?;
        let rec = DescriptorExtractor::new(&r.data.feh).extract(&r.resolution.catchment);
        self.feh = Some(rec.clone());
        Ok(rec)
    }

    /// Land cover for a survey year. Unsupported years are rejected without
    /// resolving the catchment.
    pub fn get_lcm_data(&mut self, vintage_year: u16) -> Result<LandCoverRecord> {
        let vintage = Vintage::try_from(vintage_year)?;
        self.lcm_record(vintage)
    }

    fn lcm_record(&mut self, vintage: Vintage) -> Result<LandCoverRecord> {
        if let Some(cached) = self.lcm.get(&vintage) {
            return cached.clone();
        }
        let r = self.resolved()?;
        let rec = LandCoverAggregator::new(&r.data.land_cover).aggregate_vintage(&r.resolution.catchment, vintage);
        self.lcm.insert(vintage, rec.clone());
        rec
    }

    /// Every requested type, from one catchment resolution. A failed
    /// resolution is reported against each requested type.
    pub fn get_data(&mut self, selection: &DescriptorSelection) -> CatchmentDescriptors {
        let types = selection.types();
        let resolved = self.resolved().map(|r| r.resolution.clone());

        let mut entries = BTreeMap::new();
        for t in types {
            let entry = match (&resolved, t.vintage()) {
                (Err(e), _) => Err(e.clone()),
                (Ok(_), None) => self.get_feh_data().map(DescriptorRecord::Feh),
                (Ok(_), Some(v)) => self.lcm_record(v).map(DescriptorRecord::Lcm),
            };
            entries.insert(t, entry);
        }

        let (query_coordinate, catchment) = match &resolved {
            Ok(r) => (Some(r.query_coordinate), Some(r.catchment.summary())),
            Err(_) => (None, None),
        };
        CatchmentDescriptors {
            coordinate: self.coordinate,
            station: self.station.clone(),
            query_coordinate,
            catchment,
            entries,
        }
    }

    /// [`get_data`](Self::get_data) with descriptor names, validated before
    /// any spatial work.
    pub fn get_data_named<S: AsRef<str>>(&mut self, names: &[S]) -> Result<CatchmentDescriptors> {
        let selection = DescriptorSelection::parse(names)?;
        Ok(self.get_data(&selection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture_config, fixture_engine, fixture_engine_with, ORIGIN_E, ORIGIN_N};
    use approx::assert_relative_eq;

    fn scenario() -> Coordinate {
        Coordinate::new(80_100.0, 480_500.0)
    }

    #[test]
    fn descriptor_types_parse_case_insensitively() {
        assert_eq!("lcm2015".parse::<DescriptorType>().unwrap(), DescriptorType::Lcm2015);
        assert_eq!(" FEH ".parse::<DescriptorType>().unwrap(), DescriptorType::Feh);
        assert_eq!(
            "LCM1990".parse::<DescriptorType>(),
            Err(CatchmentError::InvalidDescriptorType("LCM1990".into()))
        );
        assert_eq!("all".parse::<DescriptorSelection>().unwrap(), DescriptorSelection::All);
        assert_eq!(
            "FEH,LCM2015".parse::<DescriptorSelection>().unwrap().types(),
            vec![DescriptorType::Feh, DescriptorType::Lcm2015]
        );
        assert!(DescriptorSelection::parse::<&str>(&[]).is_err());
    }

    #[test]
    fn all_does_not_hide_unknown_names() {
        assert_eq!(
            DescriptorSelection::parse(&["all", "LCM1990"]),
            Err(CatchmentError::InvalidDescriptorType("LCM1990".into()))
        );
        assert_eq!(
            "FEH,all,bogus".parse::<DescriptorSelection>(),
            Err(CatchmentError::InvalidDescriptorType("bogus".into()))
        );
        assert_eq!(
            DescriptorSelection::parse(&["LCM2007", " ALL "]).unwrap(),
            DescriptorSelection::All
        );

        let engine = fixture_engine();
        let mut s = engine.session(scenario(), true);
        assert_eq!(s.get_data_named(&["all", "LCM1990"]).unwrap_err().kind(), "InvalidDescriptorType");
        assert_eq!(s.state(), SessionState::Unresolved);
    }

    #[test]
    fn snap_mode_from_flag() {
        assert_eq!(SnapMode::from(true), SnapMode::Required);
        assert_eq!(SnapMode::from(false), SnapMode::Off);
    }

    #[test]
    fn snapped_scenario_resolves_and_extracts() {
        let engine = fixture_engine();
        let mut s = engine.session(scenario(), true);
        assert_eq!(s.state(), SessionState::Unresolved);

        let feh = s.get_feh_data().unwrap();
        assert_eq!(s.state(), SessionState::Resolved);
        assert_eq!(feh.iter().count(), crate::feh::FehDescriptor::COUNT);

        let res = s.resolve().unwrap();
        assert_eq!(res.region, Region::Ni);
        assert_eq!(res.snapped.unwrap().reach_id, 10);
        assert_eq!(res.catchment.id.as_str(), "NI-HEAD");
        assert!(res.catchment.area_m2 > 0.0);

        let lcm = s.get_lcm_data(2015).unwrap();
        assert_relative_eq!(lcm.total_fraction(), 1.0, epsilon = 1e-6);
        assert_eq!(lcm.catchment, feh.catchment);
    }

    #[test]
    fn unsupported_vintage_leaves_session_unresolved() {
        let engine = fixture_engine();
        let mut s = engine.session(scenario(), true);
        assert_eq!(s.get_lcm_data(1999), Err(CatchmentError::UnsupportedVintage(1999)));
        assert_eq!(s.state(), SessionState::Unresolved);
    }

    #[test]
    fn invalid_descriptor_name_fails_before_resolution() {
        let engine = fixture_engine();
        let mut s = engine.session(scenario(), true);
        let err = s.get_data_named(&["FEH", "LCM1990"]).unwrap_err();
        assert_eq!(err.kind(), "InvalidDescriptorType");
        assert_eq!(s.state(), SessionState::Unresolved);
    }

    #[test]
    fn failed_resolution_is_reported_for_every_type() {
        let engine = fixture_engine();
        // Inside the NI grid but off every mapped catchment.
        let sea = Coordinate::new(10_000.0, 600_000.0);
        let mut s = engine.session(sea, false);
        let merged = s.get_data(&DescriptorSelection::All);
        assert_eq!(s.state(), SessionState::Failed);
        assert_eq!(merged.entries.len(), 4);
        assert_eq!(merged.failures().count(), 4);
        assert!(merged
            .failures()
            .all(|(_, e)| *e == CatchmentError::CatchmentNotFound { coordinate: sea }));
        assert!(merged.catchment.is_none());
        assert_eq!(s.get_feh_data().unwrap_err().kind(), "CatchmentNotFound");
    }

    #[test]
    fn region_without_datasets_is_not_found() {
        let engine = fixture_engine();
        let mut s = engine.session(Coordinate::new(400_000.0, 300_000.0), false);
        assert_eq!(s.get_feh_data().unwrap_err().kind(), "CatchmentNotFound");
    }

    #[test]
    fn required_snap_failure_fails_session() {
        let engine = fixture_engine();
        let far = Coordinate::new(ORIGIN_E + 3000.0, ORIGIN_N + 5000.0);
        let mut s = engine.session(far, SnapMode::Required);
        assert_eq!(s.catchment().unwrap_err().kind(), "NoRiverWithinRange");
        assert_eq!(s.state(), SessionState::Failed);
    }

    #[test]
    fn best_effort_snap_falls_back_to_raw_coordinate() {
        let mut config = fixture_config();
        config.snapping.max_radius_m = 300.0;
        let engine = fixture_engine_with(config);
        // Inside NI-EAST, 600 m from the nearest river.
        let p = Coordinate::new(ORIGIN_E + 3600.0, ORIGIN_N + 1500.0);

        let mut required = engine.session(p, SnapMode::Required);
        assert_eq!(required.catchment().unwrap_err().kind(), "NoRiverWithinRange");

        let mut best_effort = engine.session(p, SnapMode::BestEffort);
        let res = best_effort.resolve().unwrap();
        assert!(res.snapped.is_none());
        assert_eq!(res.query_coordinate, p);
        assert_eq!(res.catchment.id.as_str(), "NI-EAST");
    }

    #[test]
    fn cached_catchment_is_shared_by_every_request() {
        let engine = fixture_engine();
        let mut s = engine.session(scenario(), true);
        let first = s.catchment().unwrap();
        s.get_feh_data().unwrap();
        s.get_lcm_data(2015).unwrap();
        let merged = s.get_data(&DescriptorSelection::All);
        assert!(Arc::ptr_eq(&first, &s.catchment().unwrap()));
        assert_eq!(merged.catchment.as_ref().unwrap().id, first.id);
        assert_eq!(merged.feh().unwrap(), &s.get_feh_data().unwrap());
        assert_eq!(merged.lcm(Vintage::Lcm2015).unwrap(), &s.get_lcm_data(2015).unwrap());
    }

    #[test]
    fn fresh_session_matches_cached_session() {
        let engine = fixture_engine();
        let mut a = engine.session(scenario(), true);
        a.get_feh_data().unwrap();
        a.get_lcm_data(2015).unwrap();
        let cached = a.get_data(&DescriptorSelection::All);

        let mut b = engine.session(scenario(), true);
        assert_eq!(b.get_data(&DescriptorSelection::All), cached);
    }

    #[test]
    fn repeated_get_data_is_identical() {
        let engine = fixture_engine();
        let mut s = engine.session(scenario(), true).with_station("236051");
        let first = s.get_data(&DescriptorSelection::All);
        let second = s.get_data(&DescriptorSelection::All);
        assert_eq!(first, second);
        assert_eq!(first.station.as_deref(), Some("236051"));
        assert_eq!(first.succeeded(), 4);
    }
}

//! Many-site processing.
//!
//! Each site gets its own session; sessions share nothing mutable, so sites
//! run in parallel on a bounded pool when the `threading` feature is on. A
//! failing site is recorded and the batch moves on.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::coords::Coordinate;
use crate::engine::CatchmentEngine;
use crate::session::{CatchmentDescriptors, DescriptorSelection, SnapMode};

/// One monitoring site to look up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteQuery {
    #[serde(default)]
    pub station: Option<String>,
    pub coordinate: Coordinate,
    #[serde(default)]
    pub snap: SnapMode,
}

impl SiteQuery {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            station: None,
            coordinate,
            snap: SnapMode::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    Complete,
    /// Some requested types failed, others succeeded.
    Partial,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteOutcome {
    pub query: SiteQuery,
    pub descriptors: CatchmentDescriptors,
}

impl SiteOutcome {
    pub fn status(&self) -> SiteStatus {
        let ok = self.descriptors.succeeded();
        if ok == self.descriptors.entries.len() {
            SiteStatus::Complete
        } else if ok == 0 {
            SiteStatus::Failed
        } else {
            SiteStatus::Partial
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub sites: usize,
    pub complete: usize,
    pub partial: usize,
    pub failed: usize,
    /// Failed descriptor entries counted by error kind.
    pub failures_by_kind: BTreeMap<&'static str, usize>,
}

impl BatchSummary {
    fn record(&mut self, outcome: &SiteOutcome) {
        self.sites += 1;
        match outcome.status() {
            SiteStatus::Complete => self.complete += 1,
            SiteStatus::Partial => self.partial += 1,
            SiteStatus::Failed => self.failed += 1,
        }
        for (_, err) in outcome.descriptors.failures() {
            *self.failures_by_kind.entry(err.kind()).or_insert(0) += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// One outcome per input site, in input order.
    pub outcomes: Vec<SiteOutcome>,
    pub summary: BatchSummary,
}

fn process_site(engine: &CatchmentEngine, site: &SiteQuery, selection: &DescriptorSelection) -> SiteOutcome {
    let mut session = engine.session(site.coordinate, site.snap);
    if let Some(station) = &site.station {
        session = session.with_station(station.clone());
    }
    let descriptors = session.get_data(selection);
    for (t, err) in descriptors.failures() {
        warn!(
            station = site.station.as_deref().unwrap_or(""),
            coordinate = %site.coordinate,
            descriptor = %t,
            kind = err.kind(),
            "{err}"
        );
    }
    SiteOutcome {
        query: site.clone(),
        descriptors,
    }
}

#[cfg(feature = "threading")]
fn run_all(engine: &CatchmentEngine, sites: &[SiteQuery], selection: &DescriptorSelection) -> Vec<SiteOutcome> {
    use rayon::prelude::*;

    let run = || {
        sites
            .par_iter()
            .map(|site| process_site(engine, site, selection))
            .collect::<Vec<_>>()
    };
    match engine.config().batch.max_workers {
        Some(n) => match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
            Ok(pool) => pool.install(run),
            Err(e) => {
                warn!(error = %e, "could not build worker pool, using the global pool");
                run()
            }
        },
        None => run(),
    }
}

#[cfg(not(feature = "threading"))]
fn run_all(engine: &CatchmentEngine, sites: &[SiteQuery], selection: &DescriptorSelection) -> Vec<SiteOutcome> {
    sites
        .iter()
        .map(|site| process_site(engine, site, selection))
        .collect()
}

/// Look up every site. Per-site failures are reported in the outcomes and
/// never stop the batch.
pub fn process_sites(
    engine: &CatchmentEngine,
    sites: &[SiteQuery],
    selection: &DescriptorSelection,
) -> BatchReport {
    let outcomes = run_all(engine, sites, selection);
    let mut summary = BatchSummary::default();
    for outcome in &outcomes {
        summary.record(outcome);
    }
    info!(
        sites = summary.sites,
        complete = summary.complete,
        partial = summary.partial,
        failed = summary.failed,
        "batch finished"
    );
    BatchReport { outcomes, summary }
}

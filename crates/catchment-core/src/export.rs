//! Flattening of merged descriptors into station property rows, and their
//! CSV form.
//!
//! Row layout follows the NRFA station-property table: one row per value,
//! grouped by source. LCM values are proportions of the classified area.
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::feh::FehDescriptorRecord;
use crate::lcm::LandCoverRecord;
use crate::session::{CatchmentDescriptors, DescriptorRecord};

const METHOD: &str = "automatic";

const COLUMNS: [&str; 9] = [
    "STATION",
    "PROPERTY_GROUP",
    "PROPERTY_ITEM",
    "PROPERTY_VALUE",
    "PROPERTY_METHOD",
    "PROPERTY_COMMENT",
    "TITLE",
    "UNITS",
    "SOURCE_VALUE",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PropertyRow {
    pub station: String,
    pub property_group: String,
    pub property_item: String,
    pub property_value: f64,
    pub property_method: String,
    pub property_comment: String,
    pub title: String,
    pub units: String,
    pub source_value: String,
}

impl PropertyRow {
    fn new(station: &str, group: impl Into<String>, item: impl Into<String>, value: f64) -> Self {
        Self {
            station: station.to_string(),
            property_group: group.into(),
            property_item: item.into(),
            property_value: value,
            property_method: METHOD.to_string(),
            property_comment: String::new(),
            title: String::new(),
            units: String::new(),
            source_value: String::new(),
        }
    }
}

fn feh_rows(station: &str, rec: &FehDescriptorRecord, convert_codes: bool, rows: &mut Vec<PropertyRow>) {
    rows.extend(
        rec.present()
            .map(|(d, v)| PropertyRow::new(station, "FEH", d.label(convert_codes), v)),
    );
}

fn lcm_rows(station: &str, rec: &LandCoverRecord, rows: &mut Vec<PropertyRow>) {
    let year = rec.vintage_year;
    let group = format!("lcm{year}v2021");
    for (&code, &fraction) in &rec.fractions {
        let item = format!("{year}_{code}");
        let mut row = PropertyRow::new(station, group.as_str(), item.as_str(), fraction);
        row.title = rec.class_name(code).unwrap_or_default().to_string();
        row.units = "proportion".into();
        row.source_value = item;
        rows.push(row);
    }

    let group = format!("lcm{year}nrfav2021");
    for share in rec.aggregates() {
        let mut row = PropertyRow::new(station, group.as_str(), share.class.name(), share.fraction);
        row.title = share.class.name().to_string();
        row.units = "proportion".into();
        row.source_value = share
            .members
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join("+");
        rows.push(row);
    }
}

impl CatchmentDescriptors {
    /// Station property rows for every successful entry. Failed entries and
    /// absent FEH values produce no rows. With `convert_codes`, FEH items use
    /// long names instead of codes.
    pub fn to_property_rows(&self, convert_codes: bool) -> Vec<PropertyRow> {
        let station = self.station.as_deref().unwrap_or_default();
        let mut rows = Vec::new();
        for record in self.entries.values().filter_map(|r| r.as_ref().ok()) {
            match record {
                DescriptorRecord::Feh(rec) => {
                    feh_rows(station, rec, convert_codes, &mut rows);
                    if let Some(c) = self.catchment.as_ref().and_then(|c| c.centroid) {
                        rows.push(PropertyRow::new(station, "FEH", "QCNE", c.easting.round()));
                        rows.push(PropertyRow::new(station, "FEH", "QCNN", c.northing.round()));
                    }
                }
                DescriptorRecord::Lcm(rec) => lcm_rows(station, rec, &mut rows),
            }
        }
        rows
    }

    /// Write [`to_property_rows`](Self::to_property_rows) to a CSV file,
    /// header row included.
    pub fn write_csv(&self, path: &Path, convert_codes: bool) -> csv::Result<()> {
        let file = std::fs::File::create(path)?;
        write_property_rows_csv(&self.to_property_rows(convert_codes), file)
    }
}

/// Write rows as CSV with the station-property column names as header.
pub fn write_property_rows_csv<W: io::Write>(rows: &[PropertyRow], writer: W) -> csv::Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        out.write_record(COLUMNS)?;
    }
    for row in rows {
        out.serialize(row)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::session::{DescriptorSelection, DescriptorType};
    use crate::test_support::fixture_engine;
    use crate::Coordinate;
    use approx::assert_relative_eq;

    #[test]
    fn rows_cover_feh_classes_and_aggregates() {
        let engine = fixture_engine();
        let mut s = engine
            .session(Coordinate::new(80_100.0, 480_500.0), true)
            .with_station("236051");
        let merged = s.get_data(&DescriptorSelection::All);
        let rows = merged.to_property_rows(false);

        assert!(rows.iter().all(|r| r.station == "236051"));
        let qb19 = rows.iter().find(|r| r.property_item == "QB19");
        assert!(qb19.is_none(), "absent descriptors are not exported");
        let ccar = rows.iter().find(|r| r.property_item == "CCAR").unwrap();
        assert_eq!(ccar.property_group, "FEH");
        assert_eq!(ccar.property_method, "automatic");
        assert!(rows.iter().any(|r| r.property_item == "QCNE"));

        let grass = rows.iter().find(|r| r.property_item == "2015_4").unwrap();
        assert_eq!(grass.property_group, "lcm2015v2021");
        assert_eq!(grass.title, "Improved grassland");
        assert_eq!(grass.units, "proportion");
        assert_relative_eq!(grass.property_value, 0.5, epsilon = 1e-9);

        let woodland = rows
            .iter()
            .find(|r| r.property_group == "lcm2000nrfav2021" && r.property_item == "Woodland")
            .unwrap();
        assert_eq!(woodland.source_value, "11");
    }

    #[test]
    fn long_names_replace_codes_on_request() {
        let engine = fixture_engine();
        let mut s = engine.session(Coordinate::new(80_100.0, 480_500.0), true);
        let merged = s.get_data(&DescriptorSelection::from(DescriptorType::Feh));
        let rows = merged.to_property_rows(true);
        assert!(rows.iter().any(|r| r.property_item == "ihdtm-catchment-area"));
        assert!(!rows.iter().any(|r| r.property_item == "CCAR"));
    }

    #[test]
    fn failed_entries_produce_no_rows() {
        let engine = fixture_engine();
        let mut s = engine.session(Coordinate::new(10_000.0, 600_000.0), false);
        let merged = s.get_data(&DescriptorSelection::All);
        assert!(merged.to_property_rows(false).is_empty());
    }

    #[test]
    fn rows_serialise_with_table_column_names() {
        let engine = fixture_engine();
        let mut s = engine.session(Coordinate::new(80_100.0, 480_500.0), true);
        let rows = s
            .get_data(&DescriptorSelection::from(DescriptorType::Lcm2015))
            .to_property_rows(false);
        let json = serde_json::to_value(&rows[0]).unwrap();
        for column in super::COLUMNS {
            assert!(json.get(column).is_some(), "missing {column}");
        }
    }

    #[test]
    fn csv_has_header_and_one_line_per_row() {
        let engine = fixture_engine();
        let mut s = engine
            .session(Coordinate::new(80_100.0, 480_500.0), true)
            .with_station("236051");
        let merged = s.get_data(&DescriptorSelection::All);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("236051.csv");
        merged.write_csv(&path, false).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(header, super::COLUMNS);
        let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(records.len(), merged.to_property_rows(false).len());
        let grass = records.iter().find(|r| &r[2] == "2015_4").unwrap();
        assert_eq!(&grass[0], "236051");
        assert_eq!(&grass[1], "lcm2015v2021");
        assert_relative_eq!(grass[3].parse::<f64>().unwrap(), 0.5, epsilon = 1e-9);
        assert_eq!(&grass[7], "proportion");
    }

    #[test]
    fn csv_of_failed_site_is_header_only() {
        let engine = fixture_engine();
        let mut s = engine.session(Coordinate::new(10_000.0, 600_000.0), false);
        let rows = s.get_data(&DescriptorSelection::All).to_property_rows(false);
        let mut buf = Vec::new();
        super::write_property_rows_csv(&rows, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.trim_end(), super::COLUMNS.join(","));
    }
}

//! GeoJSON reading shared by the vector dataset loaders.
//!
//! Coordinates are taken as-is: every vector dataset is expected to be in the
//! same projected grid as the queries against it.
use std::path::Path;

use anyhow::{bail, Context, Result};
use geo::{Coord, LineString, MultiLineString, MultiPolygon, Polygon};
use geojson::{feature::Id, Feature, GeoJson, JsonObject, JsonValue, Value};

/// Read every feature of a GeoJSON file. A bare geometry becomes a single
/// property-less feature.
pub fn read_features(path: &Path) -> Result<Vec<Feature>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let geojson: GeoJson = content
        .parse()
        .with_context(|| format!("parsing GeoJSON {}", path.display()))?;
    Ok(match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![Feature {
            bbox: None,
            geometry: Some(g),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    })
}

fn coord(position: &[f64]) -> Result<Coord<f64>> {
    match position {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => bail!("position has fewer than two ordinates"),
    }
}

fn line_string(positions: &[Vec<f64>]) -> Result<LineString<f64>> {
    positions
        .iter()
        .map(|p| coord(p))
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>> {
    let Some((outer, holes)) = rings.split_first() else {
        bail!("polygon without rings");
    };
    let interiors = holes.iter().map(|r| line_string(r)).collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(line_string(outer)?, interiors))
}

fn geometry_kind(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Polygonal geometry of a feature as a multipolygon.
pub fn as_multipolygon(value: &Value) -> Result<MultiPolygon<f64>> {
    match value {
        Value::Polygon(rings) => Ok(MultiPolygon::new(vec![polygon(rings)?])),
        Value::MultiPolygon(polys) => polys
            .iter()
            .map(|p| polygon(p))
            .collect::<Result<Vec<_>>>()
            .map(MultiPolygon::new),
        other => bail!("expected Polygon or MultiPolygon, found {}", geometry_kind(other)),
    }
}

/// Linear geometry of a feature as a multilinestring.
pub fn as_multilinestring(value: &Value) -> Result<MultiLineString<f64>> {
    match value {
        Value::LineString(positions) => Ok(MultiLineString::new(vec![line_string(positions)?])),
        Value::MultiLineString(lines) => lines
            .iter()
            .map(|l| line_string(l))
            .collect::<Result<Vec<_>>>()
            .map(MultiLineString::new),
        other => bail!("expected LineString or MultiLineString, found {}", geometry_kind(other)),
    }
}

/// Property lookup that treats a missing property map as empty.
pub fn property<'a>(feature: &'a Feature, key: &str) -> Option<&'a JsonValue> {
    feature.properties.as_ref().and_then(|p: &JsonObject| p.get(key))
}

pub fn f64_property(feature: &Feature, key: &str) -> Option<f64> {
    property(feature, key).and_then(JsonValue::as_f64)
}

/// String property; numbers are rendered without a fractional part when integral.
pub fn string_property(feature: &Feature, key: &str) -> Option<String> {
    match property(feature, key)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(
            n.as_u64()
                .map(|u| u.to_string())
                .or_else(|| n.as_i64().map(|i| i.to_string()))
                .unwrap_or_else(|| n.to_string()),
        ),
        _ => None,
    }
}

/// Numeric identifier from an `id` property or the feature id.
pub fn numeric_id(feature: &Feature, key: &str) -> Option<u64> {
    if let Some(v) = property(feature, key) {
        if let Some(u) = v.as_u64() {
            return Some(u);
        }
        if let Some(s) = v.as_str() {
            return s.parse().ok();
        }
    }
    match &feature.id {
        Some(Id::Number(n)) => n.as_u64(),
        Some(Id::String(s)) => s.parse().ok(),
        None => None,
    }
}

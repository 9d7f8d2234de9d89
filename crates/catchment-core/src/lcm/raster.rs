//! Categorical land cover rasters and the polygon overlay.
//!
//! A raster is a row-major grid of class codes with its origin at the
//! top-left corner: row 0 is the northernmost row and northing decreases
//! with the row index.
use std::collections::BTreeMap;
use std::io::Cursor;

use anyhow::{anyhow, bail, ensure, Context, Result};
use geo::{coord, MultiPolygon, Rect};
use serde::Deserialize;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use crate::config::RasterTileConfig;
use crate::geometry::{area_in_rect, ring_edges};

/// Class code used for cells outside the survey unless a tile says otherwise.
pub const DEFAULT_NODATA: u16 = 0;

#[derive(Debug, Clone)]
pub struct CategoryRaster {
    origin_easting: f64,
    origin_northing: f64,
    cell_size: f64,
    width: usize,
    height: usize,
    nodata: u16,
    data: Vec<u16>,
}

/// Per-class area accumulated by an overlay, in m².
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverTally {
    pub classes: BTreeMap<u16, f64>,
    pub nodata_m2: f64,
}

impl CoverTally {
    pub fn classified_m2(&self) -> f64 {
        self.classes.values().sum()
    }
}

#[derive(Deserialize)]
struct RasterFile {
    origin_easting: f64,
    origin_northing: f64,
    cell_size: f64,
    width: usize,
    height: usize,
    nodata: Option<u16>,
    data: Vec<u16>,
}

impl CategoryRaster {
    pub fn new(
        origin: [f64; 2],
        cell_size: f64,
        width: usize,
        height: usize,
        nodata: u16,
        data: Vec<u16>,
    ) -> Result<Self> {
        ensure!(
            cell_size.is_finite() && cell_size > 0.0,
            "cell size must be positive, got {cell_size}"
        );
        ensure!(
            origin[0].is_finite() && origin[1].is_finite(),
            "raster origin is not finite"
        );
        ensure!(
            data.len() == width * height,
            "raster has {} cells, expected {width}×{height}",
            data.len()
        );
        Ok(Self {
            origin_easting: origin[0],
            origin_northing: origin[1],
            cell_size,
            width,
            height,
            nodata,
            data,
        })
    }

    /// Load a tile, choosing the reader by file extension (`.json`, `.tif`,
    /// `.tiff`). Georeference values set on the tile override the file's own.
    pub fn load(tile: &RasterTileConfig) -> Result<Self> {
        let ext = tile
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Self::read_json(tile),
            Some("tif" | "tiff") => Self::read_tiff(tile),
            _ => bail!("unrecognised raster format: {}", tile.path.display()),
        }
    }

    fn read_json(tile: &RasterTileConfig) -> Result<Self> {
        let text = std::fs::read_to_string(&tile.path)
            .with_context(|| format!("reading {}", tile.path.display()))?;
        let file: RasterFile = serde_json::from_str(&text)
            .with_context(|| format!("parsing raster {}", tile.path.display()))?;
        Self::new(
            [
                tile.origin_easting.unwrap_or(file.origin_easting),
                tile.origin_northing.unwrap_or(file.origin_northing),
            ],
            tile.cell_size.unwrap_or(file.cell_size),
            file.width,
            file.height,
            tile.nodata.or(file.nodata).unwrap_or(DEFAULT_NODATA),
            file.data,
        )
    }

    fn read_tiff(tile: &RasterTileConfig) -> Result<Self> {
        let path = &tile.path;
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let mut decoder = Decoder::new(Cursor::new(bytes))
            .with_context(|| format!("{} is not a valid TIFF", path.display()))?;
        let (width, height) = decoder.dimensions()?;

        let (origin, cell_size) = match (tile.origin_easting, tile.origin_northing, tile.cell_size) {
            (Some(e), Some(n), Some(cs)) => ([e, n], cs),
            _ => {
                let (tag_origin, tag_cell) = geotiff_georeference(&mut decoder)
                    .with_context(|| format!("georeferencing {}", path.display()))?;
                (
                    [
                        tile.origin_easting.unwrap_or(tag_origin[0]),
                        tile.origin_northing.unwrap_or(tag_origin[1]),
                    ],
                    tile.cell_size.unwrap_or(tag_cell),
                )
            }
        };

        let data = match decoder.read_image()? {
            DecodingResult::U8(v) => v.into_iter().map(u16::from).collect(),
            DecodingResult::U16(v) => v,
            _ => bail!("{}: expected 8 or 16-bit class codes", path.display()),
        };
        Self::new(
            origin,
            cell_size,
            width as usize,
            height as usize,
            tile.nodata.unwrap_or(DEFAULT_NODATA),
            data,
        )
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn bounds(&self) -> Rect<f64> {
        Rect::new(
            coord! {
                x: self.origin_easting,
                y: self.origin_northing - self.height as f64 * self.cell_size,
            },
            coord! {
                x: self.origin_easting + self.width as f64 * self.cell_size,
                y: self.origin_northing,
            },
        )
    }

    /// Class code at a grid position, `None` outside the raster.
    pub fn value_at(&self, easting: f64, northing: f64) -> Option<u16> {
        let col = ((easting - self.origin_easting) / self.cell_size).floor();
        let row = ((self.origin_northing - northing) / self.cell_size).floor();
        if col < 0.0 || row < 0.0 || col >= self.width as f64 || row >= self.height as f64 {
            return None;
        }
        Some(self.data[row as usize * self.width + col as usize])
    }

    fn cell_rect(&self, col: usize, row: usize) -> Rect<f64> {
        let x0 = self.origin_easting + col as f64 * self.cell_size;
        let y1 = self.origin_northing - row as f64 * self.cell_size;
        Rect::new(
            coord! { x: x0, y: y1 - self.cell_size },
            coord! { x: x0 + self.cell_size, y: y1 },
        )
    }

    fn col_of(&self, x: f64) -> f64 {
        ((x - self.origin_easting) / self.cell_size).floor()
    }

    fn row_of(&self, y: f64) -> f64 {
        ((self.origin_northing - y) / self.cell_size).floor()
    }

    /// Add the area of every class inside `boundary` to `tally`.
    ///
    /// Cells crossed by a ring edge contribute the exact area of the polygon
    /// inside them. Every other cell lies wholly inside or wholly outside, and
    /// is classified by an even-odd scanline through its centre.
    pub fn accumulate(&self, boundary: &MultiPolygon<f64>, bbox: Rect<f64>, tally: &mut CoverTally) {
        let clamp = |v: f64, hi: usize| v.max(0.0).min(hi as f64) as usize;
        let c0 = clamp(self.col_of(bbox.min().x), self.width);
        let c1 = clamp(self.col_of(bbox.max().x) + 1.0, self.width);
        let r0 = clamp(self.row_of(bbox.max().y), self.height);
        let r1 = clamp(self.row_of(bbox.min().y) + 1.0, self.height);
        if c0 >= c1 || r0 >= r1 {
            return;
        }
        let win_w = c1 - c0;
        let win_h = r1 - r0;

        // Mark every cell whose extent meets an edge's bounding box.
        let mut crossed = vec![false; win_w * win_h];
        for (a, b) in ring_edges(boundary) {
            let ec0 = self.col_of(a.x.min(b.x));
            let ec1 = self.col_of(a.x.max(b.x));
            let er0 = self.row_of(a.y.max(b.y));
            let er1 = self.row_of(a.y.min(b.y));
            if ec1 < c0 as f64 || ec0 >= c1 as f64 || er1 < r0 as f64 || er0 >= r1 as f64 {
                continue;
            }
            let (ec0, ec1) = (ec0.max(c0 as f64) as usize, ec1.min((c1 - 1) as f64) as usize);
            let (er0, er1) = (er0.max(r0 as f64) as usize, er1.min((r1 - 1) as f64) as usize);
            for r in er0..=er1 {
                for c in ec0..=ec1 {
                    crossed[(r - r0) * win_w + (c - c0)] = true;
                }
            }
        }

        let full_cell = self.cell_size * self.cell_size;
        let mut crossings: Vec<f64> = Vec::new();
        for row in r0..r1 {
            let yc = self.origin_northing - (row as f64 + 0.5) * self.cell_size;
            crossings.clear();
            for (a, b) in ring_edges(boundary) {
                if (a.y > yc) != (b.y > yc) {
                    crossings.push(a.x + (yc - a.y) * (b.x - a.x) / (b.y - a.y));
                }
            }
            crossings.sort_by(f64::total_cmp);

            let mut next = 0;
            for col in c0..c1 {
                let xc = self.origin_easting + (col as f64 + 0.5) * self.cell_size;
                while next < crossings.len() && crossings[next] < xc {
                    next += 1;
                }
                let area = if crossed[(row - r0) * win_w + (col - c0)] {
                    area_in_rect(boundary, &self.cell_rect(col, row))
                } else if next % 2 == 1 {
                    full_cell
                } else {
                    0.0
                };
                if area <= 0.0 {
                    continue;
                }
                let value = self.data[row * self.width + col];
                if value == self.nodata {
                    tally.nodata_m2 += area;
                } else {
                    *tally.classes.entry(value).or_insert(0.0) += area;
                }
            }
        }
    }
}

/// Top-left origin and cell size from the ModelPixelScale and ModelTiepoint
/// tags.
fn geotiff_georeference<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<([f64; 2], f64)> {
    let scale = decoder
        .find_tag(Tag::ModelPixelScaleTag)?
        .ok_or_else(|| anyhow!("no ModelPixelScale tag and no configured cell_size"))?
        .into_f64_vec()?;
    let tiepoint = decoder
        .find_tag(Tag::ModelTiepointTag)?
        .ok_or_else(|| anyhow!("no ModelTiepoint tag and no configured origin"))?
        .into_f64_vec()?;
    let (&[sx, sy, ..], &[i, j, _, x, y, ..]) = (scale.as_slice(), tiepoint.as_slice()) else {
        bail!("malformed georeference tags");
    };
    ensure!((sx - sy).abs() <= 1e-9 * sx.abs(), "non-square cells ({sx} × {sy})");
    Ok(([x - i * sx, y + j * sy], sx))
}

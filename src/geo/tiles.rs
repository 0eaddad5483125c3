//! Slippy-map (Web Mercator) tile addressing.

use std::f64::consts::PI;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Highest zoom level any common tile server publishes.
pub const MAX_ZOOM: u8 = 22;

/// Web Mercator is undefined at the poles; tile servers clip here.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

/// Viewport bounds in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north: north.max(south),
            south: south.min(north),
            east,
            west,
        }
    }

    /// A box whose west edge lies east of its east edge wraps across 180°.
    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let in_lat = lat <= self.north && lat >= self.south;
        let in_lon = if self.crosses_antimeridian() {
            lon >= self.west || lon <= self.east
        } else {
            lon >= self.west && lon <= self.east
        };
        in_lat && in_lon
    }
}

/// Tile containing the given coordinate at `zoom`, clamped to the valid grid.
pub fn lat_lon_to_tile(lat: f64, lon: f64, zoom: u8) -> TileCoord {
    let zoom = zoom.min(MAX_ZOOM);
    let n = (1_u64 << zoom) as f64;
    let max_index = (1_i64 << zoom) - 1;

    let x_raw = ((lon + 180.0) / 360.0 * n).floor() as i64;
    let lat_rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let y_raw = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor() as i64;

    TileCoord {
        zoom,
        x: x_raw.clamp(0, max_index) as u32,
        y: y_raw.clamp(0, max_index) as u32,
    }
}

/// Tiles covered at one zoom level: a row span times one or two column
/// spans (two when the box wraps across the antimeridian).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoomSpan {
    pub zoom: u8,
    pub columns: Vec<RangeInclusive<u32>>,
    pub rows: RangeInclusive<u32>,
}

impl ZoomSpan {
    fn covering(bounds: &BoundingBox, zoom: u8) -> Self {
        let north_west = lat_lon_to_tile(bounds.north, bounds.west, zoom);
        let south_east = lat_lon_to_tile(bounds.south, bounds.east, zoom);
        let last_column = ((1_u64 << zoom) - 1) as u32;

        let columns = if !bounds.crosses_antimeridian() {
            vec![north_west.x..=south_east.x]
        } else if south_east.x >= north_west.x {
            // Both edges land in overlapping columns: the whole row is covered.
            vec![0..=last_column]
        } else {
            vec![north_west.x..=last_column, 0..=south_east.x]
        };

        Self {
            zoom,
            columns,
            rows: north_west.y..=south_east.y,
        }
    }

    pub fn tile_count(&self) -> u64 {
        let rows = span_len(&self.rows);
        self.columns.iter().map(span_len).sum::<u64>() * rows
    }

    /// Column-major walk over the span, produced on demand.
    pub fn into_tiles(self) -> impl Iterator<Item = TileCoord> {
        let ZoomSpan { zoom, columns, rows } = self;
        columns.into_iter().flat_map(move |span| {
            let rows = rows.clone();
            span.flat_map(move |x| rows.clone().map(move |y| TileCoord { zoom, x, y }))
        })
    }
}

fn span_len(span: &RangeInclusive<u32>) -> u64 {
    if span.is_empty() {
        0
    } else {
        u64::from(*span.end() - *span.start()) + 1
    }
}

/// One [`ZoomSpan`] per zoom in `[min_zoom, max_zoom]`.
pub fn zoom_spans(bounds: &BoundingBox, min_zoom: u8, max_zoom: u8) -> Vec<ZoomSpan> {
    let min_zoom = min_zoom.min(MAX_ZOOM);
    let max_zoom = max_zoom.min(MAX_ZOOM);
    (min_zoom..=max_zoom)
        .map(|zoom| ZoomSpan::covering(bounds, zoom))
        .collect()
}

/// How many tiles [`tiles_in_bounds`] yields, without walking them.
pub fn tile_count(bounds: &BoundingBox, min_zoom: u8, max_zoom: u8) -> u64 {
    zoom_spans(bounds, min_zoom, max_zoom)
        .iter()
        .map(ZoomSpan::tile_count)
        .sum()
}

/// Every tile intersecting `bounds` for each zoom in `[min_zoom, max_zoom]`,
/// ordered by zoom, then column, then row. Tiles are generated lazily, so a
/// world-sized request costs nothing until it is walked.
pub fn tiles_in_bounds(
    bounds: &BoundingBox,
    min_zoom: u8,
    max_zoom: u8,
) -> impl Iterator<Item = TileCoord> {
    zoom_spans(bounds, min_zoom, max_zoom)
        .into_iter()
        .flat_map(ZoomSpan::into_tiles)
}

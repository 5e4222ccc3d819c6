use std::f64::consts::PI;
use std::fmt;

use anyhow::{Context, Result};
use serde::Serialize;

/// Radius used by spherical mercator (EPSG:3857 / 900913).
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half the width of the projected world, in metres.
pub const ORIGIN_SHIFT: f64 = PI * EARTH_RADIUS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileCoord {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Projected rectangle, ordered as minx, miny, maxx, maxy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn expand(&self, amount: f64) -> Self {
        Self {
            min_x: self.min_x - amount,
            min_y: self.min_y - amount,
            max_x: self.max_x + amount,
            max_y: self.max_y + amount,
        }
    }
}

/// Projected bounds of a tile. With `tms` the y index counts from the south.
pub fn tile_to_bbox(tile: TileCoord, tms: bool) -> BBox {
    let tiles_per_side = 2f64.powi(tile.zoom as i32);
    let size = 2.0 * ORIGIN_SHIFT / tiles_per_side;
    let row = if tms {
        tiles_per_side - 1.0 - tile.y as f64
    } else {
        tile.y as f64
    };
    let min_x = -ORIGIN_SHIFT + tile.x as f64 * size;
    let max_y = ORIGIN_SHIFT - row * size;
    BBox::new(min_x, max_y - size, min_x + size, max_y)
}

pub fn parse_tile_spec(value: &str) -> Result<TileCoord> {
    let trimmed = value.trim();
    let mut parts = trimmed.split('/');
    let zoom_str = parts.next().context("tile must be in z/x/y format")?;
    let x_str = parts.next().context("tile must be in z/x/y format")?;
    let y_str = parts.next().context("tile must be in z/x/y format")?;
    if parts.next().is_some() {
        anyhow::bail!("tile must be in z/x/y format");
    }
    let zoom: u8 = zoom_str.parse().context("invalid tile zoom")?;
    let x: u32 = x_str.parse().context("invalid tile x")?;
    let y: u32 = y_str.parse().context("invalid tile y")?;
    if zoom > 30 {
        anyhow::bail!("tile zoom must be at most 30");
    }
    let max_index = 1u64 << zoom;
    if u64::from(x) >= max_index || u64::from(y) >= max_index {
        anyhow::bail!("tile {zoom}/{x}/{y} is outside the zoom {zoom} grid");
    }
    Ok(TileCoord { zoom, x, y })
}

use std::path::Path;

use anyhow::{Context, Result};

use crate::map::{DEFAULT_CANVAS_SIZE, MapContext};
use crate::mercator::TileCoord;
use crate::store::StoreClient;
use crate::style::{MapStyle, read_style};
use crate::tile::{TileOptions, TileReport, profile_tile};

/// Tiles profiled when none are given on the command line.
pub const DEFAULT_TILES: &[TileCoord] = &[TileCoord {
    zoom: 7,
    x: 20,
    y: 49,
}];

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub tile: TileOptions,
    pub width: u32,
    pub height: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            tile: TileOptions::default(),
            width: DEFAULT_CANVAS_SIZE,
            height: DEFAULT_CANVAS_SIZE,
        }
    }
}

/// Profiles `tiles` in order, handing each report to `sink` as soon as it is
/// complete. Stops at the first failing tile. The store is shut down once,
/// whatever the outcome.
pub async fn run<S, F>(
    style: &MapStyle,
    tiles: &[TileCoord],
    store: &S,
    options: &RunOptions,
    sink: F,
) -> Result<Vec<TileReport>>
where
    S: StoreClient,
    F: FnMut(&TileReport) -> Result<()>,
{
    let result = profile_tiles(style, tiles, store, options, sink).await;
    store.shutdown().await;
    result
}

/// Loads the style at `path` and then behaves like [`run`].
pub async fn run_path<S, F>(
    path: &Path,
    tiles: &[TileCoord],
    store: &S,
    options: &RunOptions,
    sink: F,
) -> Result<Vec<TileReport>>
where
    S: StoreClient,
    F: FnMut(&TileReport) -> Result<()>,
{
    let style = match read_style(path) {
        Ok(style) => style,
        Err(err) => {
            store.shutdown().await;
            return Err(err.into());
        }
    };
    run(&style, tiles, store, options, sink).await
}

async fn profile_tiles<S, F>(
    style: &MapStyle,
    tiles: &[TileCoord],
    store: &S,
    options: &RunOptions,
    mut sink: F,
) -> Result<Vec<TileReport>>
where
    S: StoreClient,
    F: FnMut(&TileReport) -> Result<()>,
{
    let mut map = MapContext::new(options.width, options.height).with_buffer_size(style.buffer_size);
    let mut reports = Vec::with_capacity(tiles.len());
    for tile in tiles {
        let report = profile_tile(store, &mut map, style, *tile, &options.tile)
            .await
            .with_context(|| format!("failed to profile tile {tile}"))?;
        sink(&report)?;
        reports.push(report);
    }
    Ok(reports)
}

use serde::Serialize;

use crate::error::ProfileError;
use crate::map::MapContext;
use crate::mercator::{BBox, TileCoord, tile_to_bbox};
use crate::profile::{ProfileOptions, ProfilingRecord, profile_layer};
use crate::progress::layer_progress;
use crate::store::StoreClient;
use crate::style::MapStyle;

pub const DEFAULT_TOP_LAYERS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileReport {
    pub tile: TileCoord,
    pub extent: BBox,
    pub scale_denominator: f64,
    /// Records of every profiled layer, in style order.
    pub records: Vec<ProfilingRecord>,
}

impl TileReport {
    /// Records ordered from slowest to fastest.
    ///
    /// The sort is ascending and stable and the result is then reversed, so
    /// layers with identical times come out in reverse style order.
    pub fn ranked(&self) -> Vec<&ProfilingRecord> {
        let mut ranked: Vec<&ProfilingRecord> = self.records.iter().collect();
        ranked.sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms));
        ranked.reverse();
        ranked
    }

    pub fn top(&self, limit: usize) -> Vec<&ProfilingRecord> {
        let mut ranked = self.ranked();
        ranked.truncate(limit);
        ranked
    }
}

#[derive(Debug, Clone, Default)]
pub struct TileOptions {
    pub profile: ProfileOptions,
    /// Tile rows count from the south (TMS) instead of the north (XYZ).
    pub tms: bool,
    pub no_progress: bool,
}

/// Zooms `map` to `tile` and profiles every layer of `style`, one at a time.
///
/// The first failing layer aborts the tile.
pub async fn profile_tile<S: StoreClient>(
    store: &S,
    map: &mut MapContext,
    style: &MapStyle,
    tile: TileCoord,
    options: &TileOptions,
) -> Result<TileReport, ProfileError> {
    map.zoom_to_box(tile_to_bbox(tile, options.tms));
    let map: &MapContext = map;
    tracing::info!(
        tile = %tile,
        scale_denominator = map.scale_denominator(),
        layers = style.layers.len(),
        "profiling tile"
    );

    let progress = layer_progress(&tile.to_string(), style.layers.len(), options.no_progress);
    let mut records = Vec::new();
    for layer in style.layers.iter() {
        let result = profile_layer(store, map, tile, layer, &options.profile).await;
        progress.inc(1);
        match result {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(err) => {
                progress.finish_and_clear();
                return Err(err);
            }
        }
    }
    progress.finish_and_clear();

    Ok(TileReport {
        tile,
        extent: map.extent(),
        scale_denominator: map.scale_denominator(),
        records,
    })
}

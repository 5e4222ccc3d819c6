use std::time::Instant;

use serde::Serialize;

use crate::error::ProfileError;
use crate::geometry::{ComplexityEstimate, estimate_rows};
use crate::map::MapContext;
use crate::mercator::TileCoord;
use crate::query::{BuiltQuery, QueryExtent, build_query};
use crate::store::StoreClient;
use crate::style::{Layer, SourceKind, SpatialTable};

#[derive(Debug, Clone, Default)]
pub struct ProfileOptions {
    /// Decode returned geometries and estimate their vertex counts.
    pub count_vertices: bool,
    /// Restrict profiling to these layer names. Empty means every layer.
    pub layers: Vec<String>,
}

impl ProfileOptions {
    fn selects(&self, layer: &str) -> bool {
        self.layers.is_empty() || self.layers.iter().any(|name| name == layer)
    }
}

/// Cost of one layer's query for one tile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfilingRecord {
    pub name: String,
    pub kind: SourceKind,
    pub table: String,
    pub rows: u64,
    pub time_ms: f64,
    pub vertex_count: u64,
    pub avg_vertices: u64,
    pub invalid_geometries: u64,
    pub query: String,
}

/// A layer that passed the eligibility checks, with the query to run for it.
#[derive(Debug, Clone)]
pub struct PreparedQuery<'a> {
    pub layer: &'a Layer,
    pub kind: SourceKind,
    pub source: &'a SpatialTable,
    pub query: BuiltQuery,
}

pub fn query_extent(map: &MapContext) -> QueryExtent {
    QueryExtent {
        bbox: map.buffered_extent(),
        scale: map.scale(),
        scale_denominator: map.scale_denominator(),
    }
}

/// Returns the datasource of `layer` when it is active, backed by a supported
/// store and visible at the map's current scale denominator.
pub fn eligible_source<'a>(
    map: &MapContext,
    layer: &'a Layer,
    options: &ProfileOptions,
) -> Option<(SourceKind, &'a SpatialTable)> {
    if !layer.active || !options.selects(&layer.name) {
        return None;
    }
    let kind = layer.datasource.kind()?;
    let source = layer.datasource.spatial_table()?;
    if !layer.is_visible_at(map.scale_denominator()) {
        return None;
    }
    Some((kind, source))
}

pub fn prepare_query<'a>(
    map: &MapContext,
    layer: &'a Layer,
    options: &ProfileOptions,
) -> Result<Option<PreparedQuery<'a>>, ProfileError> {
    let Some((kind, spatial)) = eligible_source(map, layer, options) else {
        return Ok(None);
    };
    let query = build_query(spatial, &query_extent(map)).map_err(|source| {
        ProfileError::QueryBuild {
            layer: layer.name.clone(),
            source,
        }
    })?;
    Ok(Some(PreparedQuery {
        layer,
        kind,
        source: spatial,
        query,
    }))
}

pub fn average_vertices(vertex_count: u64, rows: u64) -> u64 {
    if rows == 0 {
        return 0;
    }
    (vertex_count as f64 / rows as f64).round() as u64
}

/// Runs the query of one layer and measures it.
///
/// Ineligible layers yield `Ok(None)` without touching the store. Only the
/// execute call is timed; the connection is released whether or not it
/// succeeded.
pub async fn profile_layer<S: StoreClient>(
    store: &S,
    map: &MapContext,
    tile: TileCoord,
    layer: &Layer,
    options: &ProfileOptions,
) -> Result<Option<ProfilingRecord>, ProfileError> {
    let Some(prepared) = prepare_query(map, layer, options)? else {
        tracing::trace!(tile = %tile, layer = %layer.name, "skipping ineligible layer");
        return Ok(None);
    };
    let PreparedQuery {
        kind,
        source: spatial,
        query,
        ..
    } = prepared;

    let mut connection = store
        .connect(&spatial.credentials)
        .await
        .map_err(|source| ProfileError::Connection {
            layer: layer.name.clone(),
            source,
        })?;

    let started = Instant::now();
    let result = store.execute(&mut connection, &query.sql).await;
    let time_ms = started.elapsed().as_secs_f64() * 1000.0;
    store.release(connection);

    let output = result.map_err(|source| ProfileError::QueryExecution {
        layer: layer.name.clone(),
        query: query.sql.clone(),
        source,
    })?;
    tracing::debug!(
        tile = %tile,
        layer = %layer.name,
        rows = output.row_count,
        time_ms,
        "layer query finished"
    );

    let complexity = if options.count_vertices && kind == SourceKind::Postgis && output.row_count > 0
    {
        estimate_rows(
            &layer.name,
            output.geometries.iter().map(|geometry| geometry.as_deref()),
        )
    } else {
        ComplexityEstimate::default()
    };

    Ok(Some(ProfilingRecord {
        name: layer.name.clone(),
        kind,
        table: query.table,
        rows: output.row_count,
        time_ms,
        vertex_count: complexity.vertex_count,
        avg_vertices: average_vertices(complexity.vertex_count, output.row_count),
        invalid_geometries: complexity.invalid_geometries,
        query: query.sql,
    }))
}

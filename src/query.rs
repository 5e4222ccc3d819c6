use std::sync::LazyLock;

use regex::{NoExpand, Regex};

use crate::error::QueryError;
use crate::mercator::BBox;
use crate::sql;
use crate::style::SpatialTable;

/// Spatial reference of the projected tile extents.
pub const SRID: u32 = 3857;

static BBOX_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)!bbox!").expect("valid token pattern"));
static SCALE_DENOMINATOR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)!scale_denominator!").expect("valid token pattern"));
static PIXEL_WIDTH_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)!pixel_width!").expect("valid token pattern"));
static PIXEL_HEIGHT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)!pixel_height!").expect("valid token pattern"));

/// View state a query is built against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryExtent {
    pub bbox: BBox,
    pub scale: f64,
    pub scale_denominator: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    /// The `table` fragment after token substitution.
    pub table: String,
    pub sql: String,
}

/// `ST_SetSRID('BOX3D(minx miny 0, maxx maxy 0)'::box3d, 3857)`
pub fn bbox_literal(bbox: &BBox) -> Result<String, QueryError> {
    let box3d = format!(
        "BOX3D({} {} 0, {} {} 0)",
        sql::number(bbox.min_x)?,
        sql::number(bbox.min_y)?,
        sql::number(bbox.max_x)?,
        sql::number(bbox.max_y)?
    );
    Ok(format!(
        "ST_SetSRID({}::box3d, {SRID})",
        sql::quote_literal(&box3d)
    ))
}

pub fn has_bbox_token(table: &str) -> bool {
    BBOX_TOKEN.is_match(table)
}

/// Replaces the `!bbox!`, `!scale_denominator!`, `!pixel_width!` and
/// `!pixel_height!` tokens, ignoring case.
///
/// Both pixel tokens receive the map scale (map units per pixel), not a
/// per-axis pixel size.
pub fn substitute_tokens(table: &str, extent: &QueryExtent) -> Result<String, QueryError> {
    let bbox = bbox_literal(&extent.bbox)?;
    let scale_denominator = sql::number(extent.scale_denominator)?;
    let scale = sql::number(extent.scale)?;

    let resolved = BBOX_TOKEN.replace_all(table, NoExpand(&bbox));
    let resolved = SCALE_DENOMINATOR_TOKEN.replace_all(&resolved, NoExpand(&scale_denominator));
    let resolved = PIXEL_WIDTH_TOKEN.replace_all(&resolved, NoExpand(&scale));
    let resolved = PIXEL_HEIGHT_TOKEN.replace_all(&resolved, NoExpand(&scale));
    Ok(resolved.into_owned())
}

/// Builds the statement fetching every feature of `source` inside `extent`.
pub fn build_query(source: &SpatialTable, extent: &QueryExtent) -> Result<BuiltQuery, QueryError> {
    let column = source
        .spatial_column()
        .ok_or(QueryError::MissingSpatialColumn)?;
    let column = sql::quote_ident(column);

    let table = substitute_tokens(&source.table, extent)?;

    let geometry = if source.simplify_geometries {
        // tolerance follows mapnik's postgis plugin
        format!(
            "ST_Simplify({column}, {})",
            sql::number(extent.scale / 20.0)?
        )
    } else {
        column.clone()
    };

    let mut statement = format!(
        "SELECT *, ST_AsBinary({geometry}) AS geom FROM {}",
        sql::table_reference(&table)
    );
    if !has_bbox_token(&source.table) {
        statement.push_str(&format!(" WHERE {column} && {}", bbox_literal(&extent.bbox)?));
    }

    Ok(BuiltQuery {
        table,
        sql: statement,
    })
}

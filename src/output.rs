use anyhow::Result;
use serde_json::json;

use crate::profile::{PreparedQuery, ProfilingRecord};
use crate::tile::TileReport;

const INDENT: &str = "    ";

fn indented(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines().map(|line| format!("{INDENT}{line}"))
}

pub fn format_tile_header(report: &TileReport) -> String {
    format!(
        "tile: {} scale_denominator: {:.2} profiled_layers: {}",
        report.tile,
        report.scale_denominator,
        report.records.len()
    )
}

pub fn format_record_lines(rank: usize, record: &ProfilingRecord, count_vertices: bool) -> Vec<String> {
    let mut lines = vec![
        format!("{rank}. {}", record.name),
        format!("{INDENT}Time: {:.2}ms", record.time_ms),
        format!("{INDENT}Rows: {}", record.rows),
    ];
    if count_vertices {
        lines.push(format!("{INDENT}Vertices: {}", record.vertex_count));
        lines.push(format!(
            "{INDENT}Average vertices/feature: {}",
            record.avg_vertices
        ));
        if record.invalid_geometries > 0 {
            lines.push(format!(
                "{INDENT}Invalid geometries: {}",
                record.invalid_geometries
            ));
        }
    }
    lines.extend(indented(&record.table));
    lines.extend(indented(&record.query));
    lines
}

/// Text report for one tile: a header and the `top` slowest layers.
pub fn format_report_lines(report: &TileReport, top: usize, count_vertices: bool) -> Vec<String> {
    let mut lines = vec![format_tile_header(report)];
    for (idx, record) in report.top(top).into_iter().enumerate() {
        lines.extend(format_record_lines(idx + 1, record, count_vertices));
        lines.push(String::new());
    }
    lines
}

pub fn report_json(report: &TileReport, top: usize) -> serde_json::Value {
    json!({
        "tile": report.tile,
        "extent": report.extent,
        "scale_denominator": report.scale_denominator,
        "records": report.records,
        "ranked": report.top(top),
    })
}

pub fn report_json_string(report: &TileReport, top: usize) -> Result<String> {
    Ok(serde_json::to_string_pretty(&report_json(report, top))?)
}

pub fn format_query_lines(prepared: &PreparedQuery) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({})",
        prepared.layer.name,
        prepared.kind.as_str()
    )];
    lines.extend(indented(&prepared.query.sql));
    lines.push(String::new());
    lines
}

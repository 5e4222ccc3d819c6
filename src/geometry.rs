use geozero::ToWkt;
use geozero::wkb::Wkb;

use crate::error::GeometryError;

/// Renders a WKB payload (as returned by `ST_AsBinary`) as WKT text.
pub fn wkb_to_wkt(bytes: &[u8]) -> Result<String, GeometryError> {
    Ok(Wkb(bytes.to_vec()).to_wkt()?)
}

/// Vertex count proxy: the number of comma separated groups in the WKT text.
pub fn estimate_vertices(bytes: &[u8]) -> Result<u64, GeometryError> {
    Ok(wkb_to_wkt(bytes)?.split(',').count() as u64)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComplexityEstimate {
    pub vertex_count: u64,
    pub invalid_geometries: u64,
}

/// Sums [`estimate_vertices`] over result rows. Rows that fail to decode are
/// logged and counted as zero; NULL geometries contribute nothing.
pub fn estimate_rows<'a, I>(layer: &str, payloads: I) -> ComplexityEstimate
where
    I: IntoIterator<Item = Option<&'a [u8]>>,
{
    payloads
        .into_iter()
        .enumerate()
        .fold(ComplexityEstimate::default(), |mut acc, (row, payload)| {
            let Some(bytes) = payload else {
                return acc;
            };
            match estimate_vertices(bytes) {
                Ok(count) => acc.vertex_count += count,
                Err(err) => {
                    tracing::warn!(layer, row, error = %err, "skipping unparseable geometry");
                    acc.invalid_geometries += 1;
                }
            }
            acc
        })
}

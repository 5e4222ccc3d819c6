#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use layer_profiler::error::StoreError;
use layer_profiler::store::{QueryOutput, StoreClient};
use layer_profiler::style::{
    Credentials, DataSource, Layer, MapStyle, SpatialTable,
};

/// Store double that answers queries by matching a substring of the SQL and
/// counts every call made against it.
#[derive(Default)]
pub struct FakeStore {
    responses: Vec<(String, Result<QueryOutput, String>)>,
    fail_connect: bool,
    pub queries: Mutex<Vec<String>>,
    connects: AtomicUsize,
    executes: AtomicUsize,
    releases: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, needle: &str, output: QueryOutput) -> Self {
        self.responses.push((needle.to_string(), Ok(output)));
        self
    }

    pub fn fail(mut self, needle: &str, message: &str) -> Self {
        self.responses
            .push((needle.to_string(), Err(message.to_string())));
        self
    }

    pub fn fail_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn executes(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("queries lock").clone()
    }
}

#[async_trait]
impl StoreClient for FakeStore {
    type Connection = usize;

    async fn connect(&self, _credentials: &Credentials) -> Result<usize, StoreError> {
        if self.fail_connect {
            return Err(StoreError::Message("connection refused".to_string()));
        }
        Ok(self.connects.fetch_add(1, Ordering::SeqCst))
    }

    async fn execute(&self, _connection: &mut usize, query: &str) -> Result<QueryOutput, StoreError> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .expect("queries lock")
            .push(query.to_string());
        for (needle, response) in self.responses.iter() {
            if query.contains(needle.as_str()) {
                return response.clone().map_err(StoreError::Message);
            }
        }
        Ok(QueryOutput::default())
    }

    fn release(&self, _connection: usize) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn spatial_table(table: &str) -> SpatialTable {
    SpatialTable {
        table: table.to_string(),
        geometry_field: Some("way".to_string()),
        raster_field: None,
        simplify_geometries: false,
        credentials: Credentials::default(),
    }
}

pub fn postgis_layer(name: &str, table: &str) -> Layer {
    Layer {
        name: name.to_string(),
        active: true,
        min_scale_denominator: 0.0,
        max_scale_denominator: f64::INFINITY,
        datasource: DataSource::Postgis(spatial_table(table)),
    }
}

pub fn pgraster_layer(name: &str, table: &str) -> Layer {
    let mut source = spatial_table(table);
    source.geometry_field = None;
    source.raster_field = Some("rast".to_string());
    Layer {
        name: name.to_string(),
        active: true,
        min_scale_denominator: 0.0,
        max_scale_denominator: f64::INFINITY,
        datasource: DataSource::Pgraster(source),
    }
}

pub fn style(layers: Vec<Layer>) -> MapStyle {
    MapStyle {
        srs: None,
        buffer_size: 0,
        layers,
    }
}

/// Little endian WKB point.
pub fn wkb_point(x: f64, y: f64) -> Vec<u8> {
    let mut bytes = vec![1u8];
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&x.to_le_bytes());
    bytes.extend_from_slice(&y.to_le_bytes());
    bytes
}

/// Little endian WKB linestring.
pub fn wkb_line(coords: &[(f64, f64)]) -> Vec<u8> {
    let mut bytes = vec![1u8];
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend_from_slice(&(coords.len() as u32).to_le_bytes());
    for (x, y) in coords {
        bytes.extend_from_slice(&x.to_le_bytes());
        bytes.extend_from_slice(&y.to_le_bytes());
    }
    bytes
}

pub fn rows(geometries: Vec<Option<Vec<u8>>>) -> QueryOutput {
    QueryOutput {
        row_count: geometries.len() as u64,
        geometries,
    }
}

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StyleError {
    #[error("failed to read style file: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed style xml")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed style attribute")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("{0}")]
    Message(String),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("datasource has neither geometry_field nor raster_field")]
    MissingSpatialColumn,
    #[error("cannot render non-finite number {0} into sql")]
    NonFiniteNumber(f64),
}

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("malformed wkb geometry")]
    Wkb(#[from] geozero::error::GeozeroError),
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to load style {}", .path.display())]
    StyleLoad {
        path: PathBuf,
        #[source]
        source: StyleError,
    },
    #[error("failed to build query for layer {layer}")]
    QueryBuild {
        layer: String,
        #[source]
        source: QueryError,
    },
    #[error("failed to connect to store for layer {layer}")]
    Connection {
        layer: String,
        #[source]
        source: StoreError,
    },
    #[error("query failed for layer {layer}: {query}")]
    QueryExecution {
        layer: String,
        query: String,
        #[source]
        source: StoreError,
    },
}

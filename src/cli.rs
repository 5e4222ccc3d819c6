use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::store::postgres::DEFAULT_MAX_CONNECTIONS;
use crate::tile::DEFAULT_TOP_LAYERS;

#[derive(Debug, Parser)]
#[command(
    name = "layer-profiler",
    version,
    about = "Measure the query cost of a Mapnik style's PostGIS layers per tile"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (error|warn|info|debug|trace)
    #[arg(long, default_value = "info")]
    pub log: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run every eligible layer query and rank layers by elapsed time.
    Profile(ProfileArgs),
    /// Print the queries that would be run, without connecting to the database.
    Query(QueryArgs),
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    /// Mapnik XML style.
    pub style: PathBuf,

    /// Tile to profile as z/x/y. Repeatable; defaults to 7/20/49.
    #[arg(long = "tile")]
    pub tiles: Vec<String>,

    /// Interpret tile rows as TMS (origin in the south).
    #[arg(long, default_value_t = false)]
    pub tms: bool,

    #[arg(long, default_value_t = false)]
    pub count_vertices: bool,

    /// Only profile the named layer. Repeatable.
    #[arg(long = "layer")]
    pub layers: Vec<String>,

    #[arg(long, default_value_t = DEFAULT_TOP_LAYERS)]
    pub top: usize,

    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub output: ReportFormat,

    #[arg(long, default_value_t = false)]
    pub no_progress: bool,

    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    pub style: PathBuf,

    #[arg(long)]
    pub tile: String,

    #[arg(long, default_value_t = false)]
    pub tms: bool,

    #[arg(long = "layer")]
    pub layers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

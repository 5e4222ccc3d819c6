pub mod cli;
pub mod error;
pub mod geometry;
pub mod map;
pub mod mercator;
pub mod output;
pub mod profile;
pub mod progress;
pub mod query;
pub mod run;
pub mod sql;
pub mod store;
pub mod style;
pub mod tile;

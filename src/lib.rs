pub mod batch;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod query;
pub mod report;
pub mod stats;
pub mod tags;

pub use error::{LoadGenError, Result};

//! Panel data ingestion.
//!
//! Reads CSV tables into typed datasets, writes results back out, and loads
//! the TOML pipeline configuration.

pub mod config;
pub mod csv_table;
pub mod directory;
pub mod error;

pub use config::{load_pipeline_config, parse_pipeline_config};
pub use csv_table::{CsvTable, cell_text, read_csv_table, write_csv_table};
pub use directory::{CsvDirectory, list_csv_files};
pub use error::{IngestError, Result};

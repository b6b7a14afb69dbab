//! Tabular input loading.
//!
//! Maps header names to fields, applies the skip column and turns CSV
//! records into raw rows for the table builder.

mod config;
mod error;
mod reader;

pub use config::{Config, FieldNames, LoaderConfig, ServerConfig, SourceConfig};
pub use error::LoadError;
pub use reader::{ColumnMap, CsvLoader};

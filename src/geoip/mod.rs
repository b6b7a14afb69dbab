//! IPv4 range geolocation.
//!
//! Builds a sorted segment table from raw rows and resolves addresses with
//! a binary search bounded by a top-octet bucket index.

mod address;
mod builder;
mod error;
mod metrics;
mod service;
mod table;

pub use address::parse_ipv4;
pub use builder::{nudge, parse_row, BuilderConfig, TableBuilder, COORDINATE_NUDGE};
pub use error::{BuildError, LookupError, RequiredField};
pub use metrics::{CounterMetrics, Metrics, MetricsSnapshot, NoMetrics};
pub use service::{GeoIpService, LoadedTable, TableStats};
pub use table::{RangeTable, BUCKET_COUNT};

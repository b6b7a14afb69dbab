//! Cypress GeoIP - IPv4 range geolocation
//!
//! This library provides the range table, the CSV loader and the lookup
//! service shared by the query and resolve binaries.

pub mod geoip;
pub mod loader;
pub mod models;

pub use geoip::{GeoIpService, RangeTable, TableBuilder};
pub use models::{Coordinate, RawRow, Segment};

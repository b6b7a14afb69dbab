//! Core data models for the range geolocation system.

pub mod segment;

pub use segment::{top_octet, Coordinate, RawRow, Segment};

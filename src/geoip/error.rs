//! Error types for table building and lookups.

use std::fmt;
use std::net::Ipv4Addr;

use thiserror::Error;

/// Mandatory input fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    Begin,
    End,
    Latitude,
    Longitude,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequiredField::Begin => write!(f, "begin"),
            RequiredField::End => write!(f, "end"),
            RequiredField::Latitude => write!(f, "latitude"),
            RequiredField::Longitude => write!(f, "longitude"),
        }
    }
}

/// Errors that abort a table build. Row numbers are 1-based data rows.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("cannot find {field} field '{name}' in header")]
    MissingRequiredField { field: RequiredField, name: String },

    #[error("row {row}: wrong IP address format: {value:?}")]
    InvalidAddressFormat { row: usize, value: String },

    #[error("row {row}: segment end {end} precedes begin {begin}")]
    InvalidSegmentOrder {
        row: usize,
        begin: Ipv4Addr,
        end: Ipv4Addr,
    },

    #[error("row {row}: invalid coordinate: {value:?}")]
    InvalidCoordinate { row: usize, value: String },
}

/// Errors returned by a single lookup. They never affect table state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("lookup table is not initialized")]
    NotInitialized,

    #[error("wrong IP address format: {0:?}")]
    InvalidAddressFormat(String),

    #[error("geolocation not found for {0}")]
    NotFound(Ipv4Addr),
}

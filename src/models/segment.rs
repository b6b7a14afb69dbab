//! Address segments and the raw rows they are built from.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Most significant 8 bits of a big-endian IPv4 address.
#[inline]
pub fn top_octet(address: u32) -> usize {
    (address >> 24) as usize
}

/// Geographic coordinate attached to a segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f32,
    pub longitude: f32,
}

impl Coordinate {
    pub fn new(latitude: f32, longitude: f32) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// One contiguous, inclusive address range mapped to a coordinate.
///
/// `begin <= end` always holds for segments produced by the table builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// First address of the range
    pub begin: u32,
    /// Last address of the range (inclusive)
    pub end: u32,
    pub latitude: f32,
    pub longitude: f32,
}

impl Segment {
    pub fn new(begin: u32, end: u32, latitude: f32, longitude: f32) -> Self {
        Self {
            begin,
            end,
            latitude,
            longitude,
        }
    }

    /// Check whether an address falls inside this segment (both bounds inclusive)
    #[inline]
    pub fn contains(&self, address: u32) -> bool {
        self.begin <= address && address <= self.end
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    pub fn begin_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.begin)
    }

    pub fn end_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.end)
    }
}

/// Unparsed fields of one input row, as emitted by a loader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub begin: String,
    pub end: String,
    pub latitude: String,
    pub longitude: String,
    /// Value of the skip column, when the input carries one
    pub skip: Option<String>,
}

impl RawRow {
    pub fn new(
        begin: impl Into<String>,
        end: impl Into<String>,
        latitude: impl Into<String>,
        longitude: impl Into<String>,
    ) -> Self {
        Self {
            begin: begin.into(),
            end: end.into(),
            latitude: latitude.into(),
            longitude: longitude.into(),
            skip: None,
        }
    }

    pub fn with_skip(mut self, value: impl Into<String>) -> Self {
        self.skip = Some(value.into());
        self
    }
}

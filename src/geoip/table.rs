//! Sorted segment table with a top-octet bucket index.
//!
//! The bucket index bounds every binary search to the segments whose `begin`
//! shares the query's top octet, so the search cost depends on the size of
//! one prefix group rather than on the whole table.

use std::net::Ipv4Addr;

use super::address::parse_ipv4;
use super::LookupError;
use crate::models::{top_octet, Coordinate, Segment};

/// One bucket per possible top octet
pub const BUCKET_COUNT: usize = 256;

/// Immutable, address-sorted segment table.
#[derive(Debug, Clone)]
pub struct RangeTable {
    segments: Vec<Segment>,
    /// Lowest table index whose `begin` has top octet `b` (0 if none)
    begin_bucket: [usize; BUCKET_COUNT],
    /// Highest table index whose `begin` has top octet `b` (0 if none)
    end_bucket: [usize; BUCKET_COUNT],
}

impl Default for RangeTable {
    fn default() -> Self {
        Self {
            segments: Vec::new(),
            begin_bucket: [0; BUCKET_COUNT],
            end_bucket: [0; BUCKET_COUNT],
        }
    }
}

impl RangeTable {
    /// Sort segments by `begin` and build the bucket index over them.
    ///
    /// The sort is stable, so segments sharing a `begin` keep input order.
    pub fn from_segments(mut segments: Vec<Segment>) -> Self {
        segments.sort_by_key(|s| s.begin);
        let (begin_bucket, end_bucket) = build_buckets(&segments);
        Self {
            segments,
            begin_bucket,
            end_bucket,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Initial search window `[begin, end]` for a bucket
    pub fn bucket_window(&self, bucket: u8) -> (usize, usize) {
        let b = bucket as usize;
        (self.begin_bucket[b], self.end_bucket[b])
    }

    /// Number of distinct top octets among segment starts
    pub fn buckets_used(&self) -> usize {
        let mut used = 0;
        let mut prev = None;
        for seg in &self.segments {
            let octet = top_octet(seg.begin);
            if prev != Some(octet) {
                used += 1;
                prev = Some(octet);
            }
        }
        used
    }

    /// Resolve an address given as text
    pub fn lookup_str(&self, address: &str) -> Result<Coordinate, LookupError> {
        if self.is_empty() {
            return Err(LookupError::NotInitialized);
        }
        let address = parse_ipv4(address)
            .ok_or_else(|| LookupError::InvalidAddressFormat(address.to_string()))?;
        self.lookup(address)
    }

    /// Resolve a big-endian IPv4 address to the coordinate of its segment.
    pub fn lookup(&self, address: u32) -> Result<Coordinate, LookupError> {
        self.find(address)
            .map(Segment::coordinate)
            .ok_or_else(|| {
                if self.is_empty() {
                    LookupError::NotInitialized
                } else {
                    LookupError::NotFound(Ipv4Addr::from(address))
                }
            })
    }

    /// Binary search for the segment containing `address`, narrowed to the
    /// window of the address's top-octet bucket.
    pub fn find(&self, address: u32) -> Option<&Segment> {
        if self.segments.is_empty() {
            return None;
        }

        let last = self.segments.len() - 1;
        let bucket = top_octet(address);
        let mut begin = self.begin_bucket[bucket].min(last);
        let mut end = self.end_bucket[bucket].min(last);

        loop {
            if begin > end {
                return None;
            }

            let mid = begin + (end - begin) / 2;
            let seg = &self.segments[mid];

            if seg.contains(address) {
                return Some(seg);
            }

            if begin == end {
                return None;
            }

            if seg.begin > address {
                // mid < end whenever begin < end, so the window shrinks
                end = mid;
            } else {
                // seg.end < address
                begin = mid + 1;
            }
        }
    }
}

/// Build both bucket arrays over a table sorted by `begin`.
///
/// Two explicit passes: walking backwards leaves the lowest index of each
/// octet in `first`, walking forwards leaves the highest in `last`.
/// Buckets without segments stay at 0.
fn build_buckets(segments: &[Segment]) -> ([usize; BUCKET_COUNT], [usize; BUCKET_COUNT]) {
    let mut first = [0usize; BUCKET_COUNT];
    for (index, seg) in segments.iter().enumerate().rev() {
        first[top_octet(seg.begin)] = index;
    }

    let mut last = [0usize; BUCKET_COUNT];
    for (index, seg) in segments.iter().enumerate() {
        last[top_octet(seg.begin)] = index;
    }

    (first, last)
}

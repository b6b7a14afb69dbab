//! IPv4 address text parsing.

use std::net::IpAddr;

/// Parse address text into its big-endian `u32` form.
///
/// IPv4-mapped IPv6 literals (`::ffff:10.0.0.1`) resolve to their IPv4
/// address; any other IPv6 address is rejected.
pub fn parse_ipv4(text: &str) -> Option<u32> {
    match text.parse::<IpAddr>().ok()? {
        IpAddr::V4(v4) => Some(u32::from(v4)),
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(u32::from),
    }
}

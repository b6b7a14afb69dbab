//! Table construction from raw rows.

use std::sync::Arc;

use tracing::{debug, info};

use super::address::parse_ipv4;
use super::{BuildError, Metrics, NoMetrics, RangeTable};
use crate::models::{RawRow, Segment};

/// Bias applied away from zero before narrowing coordinates to `f32`
pub const COORDINATE_NUDGE: f64 = 1e-10;

/// Immutable builder settings
#[derive(Clone)]
pub struct BuilderConfig {
    /// Rows whose skip value equals this are dropped
    pub skip_value: Option<String>,
    pub metrics: Arc<dyn Metrics>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            skip_value: None,
            metrics: Arc::new(NoMetrics),
        }
    }
}

impl std::fmt::Debug for BuilderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuilderConfig")
            .field("skip_value", &self.skip_value)
            .finish_non_exhaustive()
    }
}

/// Builds a [`RangeTable`] from unordered rows
#[derive(Debug, Clone, Default)]
pub struct TableBuilder {
    config: BuilderConfig,
}

impl TableBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Parse, validate, sort and index all rows.
    ///
    /// The first invalid row aborts the build.
    pub fn build<I>(&self, rows: I) -> Result<RangeTable, BuildError>
    where
        I: IntoIterator<Item = RawRow>,
    {
        match self.collect_segments(rows) {
            Ok((segments, skipped)) => {
                let table = RangeTable::from_segments(segments);
                info!(
                    "Built range table with {} segments across {} buckets ({} rows skipped)",
                    table.len(),
                    table.buckets_used(),
                    skipped
                );
                self.config.metrics.build_succeeded(table.len(), skipped);
                Ok(table)
            }
            Err(e) => {
                debug!("Table build aborted: {}", e);
                self.config.metrics.build_failed(&e);
                Err(e)
            }
        }
    }

    fn collect_segments<I>(&self, rows: I) -> Result<(Vec<Segment>, usize), BuildError>
    where
        I: IntoIterator<Item = RawRow>,
    {
        let rows = rows.into_iter();
        let mut segments = Vec::with_capacity(rows.size_hint().0);
        let mut skipped = 0;

        for (index, row) in rows.enumerate() {
            if self.should_skip(&row) {
                skipped += 1;
                continue;
            }
            segments.push(parse_row(index + 1, &row)?);
        }

        Ok((segments, skipped))
    }

    fn should_skip(&self, row: &RawRow) -> bool {
        match (&self.config.skip_value, &row.skip) {
            (Some(skip_value), Some(value)) => skip_value == value,
            _ => false,
        }
    }
}

/// Turn one raw row into a segment. `row` is the 1-based row number.
pub fn parse_row(row: usize, raw: &RawRow) -> Result<Segment, BuildError> {
    let begin = parse_address(row, &raw.begin)?;
    let end = parse_address(row, &raw.end)?;

    if begin > end {
        return Err(BuildError::InvalidSegmentOrder {
            row,
            begin: begin.into(),
            end: end.into(),
        });
    }

    let latitude = parse_coordinate(row, &raw.latitude)?;
    let longitude = parse_coordinate(row, &raw.longitude)?;

    Ok(Segment::new(begin, end, latitude, longitude))
}

fn parse_address(row: usize, value: &str) -> Result<u32, BuildError> {
    parse_ipv4(value).ok_or_else(|| BuildError::InvalidAddressFormat {
        row,
        value: value.to_string(),
    })
}

fn parse_coordinate(row: usize, value: &str) -> Result<f32, BuildError> {
    let invalid = || BuildError::InvalidCoordinate {
        row,
        value: value.to_string(),
    };

    let parsed: f64 = value.parse().map_err(|_| invalid())?;
    if !parsed.is_finite() {
        return Err(invalid());
    }

    Ok(nudge(parsed) as f32)
}

/// Push a non-zero coordinate away from zero by [`COORDINATE_NUDGE`]
pub fn nudge(value: f64) -> f64 {
    if value > 0.0 {
        value + COORDINATE_NUDGE
    } else if value < 0.0 {
        value - COORDINATE_NUDGE
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geoip::{CounterMetrics, LookupError};
    use crate::models::Coordinate;
    use std::net::Ipv4Addr;

    fn row(begin: &str, end: &str, lat: &str, lon: &str) -> RawRow {
        RawRow::new(begin, end, lat, lon)
    }

    #[test]
    fn test_basic_build() {
        let table = TableBuilder::default()
            .build(vec![
                row("20.0.0.0", "20.255.255.255", "1.0", "1.0"),
                row("10.0.0.0", "10.255.255.255", "-1.0", "-1.0"),
            ])
            .unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.segments().iter().all(|s| s.begin <= s.end));
        assert_eq!(table.segments()[0].begin_addr(), Ipv4Addr::new(10, 0, 0, 0));

        let coord = table.lookup_str("10.1.1.1").unwrap();
        assert!((coord.latitude + 1.0).abs() < 1e-6);
        assert!((coord.longitude + 1.0).abs() < 1e-6);
        assert_eq!(
            table.lookup_str("30.1.1.1"),
            Err(LookupError::NotFound(Ipv4Addr::new(30, 1, 1, 1)))
        );
    }

    #[test]
    fn test_inverted_segment_fails() {
        let err = TableBuilder::default()
            .build(vec![
                row("10.0.0.0", "0.255.255.255", "-1.0", "-1.0"),
                row("20.0.0.0", "20.255.255.255", "1.0", "1.0"),
            ])
            .unwrap_err();

        assert_eq!(
            err,
            BuildError::InvalidSegmentOrder {
                row: 1,
                begin: Ipv4Addr::new(10, 0, 0, 0),
                end: Ipv4Addr::new(0, 255, 255, 255),
            }
        );
    }

    #[test]
    fn test_bad_addresses_fail() {
        for (begin, end) in [
            ("1", "10.255.255.255"),
            ("10.0.0.0", "10"),
            ("10.0.0.0", "2001:db8::1"),
            ("10.0.0.0.0", "10.0.0.1"),
        ] {
            let err = TableBuilder::default()
                .build(vec![row(begin, end, "1.0", "1.0")])
                .unwrap_err();
            assert!(
                matches!(err, BuildError::InvalidAddressFormat { row: 1, .. }),
                "{begin}-{end}: {err:?}"
            );
        }
    }

    #[test]
    fn test_bad_coordinates_fail() {
        let cases = [
            ("test", "-1.0"),
            ("1.0", "test"),
            ("", "1.0"),
            ("NaN", "1.0"),
            ("1.0", "inf"),
        ];
        for (lat, lon) in cases {
            let err = TableBuilder::default()
                .build(vec![
                    row("20.0.0.0", "20.255.255.255", "1.0", "1.0"),
                    row("10.0.0.0", "10.255.255.255", lat, lon),
                ])
                .unwrap_err();
            assert!(
                matches!(err, BuildError::InvalidCoordinate { row: 2, .. }),
                "{lat},{lon}: {err:?}"
            );
        }
    }

    #[test]
    fn test_first_error_wins() {
        let err = TableBuilder::default()
            .build(vec![
                row("10.0.0.0", "10.0.0.255", "x", "1.0"),
                row("bad", "10.0.0.255", "1.0", "1.0"),
            ])
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidCoordinate { row: 1, .. }));
    }

    #[test]
    fn test_order_checked_before_coordinates() {
        let err = TableBuilder::default()
            .build(vec![row("10.0.0.9", "10.0.0.1", "x", "y")])
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidSegmentOrder { .. }));
    }

    #[test]
    fn test_nudge() {
        assert_eq!(nudge(0.0), 0.0);
        assert_eq!(nudge(1.0), 1.0 + COORDINATE_NUDGE);
        assert_eq!(nudge(-1.0), -1.0 - COORDINATE_NUDGE);
        // Narrowing absorbs the nudge for ordinary values
        assert_eq!(nudge(-4.0) as f32, -4.0f32);
    }

    #[test]
    fn test_skip_value() {
        let builder = TableBuilder::new(BuilderConfig {
            skip_value: Some("yes".to_string()),
            ..Default::default()
        });
        let table = builder
            .build(vec![
                row("10.0.0.0", "10.255.255.255", "-1.0", "-1.0").with_skip("yes"),
                row("20.0.0.0", "20.255.255.255", "1.0", "1.0").with_skip("no"),
                row("30.0.0.0", "30.255.255.255", "2.0", "2.0"),
            ])
            .unwrap();

        assert_eq!(table.len(), 2);
        assert!(matches!(
            table.lookup_str("10.1.1.1"),
            Err(LookupError::NotFound(_))
        ));
        assert_eq!(table.lookup_str("20.1.1.1"), Ok(Coordinate::new(1.0, 1.0)));
        assert_eq!(table.lookup_str("30.1.1.1"), Ok(Coordinate::new(2.0, 2.0)));
    }

    #[test]
    fn test_skipped_rows_are_not_validated() {
        let builder = TableBuilder::new(BuilderConfig {
            skip_value: Some("-".to_string()),
            ..Default::default()
        });
        let table = builder
            .build(vec![row("junk", "junk", "junk", "junk").with_skip("-")])
            .unwrap();
        assert!(table.is_empty());
        assert_eq!(table.lookup_str("10.0.0.1"), Err(LookupError::NotInitialized));
    }

    #[test]
    fn test_skip_ignored_without_skip_value() {
        let table = TableBuilder::default()
            .build(vec![row("10.0.0.0", "10.0.0.255", "1.0", "1.0").with_skip("yes")])
            .unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_metrics_notified() {
        let metrics = Arc::new(CounterMetrics::new());
        let builder = TableBuilder::new(BuilderConfig {
            skip_value: Some("yes".to_string()),
            metrics: metrics.clone(),
        });

        builder
            .build(vec![
                row("10.0.0.0", "10.0.0.255", "1.0", "1.0"),
                row("11.0.0.0", "11.0.0.255", "1.0", "1.0").with_skip("yes"),
            ])
            .unwrap();
        let _ = builder.build(vec![row("x", "y", "1.0", "1.0")]);

        let snap = metrics.snapshot();
        assert_eq!(snap.builds, 1);
        assert_eq!(snap.segments_loaded, 1);
        assert_eq!(snap.rows_skipped, 1);
        assert_eq!(snap.build_failures, 1);
    }
}

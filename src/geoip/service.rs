//! Lookup service holding the current table.
//!
//! The table sits behind `RwLock<Option<Arc<RangeTable>>>`. Reloads build
//! the replacement outside the lock and swap it in under a short write
//! guard, so every lookup runs against one complete table.

use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::address::parse_ipv4;
use super::{LookupError, Metrics, NoMetrics, RangeTable};
use crate::loader::{CsvLoader, LoadError, LoaderConfig};
use crate::models::Coordinate;

/// A table together with the time it was installed
#[derive(Debug)]
pub struct LoadedTable {
    pub table: RangeTable,
    pub loaded_at: DateTime<Utc>,
}

/// Summary of the currently installed table
#[derive(Debug, Clone, Serialize)]
pub struct TableStats {
    pub segments: usize,
    pub buckets_used: usize,
    pub loaded_at: DateTime<Utc>,
}

/// Range lookup service with atomic table replacement
pub struct GeoIpService {
    current: RwLock<Option<Arc<LoadedTable>>>,
    loader: CsvLoader,
    metrics: Arc<dyn Metrics>,
}

impl Default for GeoIpService {
    fn default() -> Self {
        Self::new(LoaderConfig::default(), Arc::new(NoMetrics))
    }
}

impl GeoIpService {
    /// Create an uninitialized service; lookups fail with `NotInitialized`
    /// until a table is loaded.
    pub fn new(config: LoaderConfig, metrics: Arc<dyn Metrics>) -> Self {
        Self {
            current: RwLock::new(None),
            loader: CsvLoader::new(config, Arc::clone(&metrics)),
            metrics,
        }
    }

    pub fn loader(&self) -> &CsvLoader {
        &self.loader
    }

    /// Load a CSV file and install it. On error the previous table stays.
    pub fn load_path(&self, path: &Path) -> Result<TableStats, LoadError> {
        match self.loader.load_path(path) {
            Ok(table) => Ok(self.replace(table)),
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
                Err(e)
            }
        }
    }

    /// Load CSV from a reader and install it. On error the previous table stays.
    pub fn load_reader<R: std::io::Read>(&self, reader: R) -> Result<TableStats, LoadError> {
        let table = self.loader.load_reader(reader)?;
        Ok(self.replace(table))
    }

    /// Install a fully built table
    pub fn replace(&self, table: RangeTable) -> TableStats {
        let loaded = Arc::new(LoadedTable {
            table,
            loaded_at: Utc::now(),
        });
        let stats = stats_of(&loaded);

        *self.current.write() = Some(loaded);

        info!("Installed range table: {} segments, {} buckets", stats.segments, stats.buckets_used);
        stats
    }

    /// Snapshot of the current table, if any
    pub fn table(&self) -> Option<Arc<LoadedTable>> {
        self.current.read().clone()
    }

    pub fn stats(&self) -> Option<TableStats> {
        self.table().map(|loaded| stats_of(&loaded))
    }

    /// Resolve an address given as text
    pub fn lookup(&self, address: &str) -> Result<Coordinate, LookupError> {
        let result = self.resolve_text(address);
        self.record(&result);
        result
    }

    pub fn lookup_addr(&self, address: Ipv4Addr) -> Result<Coordinate, LookupError> {
        let result = self.resolve(u32::from(address));
        self.record(&result);
        result
    }

    fn resolve_text(&self, address: &str) -> Result<Coordinate, LookupError> {
        let loaded = self.table().ok_or(LookupError::NotInitialized)?;
        if loaded.table.is_empty() {
            return Err(LookupError::NotInitialized);
        }
        let parsed = parse_ipv4(address)
            .ok_or_else(|| LookupError::InvalidAddressFormat(address.to_string()))?;
        loaded.table.lookup(parsed)
    }

    fn resolve(&self, address: u32) -> Result<Coordinate, LookupError> {
        let loaded = self.table().ok_or(LookupError::NotInitialized)?;
        loaded.table.lookup(address)
    }

    fn record(&self, result: &Result<Coordinate, LookupError>) {
        match result {
            Ok(coord) => {
                debug!("Lookup resolved to ({}, {})", coord.latitude, coord.longitude);
                self.metrics.lookup_found();
            }
            Err(LookupError::NotFound(addr)) => {
                debug!("No segment contains {}", addr);
                self.metrics.lookup_not_found();
            }
            Err(e) => {
                debug!("Lookup failed: {}", e);
                self.metrics.lookup_failed(e);
            }
        }
    }
}

fn stats_of(loaded: &LoadedTable) -> TableStats {
    TableStats {
        segments: loaded.table.len(),
        buckets_used: loaded.table.buckets_used(),
        loaded_at: loaded.loaded_at,
    }
}

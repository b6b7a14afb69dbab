use thiserror::Error;

use crate::geoip::BuildError;

/// Errors from reading and building a table out of tabular input
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

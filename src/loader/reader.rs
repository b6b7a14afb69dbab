use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord};
use flate2::read::GzDecoder;
use tracing::info;

use super::{LoadError, LoaderConfig};
use crate::geoip::{BuildError, BuilderConfig, Metrics, RangeTable, RequiredField, TableBuilder};
use crate::models::RawRow;

/// Header spellings also accepted for the default coordinate column names
fn alternate_name(name: &str) -> Option<&'static str> {
    match name {
        "latitude" => Some("lantitude"),
        "longitude" => Some("longtitude"),
        _ => None,
    }
}

/// Column positions resolved from a header row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub begin: usize,
    pub end: usize,
    pub latitude: usize,
    pub longitude: usize,
    pub skip: Option<usize>,
}

impl ColumnMap {
    /// Locate the configured fields in a header row.
    ///
    /// A repeated header name resolves to its last occurrence. The
    /// `lantitude`/`longtitude` spellings stand in for `latitude`/`longitude`
    /// when the configured name is absent.
    pub fn from_header(header: &StringRecord, config: &LoaderConfig) -> Result<Self, BuildError> {
        let names = &config.fields;
        let find = |name: &str| {
            header
                .iter()
                .enumerate()
                .filter_map(|(index, h)| (h == name).then_some(index))
                .last()
        };
        let require = |field: RequiredField, name: &str| {
            find(name)
                .or_else(|| alternate_name(name).and_then(find))
                .ok_or_else(|| BuildError::MissingRequiredField {
                    field,
                    name: name.to_string(),
                })
        };

        Ok(Self {
            begin: require(RequiredField::Begin, &names.begin)?,
            end: require(RequiredField::End, &names.end)?,
            latitude: require(RequiredField::Latitude, &names.latitude)?,
            longitude: require(RequiredField::Longitude, &names.longitude)?,
            skip: names.skip.as_deref().and_then(find),
        })
    }

    pub fn row(&self, record: &StringRecord) -> RawRow {
        let field = |index: usize| record.get(index).unwrap_or_default().to_string();
        RawRow {
            begin: field(self.begin),
            end: field(self.end),
            latitude: field(self.latitude),
            longitude: field(self.longitude),
            skip: self.skip.map(field),
        }
    }
}

/// Reads CSV input into a [`RangeTable`]
#[derive(Debug, Clone)]
pub struct CsvLoader {
    config: LoaderConfig,
    builder: TableBuilder,
}

impl CsvLoader {
    pub fn new(config: LoaderConfig, metrics: Arc<dyn Metrics>) -> Self {
        let builder = TableBuilder::new(BuilderConfig {
            skip_value: config.fields.skip_value.clone(),
            metrics,
        });
        Self { config, builder }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Read every data row. Fails before any row is read if a required
    /// column is missing from the header.
    pub fn read_rows<R: Read>(&self, reader: R) -> Result<Vec<RawRow>, LoadError> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.config.delimiter)
            .comment(self.config.comment)
            .from_reader(reader);

        let header = csv_reader.headers()?.clone();
        let columns = ColumnMap::from_header(&header, &self.config)?;

        let mut rows = Vec::new();
        let mut record = StringRecord::new();
        while csv_reader.read_record(&mut record)? {
            rows.push(columns.row(&record));
        }

        Ok(rows)
    }

    pub fn load_reader<R: Read>(&self, reader: R) -> Result<RangeTable, LoadError> {
        let rows = self.read_rows(reader).map_err(|e| self.report(e))?;
        info!("Read {} rows", rows.len());
        Ok(self.builder.build(rows)?)
    }

    /// Load a CSV file, gunzipping it first when the name ends in `.gz`
    pub fn load_path(&self, path: &Path) -> Result<RangeTable, LoadError> {
        info!("Loading address ranges from {}", path.display());

        let file = File::open(path).map_err(|e| self.report(e.into()))?;
        let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };

        self.load_reader(reader)
    }

    /// Row-level build errors are reported by the builder itself
    fn report(&self, error: LoadError) -> LoadError {
        self.builder.config().metrics.load_failed(&error);
        error
    }
}

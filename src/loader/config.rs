use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level TOML configuration
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub fields: FieldNames,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    /// CSV file, optionally gzip-compressed (`.gz`)
    pub path: Option<PathBuf>,
    pub delimiter: char,
    pub comment: Option<char>,
    /// Reload period for the query server; no reloads when unset
    pub reload_interval_secs: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: None,
            delimiter: ',',
            comment: Some('#'),
            reload_interval_secs: None,
        }
    }
}

/// Header names of the input columns
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct FieldNames {
    pub begin: String,
    pub end: String,
    pub latitude: String,
    pub longitude: String,
    /// Optional column checked against `skip_value`
    pub skip: Option<String>,
    pub skip_value: Option<String>,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            begin: "start".to_string(),
            end: "end".to_string(),
            latitude: "latitude".to_string(),
            longitude: "longitude".to_string(),
            skip: None,
            skip_value: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Validated settings for [`super::CsvLoader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    pub fields: FieldNames,
    pub delimiter: u8,
    pub comment: Option<u8>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            fields: FieldNames::default(),
            delimiter: b',',
            comment: Some(b'#'),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn loader_config(&self) -> Result<LoaderConfig> {
        let delimiter = ascii_byte(self.source.delimiter).context("Invalid delimiter")?;
        let comment = self
            .source
            .comment
            .map(ascii_byte)
            .transpose()
            .context("Invalid comment character")?;

        Ok(LoaderConfig {
            fields: self.fields.clone(),
            delimiter,
            comment,
        })
    }
}

fn ascii_byte(c: char) -> Result<u8> {
    if !c.is_ascii() {
        bail!("'{}' is not a single ASCII character", c);
    }
    Ok(c as u8)
}

//! # Configuration
//!
//! Environment-based configuration for the report binary and any embedding
//! caller.

use std::env;
use std::io;
use std::path::PathBuf;

use crate::data::aggregate::Bucketing;
use crate::data::loader::LoadOptions;
use crate::data::views::ViewOptions;
use crate::error::{LoadError, Result};

/// File name searched for when `SUPERSTORE_DATA` is not set.
pub const DEFAULT_DATA_FILE: &str = "Sample - Superstore.csv";

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Explicit data source (`SUPERSTORE_DATA`)
    pub data_path: Option<PathBuf>,

    /// Directories searched for [`DEFAULT_DATA_FILE`], in order
    pub search_dirs: Vec<PathBuf>,

    /// chrono formats for the date columns
    pub date_formats: Vec<String>,

    /// Rows in the top-customers panel
    pub top_customers: usize,

    /// Rows in the top-states and loss-states panels
    pub top_states: usize,

    /// Zero-fill empty months in the trend panel
    pub dense_months: bool,

    /// Logging level
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key → value source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = LoadOptions::default();

        Self {
            data_path: lookup("SUPERSTORE_DATA").map(PathBuf::from),

            search_dirs: vec![PathBuf::from("."), PathBuf::from("..")],

            date_formats: lookup("SUPERSTORE_DATE_FORMATS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|f| !f.is_empty())
                        .map(String::from)
                        .collect()
                })
                .filter(|formats: &Vec<String>| !formats.is_empty())
                .unwrap_or(defaults.date_formats),

            top_customers: lookup("SUPERSTORE_TOP_CUSTOMERS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),

            top_states: lookup("SUPERSTORE_TOP_STATES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),

            dense_months: lookup("SUPERSTORE_DENSE_MONTHS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// The explicit data path, or the first search directory holding
    /// [`DEFAULT_DATA_FILE`].
    pub fn resolve_data_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.data_path {
            return Ok(path.clone());
        }
        let candidates: Vec<PathBuf> = self
            .search_dirs
            .iter()
            .map(|dir| dir.join(DEFAULT_DATA_FILE))
            .collect();
        if let Some(found) = candidates.iter().find(|p| p.is_file()) {
            return Ok(found.clone());
        }
        let searched = candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(LoadError::data_load(
            PathBuf::from(DEFAULT_DATA_FILE),
            io::Error::new(io::ErrorKind::NotFound, format!("not found in {searched}")),
        ))
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            date_formats: self.date_formats.clone(),
        }
    }

    pub fn view_options(&self) -> ViewOptions {
        ViewOptions {
            top_customers: self.top_customers,
            top_states: self.top_states,
            bucketing: if self.dense_months {
                Bucketing::Dense
            } else {
                Bucketing::Sparse
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

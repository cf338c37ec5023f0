//! Load-time error types.
//!
//! Everything after a successful load degrades gracefully (empty subsets,
//! [`Ratio::Undefined`](crate::data::model::Ratio::Undefined)), so the only
//! fallible stage of the pipeline is reading the source.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading an order-line source.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The source is missing or cannot be read.
    #[error("cannot read data source {}: {source}", path.display())]
    DataLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required column is absent from the header.
    #[error("required column '{column}' is missing")]
    Schema { column: String },

    /// A cell could not be parsed (unparsable date or number).
    #[error("row {row}, column '{column}': cannot parse '{value}' as {expected}")]
    Validation {
        row: usize,
        column: &'static str,
        value: String,
        expected: &'static str,
    },

    /// Malformed CSV (ragged rows, I/O failure mid-stream).
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed JSON source.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed Parquet source.
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow conversion error while reading Parquet batches.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// File extension with no matching loader.
    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),
}

impl LoadError {
    pub(crate) fn data_load(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::DataLoad {
            path: path.into(),
            source,
        }
    }
}

/// Result type for load operations.
pub type Result<T> = std::result::Result<T, LoadError>;

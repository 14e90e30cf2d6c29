//! Tabular Error Types

use thiserror::Error;

/// Errors raised while decoding, building or encoding tables
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TabularError {
    /// No payload was supplied
    #[error("Need to supply a valid data file")]
    MissingInput,

    /// Format name outside the supported set
    #[error("Do not understand format: {0}")]
    UnsupportedFormat(String),

    /// Payload could not be parsed in the claimed format
    #[error("Can not read input file: {0}")]
    MalformedInput(String),

    /// Columns disagree on length or names collide
    #[error("Inconsistent table: {0}")]
    InconsistentTable(String),

    /// Payload holds more rows or columns than decoding allows
    #[error("{0}")]
    TooLarge(String),

    /// Output serialization failed
    #[error("Can not write output: {0}")]
    Encode(String),
}

impl From<csv::Error> for TabularError {
    fn from(err: csv::Error) -> Self {
        TabularError::MalformedInput(err.to_string())
    }
}

impl From<serde_json::Error> for TabularError {
    fn from(err: serde_json::Error) -> Self {
        TabularError::MalformedInput(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for TabularError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        TabularError::MalformedInput(err.to_string())
    }
}

impl From<arrow::error::ArrowError> for TabularError {
    fn from(err: arrow::error::ArrowError) -> Self {
        TabularError::MalformedInput(err.to_string())
    }
}

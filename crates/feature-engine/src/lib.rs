//! Feature Extraction Engine
//!
//! Resolves extraction presets, computes time-series features and runs the
//! engine under a time bound on behalf of a single request.

mod calculators;
mod engine;
mod fft;
mod invoker;
mod presets;
mod statistics;

pub use calculators::{compute_all, Calculator, TrendAttr};
pub use engine::{EngineOptions, EngineRequest, FeatureEngine, StatisticalEngine};
pub use fft::{FftAttr, SpectralAggregate, Spectrum};
pub use invoker::ExtractionInvoker;
pub use presets::{resolve, ExtractionDirectives, Preset};
pub use statistics::SeriesSummary;

use thiserror::Error;

/// Errors while resolving a preset
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresetError {
    #[error("Do not understand extraction setting: {0}")]
    Unknown(String),
}

/// Errors raised by a feature engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("You have to set the column_id which contains the ids of the different time series")]
    MissingIdColumn,
    #[error("Column '{column}' given as {role} column is not in the data")]
    ColumnNotFound { role: &'static str, column: String },
    #[error("Column '{0}' must be numeric")]
    NonNumeric(String),
    #[error("Column '{0}' must not contain missing values")]
    MissingValues(String),
    #[error("Column '{0}' must contain only finite values")]
    NonFinite(String),
    #[error("Could not guess the value column: {0}")]
    AmbiguousValueColumn(String),
    #[error("No time series columns left after removing id and sort columns")]
    NoSeries,
    #[error("The data contains no rows")]
    EmptyData,
    #[error("Internal engine failure: {0}")]
    Internal(String),
}

/// Errors surfaced by the extraction invoker
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("Could not extract features: {0}")]
    Engine(String),
    #[error("Could not extract features: computation exceeded {0}ms")]
    Timeout(u64),
}

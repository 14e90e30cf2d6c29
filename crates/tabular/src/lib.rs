//! Tabular Data Model and Codecs
//!
//! Provides the canonical in-memory table, the id-indexed feature table and
//! the CSV / JSON / Parquet decoders and encoders that move between them.

mod decoder;
mod encoder;
mod error;
mod features;
mod format;
mod roles;
mod table;

pub use decoder::{decode, DecodeLimits};
pub use encoder::{encode, parse_delimiter, DEFAULT_DELIMITER};
pub use error::TabularError;
pub use features::{FeatureColumn, FeatureTable};
pub use format::DataFormat;
pub use roles::ColumnRoles;
pub use table::{Cell, Column, Table};

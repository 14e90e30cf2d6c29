//! Supported Data Formats

use crate::error::TabularError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Serialization format for uploads and responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// Comma separated values with a header row
    Csv,
    /// Array of flat records
    Json,
    /// Apache Parquet columnar container
    Parquet,
}

impl DataFormat {
    /// Canonical name, also used as file extension
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFormat::Csv => "csv",
            DataFormat::Json => "json",
            DataFormat::Parquet => "parquet",
        }
    }

    /// MIME type for HTTP responses
    pub fn content_type(&self) -> &'static str {
        match self {
            DataFormat::Csv => "text/csv",
            DataFormat::Json => "application/json",
            DataFormat::Parquet => "application/vnd.apache.parquet",
        }
    }
}

impl FromStr for DataFormat {
    type Err = TabularError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(DataFormat::Csv),
            "json" => Ok(DataFormat::Json),
            "parquet" | "columnar-binary" => Ok(DataFormat::Parquet),
            other => Err(TabularError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_formats() {
        assert_eq!("csv".parse::<DataFormat>().unwrap(), DataFormat::Csv);
        assert_eq!("json".parse::<DataFormat>().unwrap(), DataFormat::Json);
        assert_eq!("parquet".parse::<DataFormat>().unwrap(), DataFormat::Parquet);
        assert_eq!(
            "columnar-binary".parse::<DataFormat>().unwrap(),
            DataFormat::Parquet
        );
    }

    #[test]
    fn test_unknown_format_names_value() {
        let err = "xlsx".parse::<DataFormat>().unwrap_err();
        assert_eq!(err, TabularError::UnsupportedFormat("xlsx".to_string()));
        assert!(err.to_string().contains("xlsx"));
        assert!("CSV".parse::<DataFormat>().is_err());
    }
}

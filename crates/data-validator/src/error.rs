//! Validation Error Types

use thiserror::Error;

/// Errors during shape validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// Table exceeds the row or column limit
    #[error(
        "Table has {rows} rows and {columns} columns; only tables with less than \
         {row_limit} rows and at most {max_columns} columns are allowed"
    )]
    TooLarge {
        rows: usize,
        columns: usize,
        row_limit: usize,
        max_columns: usize,
    },

    /// Role columns named by the caller are absent from the table
    #[error("Columns not found in data: {}", .0.join(", "))]
    MissingRoleColumns(Vec<String>),
}

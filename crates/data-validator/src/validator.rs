//! Table Shape Validator

use crate::error::ShapeError;
use serde::{Deserialize, Serialize};
use tabular::{ColumnRoles, DecodeLimits, Table};
use tracing::{debug, warn};

/// Shape limits applied to every uploaded table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeLimits {
    /// Tables must have strictly fewer rows than this
    pub row_limit: usize,
    /// Tables may have at most this many columns
    pub max_columns: usize,
    /// Check role columns right after decoding instead of leaving it to the engine
    pub strict_roles: bool,
}

impl Default for ShapeLimits {
    fn default() -> Self {
        Self {
            row_limit: 100,
            max_columns: 6,
            strict_roles: false,
        }
    }
}

impl ShapeLimits {
    /// The same bounds, applied while the payload is still being decoded
    pub fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits::new(self.row_limit, self.max_columns)
    }
}

/// Validator guarding the extraction step against oversized input
#[derive(Debug, Clone, Default)]
pub struct ShapeValidator {
    limits: ShapeLimits,
}

impl ShapeValidator {
    /// Create a new validator with given limits
    pub fn new(limits: ShapeLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ShapeLimits {
        &self.limits
    }

    /// Validate row and column counts
    pub fn validate(&self, table: &Table) -> Result<(), ShapeError> {
        let rows = table.num_rows();
        let columns = table.num_columns();

        if rows >= self.limits.row_limit || columns > self.limits.max_columns {
            warn!(
                "Rejecting table of {} rows x {} columns (limits: <{} rows, <={} columns)",
                rows, columns, self.limits.row_limit, self.limits.max_columns
            );
            return Err(ShapeError::TooLarge {
                rows,
                columns,
                row_limit: self.limits.row_limit,
                max_columns: self.limits.max_columns,
            });
        }

        debug!("Table shape accepted: {} rows x {} columns", rows, columns);
        Ok(())
    }

    /// Check that named role columns exist, when strict role checking is on
    pub fn validate_roles(&self, table: &Table, roles: &ColumnRoles) -> Result<(), ShapeError> {
        if !self.limits.strict_roles {
            return Ok(());
        }

        let missing = roles.missing_from(table);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ShapeError::MissingRoleColumns(missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tabular::{Cell, Column};

    fn table(rows: usize, columns: usize) -> Table {
        let cols = (0..columns)
            .map(|c| Column::new(format!("c{}", c), vec![Cell::Int(1); rows]))
            .collect();
        Table::new(cols).unwrap()
    }

    #[test]
    fn test_accepts_small_table() {
        let validator = ShapeValidator::default();
        assert!(validator.validate(&table(1, 2)).is_ok());
        assert!(validator.validate(&table(99, 6)).is_ok());
    }

    #[test]
    fn test_rejects_hundred_rows() {
        let validator = ShapeValidator::default();
        let err = validator.validate(&table(100, 2)).unwrap_err();
        assert_eq!(
            err,
            ShapeError::TooLarge {
                rows: 100,
                columns: 2,
                row_limit: 100,
                max_columns: 6
            }
        );
        let message = err.to_string();
        assert!(message.contains("100 rows"));
        assert!(message.contains("at most 6 columns"));
    }

    #[test]
    fn test_rejects_seven_columns() {
        let validator = ShapeValidator::default();
        assert!(validator.validate(&table(1, 7)).is_err());
    }

    #[test]
    fn test_custom_limits() {
        let validator = ShapeValidator::new(ShapeLimits {
            row_limit: 3,
            max_columns: 2,
            strict_roles: false,
        });
        assert!(validator.validate(&table(2, 2)).is_ok());
        assert!(validator.validate(&table(3, 2)).is_err());
    }

    #[test]
    fn test_decode_limits_match_shape_check() {
        let limits = ShapeLimits {
            row_limit: 3,
            max_columns: 2,
            strict_roles: false,
        };
        let decode_limits = limits.decode_limits();
        assert_eq!(decode_limits.row_limit, 3);
        assert_eq!(decode_limits.max_columns, 2);

        let payload = bytes::Bytes::from_static(b"a,b\n1,2\n3,4\n5,6\n");
        let err =
            tabular::decode(&payload, tabular::DataFormat::Csv, &decode_limits).unwrap_err();
        assert!(matches!(err, tabular::TabularError::TooLarge(_)));
    }

    #[test]
    fn test_roles_deferred_by_default() {
        let validator = ShapeValidator::default();
        let roles = ColumnRoles {
            sort: Some("time".to_string()),
            ..Default::default()
        };
        assert!(validator.validate_roles(&table(1, 2), &roles).is_ok());
    }

    #[test]
    fn test_strict_roles() {
        let validator = ShapeValidator::new(ShapeLimits {
            strict_roles: true,
            ..Default::default()
        });
        let roles = ColumnRoles {
            id: Some("c0".to_string()),
            sort: Some("time".to_string()),
            ..Default::default()
        };
        let err = validator.validate_roles(&table(1, 2), &roles).unwrap_err();
        assert_eq!(err, ShapeError::MissingRoleColumns(vec!["time".to_string()]));
    }

    proptest! {
        #[test]
        fn prop_limits_enforced(rows in 0usize..150, columns in 1usize..10) {
            let validator = ShapeValidator::default();
            let result = validator.validate(&table(rows, columns));
            prop_assert_eq!(result.is_err(), rows >= 100 || columns > 6);
        }
    }
}

//! Column Role Labels

use crate::table::Table;
use serde::{Deserialize, Serialize};

/// Names of the columns that play the id / kind / sort / value roles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRoles {
    pub id: Option<String>,
    pub kind: Option<String>,
    pub sort: Option<String>,
    pub value: Option<String>,
}

impl ColumnRoles {
    /// Roles that were assigned, as (role, column) pairs
    pub fn assigned(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("id", &self.id),
            ("kind", &self.kind),
            ("sort", &self.sort),
            ("value", &self.value),
        ]
        .into_iter()
        .filter_map(|(role, name)| name.as_deref().map(|n| (role, n)))
    }

    /// Assigned column names that the table does not contain
    pub fn missing_from(&self, table: &Table) -> Vec<String> {
        self.assigned()
            .filter(|(_, name)| !table.has_column(name))
            .map(|(_, name)| name.to_string())
            .collect()
    }

    /// Whether a column is claimed by the id or sort role
    pub fn is_structural(&self, name: &str) -> bool {
        self.id.as_deref() == Some(name) || self.sort.as_deref() == Some(name)
    }
}

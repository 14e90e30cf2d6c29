//! Id-indexed Feature Table

use crate::error::TabularError;
use crate::table::Cell;

/// A named column of computed feature values
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureColumn {
    pub name: String,
    pub values: Vec<f64>,
}

/// Feature table with one row per entity id
///
/// The index holds the entity ids and is carried through every output
/// encoding, since it is the caller's join key back to their data.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    index_name: String,
    index: Vec<Cell>,
    columns: Vec<FeatureColumn>,
}

impl FeatureTable {
    /// Create a feature table with an index and no feature columns yet
    pub fn new(index_name: impl Into<String>, index: Vec<Cell>) -> Self {
        Self {
            index_name: index_name.into(),
            index,
            columns: Vec::new(),
        }
    }

    /// Append a feature column, which must match the index length
    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), TabularError> {
        let name = name.into();
        if values.len() != self.index.len() {
            return Err(TabularError::InconsistentTable(format!(
                "feature '{}' has {} values for {} ids",
                name,
                values.len(),
                self.index.len()
            )));
        }
        if name == self.index_name || self.columns.iter().any(|c| c.name == name) {
            return Err(TabularError::InconsistentTable(format!(
                "duplicate feature column '{}'",
                name
            )));
        }
        self.columns.push(FeatureColumn { name, values });
        Ok(())
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn index(&self) -> &[Cell] {
        &self.index
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    /// Look up a feature column by name
    pub fn column(&self, name: &str) -> Option<&FeatureColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn num_rows(&self) -> usize {
        self.index.len()
    }

    pub fn num_features(&self) -> usize {
        self.columns.len()
    }
}

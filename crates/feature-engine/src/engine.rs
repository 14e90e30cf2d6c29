//! Feature Engine Contract and Built-in Implementation

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use tabular::{Cell, Column, ColumnRoles, FeatureTable, Table};
use tracing::{debug, info};

use crate::calculators::{compute_all, Calculator};
use crate::presets::ExtractionDirectives;
use crate::EngineError;

/// Execution options passed to an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Worker threads to spread entities over; 0 or 1 runs on the calling thread
    pub parallelism: usize,
    /// Log progress per entity
    pub show_progress: bool,
}

impl EngineOptions {
    /// Single-threaded and quiet
    pub fn sequential() -> Self {
        Self {
            parallelism: 0,
            show_progress: false,
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::sequential()
    }
}

/// Everything an engine needs for one extraction
#[derive(Debug, Clone, Copy)]
pub struct EngineRequest<'a> {
    pub table: &'a Table,
    pub roles: &'a ColumnRoles,
    pub directives: &'a ExtractionDirectives,
    pub options: EngineOptions,
}

/// A time-series feature engine
///
/// Implementations turn a table plus column roles into a feature table with
/// one row per distinct id. Any failure is reported as an [`EngineError`].
pub trait FeatureEngine: Send + Sync {
    fn extract(&self, request: &EngineRequest<'_>) -> Result<FeatureTable, EngineError>;
}

/// Built-in engine evaluating the calculator catalogue on every series
#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticalEngine;

impl StatisticalEngine {
    pub fn new() -> Self {
        Self
    }
}

/// How series are laid out in the input table
enum Layout<'t> {
    /// One series per (id, kind value), values in a single column
    Long { kind: &'t Column, value: &'t Column },
    /// One series per (id, column)
    Wide(Vec<&'t Column>),
}

/// Series values for one entity, keyed by kind
type EntitySeries = BTreeMap<String, Vec<f64>>;

impl FeatureEngine for StatisticalEngine {
    fn extract(&self, request: &EngineRequest<'_>) -> Result<FeatureTable, EngineError> {
        let EngineRequest {
            table,
            roles,
            directives,
            options,
        } = *request;

        let id_name = roles.id.as_deref().ok_or(EngineError::MissingIdColumn)?;
        let id_column = lookup(table, "id", id_name)?;
        let sort_column = roles
            .sort
            .as_deref()
            .map(|name| lookup(table, "sort", name))
            .transpose()?;
        let layout = resolve_layout(table, roles)?;

        if table.num_rows() == 0 {
            return Err(EngineError::EmptyData);
        }
        ensure_complete(id_column)?;
        if let Some(sort) = sort_column {
            ensure_complete(sort)?;
        }

        let grouped = group_series(id_column, sort_column, &layout)?;
        let kinds: Vec<String> = grouped
            .values()
            .flat_map(|series| series.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        debug!(
            "Extracting {} calculators for {} entities x {} kinds",
            directives.calculators.len(),
            grouped.len(),
            kinds.len()
        );

        let entities: Vec<&EntitySeries> = grouped.values().collect();
        let rows = compute_rows(&entities, &kinds, &directives.calculators, options)?;
        let ids: Vec<Cell> = grouped.into_keys().collect();

        assemble(id_name, ids, &kinds, &directives.calculators, &rows)
    }
}

fn lookup<'t>(table: &'t Table, role: &'static str, name: &str) -> Result<&'t Column, EngineError> {
    table.column(name).ok_or_else(|| EngineError::ColumnNotFound {
        role,
        column: name.to_string(),
    })
}

fn resolve_layout<'t>(table: &'t Table, roles: &ColumnRoles) -> Result<Layout<'t>, EngineError> {
    let kind = roles
        .kind
        .as_deref()
        .map(|name| lookup(table, "kind", name))
        .transpose()?;
    let value = roles
        .value
        .as_deref()
        .map(|name| lookup(table, "value", name))
        .transpose()?;

    let remaining = |exclude: Option<&str>| -> Vec<&'t Column> {
        table
            .columns()
            .iter()
            .filter(|c| !roles.is_structural(&c.name) && Some(c.name.as_str()) != exclude)
            .collect()
    };

    match (kind, value) {
        (Some(kind), Some(value)) => Ok(Layout::Long { kind, value }),
        (Some(kind), None) => match remaining(Some(kind.name.as_str())).as_slice() {
            [value] => Ok(Layout::Long {
                kind,
                value: *value,
            }),
            candidates => Err(EngineError::AmbiguousValueColumn(format!(
                "{} candidate columns remain next to kind column '{}'; set column_value",
                candidates.len(),
                kind.name
            ))),
        },
        (None, Some(value)) => Ok(Layout::Wide(vec![value])),
        (None, None) => {
            let columns = remaining(None);
            if columns.is_empty() {
                Err(EngineError::NoSeries)
            } else {
                Ok(Layout::Wide(columns))
            }
        }
    }
}

/// Nulls and non-finite floats are both rejected
fn ensure_complete(column: &Column) -> Result<(), EngineError> {
    for cell in &column.cells {
        match cell {
            Cell::Null => return Err(EngineError::MissingValues(column.name.clone())),
            Cell::Float(v) if !v.is_finite() => {
                return Err(EngineError::NonFinite(column.name.clone()))
            }
            _ => {}
        }
    }
    Ok(())
}

fn numeric_values(column: &Column) -> Result<Vec<f64>, EngineError> {
    ensure_complete(column)?;
    column
        .cells
        .iter()
        .map(|cell| {
            cell.as_f64()
                .ok_or_else(|| EngineError::NonNumeric(column.name.clone()))
        })
        .collect()
}

/// Collect each entity's series in id order, values ordered by the sort column
fn group_series(
    id: &Column,
    sort: Option<&Column>,
    layout: &Layout<'_>,
) -> Result<BTreeMap<Cell, EntitySeries>, EngineError> {
    let mut order: Vec<usize> = (0..id.len()).collect();
    order.sort_by(|&a, &b| {
        id.cells[a].cmp(&id.cells[b]).then_with(|| {
            sort.map(|s| s.cells[a].cmp(&s.cells[b]))
                .unwrap_or(Ordering::Equal)
        })
    });

    let mut grouped: BTreeMap<Cell, EntitySeries> = BTreeMap::new();
    match layout {
        Layout::Long { kind, value } => {
            ensure_complete(kind)?;
            let values = numeric_values(value)?;
            for &row in &order {
                grouped
                    .entry(id.cells[row].clone())
                    .or_default()
                    .entry(kind.cells[row].to_string())
                    .or_default()
                    .push(values[row]);
            }
        }
        Layout::Wide(columns) => {
            let series = columns
                .iter()
                .map(|c| Ok((c.name.as_str(), numeric_values(c)?)))
                .collect::<Result<Vec<_>, EngineError>>()?;
            for &row in &order {
                let entity = grouped.entry(id.cells[row].clone()).or_default();
                for (name, values) in &series {
                    entity.entry(name.to_string()).or_default().push(values[row]);
                }
            }
        }
    }
    Ok(grouped)
}

/// Feature values for one entity, kind-major in calculator order
fn compute_row(entity: &EntitySeries, kinds: &[String], calculators: &[Calculator]) -> Vec<f64> {
    let mut row = Vec::with_capacity(kinds.len() * calculators.len());
    for kind in kinds {
        match entity.get(kind) {
            Some(values) => row.extend(compute_all(values, calculators)),
            None => row.extend(std::iter::repeat(f64::NAN).take(calculators.len())),
        }
    }
    row
}

fn compute_rows(
    entities: &[&EntitySeries],
    kinds: &[String],
    calculators: &[Calculator],
    options: EngineOptions,
) -> Result<Vec<Vec<f64>>, EngineError> {
    let total = entities.len();
    let workers = options.parallelism.min(total);

    if workers <= 1 {
        return Ok(entities
            .iter()
            .enumerate()
            .map(|(i, entity)| {
                let row = compute_row(entity, kinds, calculators);
                if options.show_progress {
                    info!("Feature extraction: {}/{} entities", i + 1, total);
                }
                row
            })
            .collect());
    }

    let chunk = total.div_ceil(workers);
    std::thread::scope(|scope| {
        let handles: Vec<_> = entities
            .chunks(chunk)
            .map(|part| {
                scope.spawn(move || {
                    part.iter()
                        .map(|entity| compute_row(entity, kinds, calculators))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut rows = Vec::with_capacity(total);
        for handle in handles {
            let part = handle
                .join()
                .map_err(|_| EngineError::Internal("feature worker panicked".to_string()))?;
            rows.extend(part);
            if options.show_progress {
                info!("Feature extraction: {}/{} entities", rows.len(), total);
            }
        }
        Ok(rows)
    })
}

/// Build the output table with feature columns sorted by name
fn assemble(
    id_name: &str,
    ids: Vec<Cell>,
    kinds: &[String],
    calculators: &[Calculator],
    rows: &[Vec<f64>],
) -> Result<FeatureTable, EngineError> {
    let names: Vec<String> = kinds
        .iter()
        .flat_map(|kind| calculators.iter().map(move |c| c.feature_name(kind)))
        .collect();

    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by(|&a, &b| names[a].cmp(&names[b]));

    let mut features = FeatureTable::new(id_name, ids);
    for col in order {
        let values = rows.iter().map(|row| row[col]).collect();
        features
            .push_column(names[col].clone(), values)
            .map_err(|e| EngineError::Internal(e.to_string()))?;
    }
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::Preset;

    fn ints(name: &str, values: &[i64]) -> Column {
        Column::new(name, values.iter().map(|&v| Cell::Int(v)).collect())
    }

    fn roles(
        id: Option<&str>,
        kind: Option<&str>,
        sort: Option<&str>,
        value: Option<&str>,
    ) -> ColumnRoles {
        ColumnRoles {
            id: id.map(str::to_string),
            kind: kind.map(str::to_string),
            sort: sort.map(str::to_string),
            value: value.map(str::to_string),
        }
    }

    fn run(
        table: &Table,
        roles: &ColumnRoles,
        preset: Preset,
        options: EngineOptions,
    ) -> Result<FeatureTable, EngineError> {
        let directives = preset.directives();
        StatisticalEngine::new().extract(&EngineRequest {
            table,
            roles,
            directives: &directives,
            options,
        })
    }

    fn value(features: &FeatureTable, column: &str, row: usize) -> f64 {
        features.column(column).unwrap().values[row]
    }

    #[test]
    fn test_single_row_comprehensive() {
        let table = Table::new(vec![ints("id", &[1]), ints("value", &[1])]).unwrap();
        let features = run(
            &table,
            &roles(Some("id"), None, None, Some("value")),
            Preset::Comprehensive,
            EngineOptions::sequential(),
        )
        .unwrap();

        assert_eq!(features.index_name(), "id");
        assert_eq!(features.index(), &[Cell::Int(1)]);
        assert!(features.num_features() > 100);
        assert_eq!(value(&features, "value__mean", 0), 1.0);
        assert_eq!(value(&features, "value__length", 0), 1.0);
    }

    #[test]
    fn test_columns_sorted_by_name() {
        let table = Table::new(vec![ints("id", &[1, 1]), ints("value", &[1, 2])]).unwrap();
        let features = run(
            &table,
            &roles(Some("id"), None, None, Some("value")),
            Preset::Minimal,
            EngineOptions::sequential(),
        )
        .unwrap();
        let names: Vec<&str> = features.columns().iter().map(|c| c.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), 10);
    }

    #[test]
    fn test_wide_format_with_sort() {
        let table = Table::new(vec![
            ints("id", &[2, 1, 1, 2]),
            ints("time", &[1, 2, 1, 0]),
            ints("a", &[5, 7, 3, 4]),
            Column::new(
                "b",
                vec![Cell::Float(0.5), Cell::Float(1.5), Cell::Float(2.5), Cell::Float(3.5)],
            ),
        ])
        .unwrap();
        let features = run(
            &table,
            &roles(Some("id"), None, Some("time"), None),
            Preset::Comprehensive,
            EngineOptions::sequential(),
        )
        .unwrap();

        assert_eq!(features.index(), &[Cell::Int(1), Cell::Int(2)]);
        assert!(features.column("time__mean").is_none());
        // id 1 sorted by time: a = [3, 7]; id 2: a = [4, 5]
        assert_eq!(value(&features, "a__mean_change", 0), 4.0);
        assert_eq!(value(&features, "a__mean_change", 1), 1.0);
        assert_eq!(value(&features, "b__sum_values", 0), 4.0);
    }

    #[test]
    fn test_long_format() {
        let table = Table::new(vec![
            ints("id", &[1, 1, 1, 2]),
            Column::new(
                "kind",
                ["x", "x", "y", "x"].iter().map(|s| Cell::Str(s.to_string())).collect(),
            ),
            ints("value", &[1, 3, 10, 5]),
        ])
        .unwrap();
        let features = run(
            &table,
            &roles(Some("id"), Some("kind"), None, Some("value")),
            Preset::Minimal,
            EngineOptions::sequential(),
        )
        .unwrap();

        assert_eq!(features.num_features(), 20);
        assert_eq!(value(&features, "x__mean", 0), 2.0);
        assert_eq!(value(&features, "y__maximum", 0), 10.0);
        assert_eq!(value(&features, "x__mean", 1), 5.0);
        assert!(value(&features, "y__mean", 1).is_nan());
    }

    #[test]
    fn test_kind_without_value_uses_remaining_column() {
        let table = Table::new(vec![
            ints("id", &[1, 1]),
            ints("kind", &[0, 1]),
            ints("reading", &[4, 6]),
        ])
        .unwrap();
        let features = run(
            &table,
            &roles(Some("id"), Some("kind"), None, None),
            Preset::Minimal,
            EngineOptions::sequential(),
        )
        .unwrap();
        assert_eq!(value(&features, "0__mean", 0), 4.0);
        assert_eq!(value(&features, "1__mean", 0), 6.0);
    }

    #[test]
    fn test_role_errors() {
        let table = Table::new(vec![ints("id", &[1]), ints("not_time", &[1])]).unwrap();
        let err = run(
            &table,
            &roles(Some("id"), None, Some("time"), None),
            Preset::Minimal,
            EngineOptions::sequential(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::ColumnNotFound {
                role: "sort",
                column: "time".to_string()
            }
        );

        let err = run(
            &table,
            &ColumnRoles::default(),
            Preset::Minimal,
            EngineOptions::sequential(),
        )
        .unwrap_err();
        assert_eq!(err, EngineError::MissingIdColumn);

        let id_only = Table::new(vec![ints("id", &[1])]).unwrap();
        let err = run(
            &id_only,
            &roles(Some("id"), None, None, None),
            Preset::Minimal,
            EngineOptions::sequential(),
        )
        .unwrap_err();
        assert_eq!(err, EngineError::NoSeries);
    }

    #[test]
    fn test_value_errors() {
        let table = Table::new(vec![
            ints("id", &[1, 2]),
            Column::new("text", vec![Cell::Str("a".to_string()), Cell::Str("b".to_string())]),
            Column::new("gappy", vec![Cell::Float(1.0), Cell::Null]),
        ])
        .unwrap();
        let err = run(
            &table,
            &roles(Some("id"), None, None, Some("text")),
            Preset::Minimal,
            EngineOptions::sequential(),
        )
        .unwrap_err();
        assert_eq!(err, EngineError::NonNumeric("text".to_string()));

        let err = run(
            &table,
            &roles(Some("id"), None, None, Some("gappy")),
            Preset::Minimal,
            EngineOptions::sequential(),
        )
        .unwrap_err();
        assert_eq!(err, EngineError::MissingValues("gappy".to_string()));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let table = Table::new(vec![
            Column::new("id", vec![Cell::Float(1.0), Cell::Float(f64::NAN)]),
            Column::new("value", vec![Cell::Float(1.0), Cell::Float(f64::INFINITY)]),
            ints("clean_id", &[1, 2]),
        ])
        .unwrap();

        let err = run(
            &table,
            &roles(Some("clean_id"), None, None, Some("value")),
            Preset::Minimal,
            EngineOptions::sequential(),
        )
        .unwrap_err();
        assert_eq!(err, EngineError::NonFinite("value".to_string()));

        let err = run(
            &table,
            &roles(Some("id"), None, None, Some("clean_id")),
            Preset::Minimal,
            EngineOptions::sequential(),
        )
        .unwrap_err();
        assert_eq!(err, EngineError::NonFinite("id".to_string()));
    }

    #[test]
    fn test_empty_table() {
        let table = Table::new(vec![ints("id", &[]), ints("value", &[])]).unwrap();
        let err = run(
            &table,
            &roles(Some("id"), None, None, Some("value")),
            Preset::Minimal,
            EngineOptions::sequential(),
        )
        .unwrap_err();
        assert_eq!(err, EngineError::EmptyData);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let ids: Vec<i64> = (0..40).map(|i| i % 7).collect();
        let values: Vec<i64> = (0..40).map(|i| (i * 13) % 11).collect();
        let table = Table::new(vec![ints("id", &ids), ints("value", &values)]).unwrap();
        let roles = roles(Some("id"), None, None, Some("value"));

        let sequential =
            run(&table, &roles, Preset::Efficient, EngineOptions::sequential()).unwrap();
        let parallel = run(
            &table,
            &roles,
            Preset::Efficient,
            EngineOptions {
                parallelism: 3,
                show_progress: true,
            },
        )
        .unwrap();

        assert_eq!(sequential.index(), parallel.index());
        for (a, b) in sequential.columns().iter().zip(parallel.columns()) {
            assert_eq!(a.name, b.name);
            for (x, y) in a.values.iter().zip(&b.values) {
                assert!(x == y || (x.is_nan() && y.is_nan()));
            }
        }
    }
}

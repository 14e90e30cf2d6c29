//! Payload Decoding into Tables

use std::collections::HashMap;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::TabularError;
use crate::format::DataFormat;
use crate::table::{Cell, Column, Table};

/// Prefix pandas uses for index columns written into Parquet files
const PANDAS_INDEX_PREFIX: &str = "__index_level_";

/// CSV fields read as missing values, matching pandas' default NA set
const NA_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Row and column bounds enforced while a payload is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Tables must have fewer rows than this
    pub row_limit: usize,
    /// Tables may have at most this many columns
    pub max_columns: usize,
}

impl DecodeLimits {
    pub const fn new(row_limit: usize, max_columns: usize) -> Self {
        Self {
            row_limit,
            max_columns,
        }
    }

    /// No bounds beyond available memory
    pub const fn unbounded() -> Self {
        Self::new(usize::MAX, usize::MAX)
    }

    fn check_rows(&self, rows: usize) -> Result<(), TabularError> {
        if rows >= self.row_limit {
            return Err(self.too_large(format!("at least {} rows", rows)));
        }
        Ok(())
    }

    fn check_columns(&self, columns: usize) -> Result<(), TabularError> {
        if columns > self.max_columns {
            return Err(self.too_large(format!("at least {} columns", columns)));
        }
        Ok(())
    }

    fn too_large(&self, found: String) -> TabularError {
        TabularError::TooLarge(format!(
            "Table has {}; only tables with less than {} rows and at most {} columns are allowed",
            found, self.row_limit, self.max_columns
        ))
    }
}

/// Decode an uploaded payload in the given format
///
/// Decoding stops as soon as the table outgrows `limits`, so an oversized
/// table is never fully materialised.
pub fn decode(
    payload: &Bytes,
    format: DataFormat,
    limits: &DecodeLimits,
) -> Result<Table, TabularError> {
    if payload.is_empty() {
        return Err(TabularError::MissingInput);
    }

    let table = match format {
        DataFormat::Csv => decode_csv(payload, limits),
        DataFormat::Json => decode_json(payload, limits),
        DataFormat::Parquet => decode_parquet(payload.clone(), limits),
    }
    .map_err(|err| match err {
        TabularError::InconsistentTable(msg) => TabularError::MalformedInput(msg),
        other => other,
    })?;

    debug!(
        "Decoded {} payload: {} rows x {} columns",
        format,
        table.num_rows(),
        table.num_columns()
    );
    Ok(table)
}

fn decode_csv(payload: &[u8], limits: &DecodeLimits) -> Result<Table, TabularError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(payload);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(TabularError::MalformedInput(
            "no columns to parse from file".to_string(),
        ));
    }
    limits.check_columns(headers.len())?;

    let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for (row, record) in reader.records().enumerate() {
        limits.check_rows(row + 1)?;
        let record = record?;
        for (idx, field) in record.iter().enumerate() {
            raw[idx].push(field.to_string());
        }
    }

    let columns = headers
        .into_iter()
        .zip(raw)
        .map(|(name, fields)| Column::new(name, infer_csv_column(&fields)))
        .collect();
    Table::new(columns)
}

/// Type a CSV column as a whole so one stray value cannot split its typing
fn infer_csv_column(fields: &[String]) -> Vec<Cell> {
    let present = || fields.iter().filter(|f| !is_missing(f));

    if present().all(|f| f.parse::<i64>().is_ok()) {
        return map_present(fields, |f| f.parse().map(Cell::Int).unwrap_or(Cell::Null));
    }
    if present().all(|f| f.parse::<f64>().is_ok()) {
        return map_present(fields, |f| f.parse().map(Cell::Float).unwrap_or(Cell::Null));
    }
    if present().all(|f| parse_bool(f).is_some()) {
        return map_present(fields, |f| parse_bool(f).map(Cell::Bool).unwrap_or(Cell::Null));
    }
    map_present(fields, |f| Cell::Str(f.to_string()))
}

fn map_present(fields: &[String], convert: impl Fn(&str) -> Cell) -> Vec<Cell> {
    fields
        .iter()
        .map(|f| if is_missing(f) { Cell::Null } else { convert(f) })
        .collect()
}

fn is_missing(field: &str) -> bool {
    field.is_empty() || NA_TOKENS.contains(&field)
}

fn parse_bool(field: &str) -> Option<bool> {
    match field {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Records layout: `[{"id": 1, "value": 2.5}, ...]`
fn decode_json(payload: &[u8], limits: &DecodeLimits) -> Result<Table, TabularError> {
    let root: JsonValue = serde_json::from_slice(payload)?;
    let records = root.as_array().ok_or_else(|| {
        TabularError::MalformedInput("expected a top-level JSON array of records".to_string())
    })?;
    limits.check_rows(records.len())?;

    let mut names: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut cells: Vec<Vec<Cell>> = Vec::new();

    for (row, record) in records.iter().enumerate() {
        let object = record.as_object().ok_or_else(|| {
            TabularError::MalformedInput(format!("row {} is not a JSON object", row))
        })?;

        for (key, value) in object {
            let idx = match positions.get(key) {
                Some(&idx) => idx,
                None => {
                    limits.check_columns(names.len() + 1)?;
                    names.push(key.clone());
                    cells.push(vec![Cell::Null; row]);
                    positions.insert(key.clone(), names.len() - 1);
                    names.len() - 1
                }
            };
            cells[idx].push(json_to_cell(value, row, key)?);
        }

        for column in cells.iter_mut().filter(|c| c.len() == row) {
            column.push(Cell::Null);
        }
    }

    let columns = names
        .into_iter()
        .zip(cells)
        .map(|(name, cells)| Column::new(name, promote_mixed_numbers(cells)))
        .collect();
    Table::new(columns)
}

fn json_to_cell(value: &JsonValue, row: usize, key: &str) -> Result<Cell, TabularError> {
    match value {
        JsonValue::Null => Ok(Cell::Null),
        JsonValue::Bool(b) => Ok(Cell::Bool(*b)),
        JsonValue::Number(n) => Ok(match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Cell::Int(i),
            (None, Some(f)) => Cell::Float(f),
            (None, None) => Cell::Str(n.to_string()),
        }),
        JsonValue::String(s) => Ok(Cell::Str(s.clone())),
        JsonValue::Array(_) | JsonValue::Object(_) => Err(TabularError::MalformedInput(format!(
            "row {}, key '{}': nested values are not supported",
            row, key
        ))),
    }
}

/// A column holding both integers and floats becomes a float column
fn promote_mixed_numbers(cells: Vec<Cell>) -> Vec<Cell> {
    let has_float = cells.iter().any(|c| matches!(c, Cell::Float(_)));
    let has_int = cells.iter().any(|c| matches!(c, Cell::Int(_)));
    if !(has_float && has_int) {
        return cells;
    }
    cells
        .into_iter()
        .map(|c| match c {
            Cell::Int(i) => Cell::Float(i as f64),
            other => other,
        })
        .collect()
}

fn decode_parquet(payload: Bytes, limits: &DecodeLimits) -> Result<Table, TabularError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(payload)?;
    let declared_rows = builder.metadata().file_metadata().num_rows().max(0) as usize;
    limits.check_rows(declared_rows)?;

    let schema = builder.schema().clone();
    let keep: Vec<usize> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.name().starts_with(PANDAS_INDEX_PREFIX))
        .map(|(i, _)| i)
        .collect();
    limits.check_columns(keep.len())?;

    let reader = builder.build()?;

    let mut columns: Vec<Column> = keep
        .iter()
        .map(|&i| Column::new(schema.field(i).name().clone(), Vec::new()))
        .collect();

    let mut rows = 0;
    for batch in reader {
        let batch = batch?;
        rows += batch.num_rows();
        limits.check_rows(rows)?;
        for (column, &idx) in columns.iter_mut().zip(&keep) {
            let cells = arrow_to_cells(batch.column(idx), &column.name)?;
            column.cells.extend(cells);
        }
    }

    Table::new(columns)
}

fn arrow_to_cells(array: &ArrayRef, name: &str) -> Result<Vec<Cell>, TabularError> {
    let cells = match array.data_type() {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => {
            let cast = compute::cast(array.as_ref(), &DataType::Int64)?;
            cast.as_primitive::<Int64Type>()
                .iter()
                .map(|v| v.map(Cell::Int).unwrap_or(Cell::Null))
                .collect()
        }
        DataType::Float16 | DataType::Float32 | DataType::Float64 => {
            let cast = compute::cast(array.as_ref(), &DataType::Float64)?;
            cast.as_primitive::<Float64Type>()
                .iter()
                .map(|v| v.map(Cell::Float).unwrap_or(Cell::Null))
                .collect()
        }
        DataType::Boolean => array
            .as_boolean()
            .iter()
            .map(|v| v.map(Cell::Bool).unwrap_or(Cell::Null))
            .collect(),
        DataType::Utf8 | DataType::LargeUtf8 => {
            let cast = compute::cast(array.as_ref(), &DataType::Utf8)?;
            cast.as_string::<i32>()
                .iter()
                .map(|v| v.map(|s| Cell::Str(s.to_string())).unwrap_or(Cell::Null))
                .collect()
        }
        DataType::Null => vec![Cell::Null; array.len()],
        other => {
            return Err(TabularError::MalformedInput(format!(
                "column '{}' has unsupported type {}",
                name, other
            )))
        }
    };
    Ok(cells)
}

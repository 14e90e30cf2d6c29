//! Feature Table Encoding

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde_json::{Map, Number, Value as JsonValue};
use tracing::debug;

use crate::error::TabularError;
use crate::features::FeatureTable;
use crate::format::DataFormat;
use crate::table::{format_float, Cell};

/// Field delimiter used when the caller does not pick one
pub const DEFAULT_DELIMITER: u8 = b',';

/// Parse a caller-supplied CSV delimiter
///
/// The CSV writer works on bytes, so only one-byte ASCII delimiters are
/// accepted; multi-byte characters such as `§` are rejected.
pub fn parse_delimiter(raw: &str) -> Result<u8, TabularError> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() && !matches!(c, '"' | '\n' | '\r') => Ok(c as u8),
        _ => Err(TabularError::Encode(format!(
            "output delimiter must be a single one-byte ASCII character \
             (not a quote or line break), got '{}'",
            raw
        ))),
    }
}

/// Serialize a feature table, keeping the id index in every format
pub fn encode(
    table: &FeatureTable,
    format: DataFormat,
    delimiter: u8,
) -> Result<Vec<u8>, TabularError> {
    let payload = match format {
        DataFormat::Csv => encode_csv(table, delimiter)?,
        DataFormat::Json => encode_json(table)?,
        DataFormat::Parquet => encode_parquet(table)?,
    };

    debug!(
        "Encoded {} rows x {} features as {} ({} bytes)",
        table.num_rows(),
        table.num_features(),
        format,
        payload.len()
    );
    Ok(payload)
}

fn encode_error(err: impl std::fmt::Display) -> TabularError {
    TabularError::Encode(err.to_string())
}

fn encode_csv(table: &FeatureTable, delimiter: u8) -> Result<Vec<u8>, TabularError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    let header = std::iter::once(table.index_name())
        .chain(table.columns().iter().map(|c| c.name.as_str()));
    writer.write_record(header).map_err(encode_error)?;

    for (row, id) in table.index().iter().enumerate() {
        let record = std::iter::once(id.to_string())
            .chain(table.columns().iter().map(|c| format_float(c.values[row])));
        writer.write_record(record).map_err(encode_error)?;
    }

    writer.into_inner().map_err(encode_error)
}

/// Records layout with the index reset into the leading key
fn encode_json(table: &FeatureTable) -> Result<Vec<u8>, TabularError> {
    let records: Vec<JsonValue> = table
        .index()
        .iter()
        .enumerate()
        .map(|(row, id)| {
            let mut record = Map::with_capacity(table.num_features() + 1);
            record.insert(table.index_name().to_string(), cell_to_json(id));
            for column in table.columns() {
                record.insert(column.name.clone(), float_to_json(column.values[row]));
            }
            JsonValue::Object(record)
        })
        .collect();

    serde_json::to_vec(&records).map_err(encode_error)
}

fn cell_to_json(cell: &Cell) -> JsonValue {
    match cell {
        Cell::Null => JsonValue::Null,
        Cell::Bool(b) => JsonValue::Bool(*b),
        Cell::Int(i) => JsonValue::Number((*i).into()),
        Cell::Float(f) => float_to_json(*f),
        Cell::Str(s) => JsonValue::String(s.clone()),
    }
}

fn float_to_json(value: f64) -> JsonValue {
    Number::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

fn encode_parquet(table: &FeatureTable) -> Result<Vec<u8>, TabularError> {
    let (index_type, index_array) = index_to_arrow(table.index());

    let mut fields = vec![Field::new(table.index_name(), index_type, true)];
    let mut arrays: Vec<ArrayRef> = vec![index_array];
    for column in table.columns() {
        fields.push(Field::new(&column.name, DataType::Float64, true));
        let values: Float64Array = column
            .values
            .iter()
            .map(|v| if v.is_nan() { None } else { Some(*v) })
            .collect();
        arrays.push(Arc::new(values));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).map_err(encode_error)?;

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, schema, None).map_err(encode_error)?;
    writer.write(&batch).map_err(encode_error)?;
    writer.close().map_err(encode_error)?;
    Ok(buffer)
}

/// Pick the narrowest Arrow type that holds every id
fn index_to_arrow(index: &[Cell]) -> (DataType, ArrayRef) {
    if index.iter().all(|c| matches!(c, Cell::Int(_) | Cell::Null)) {
        let ids: Int64Array = index
            .iter()
            .map(|c| match c {
                Cell::Int(i) => Some(*i),
                _ => None,
            })
            .collect();
        (DataType::Int64, Arc::new(ids))
    } else if index
        .iter()
        .all(|c| matches!(c, Cell::Int(_) | Cell::Float(_) | Cell::Null))
    {
        let ids: Float64Array = index.iter().map(Cell::as_f64).collect();
        (DataType::Float64, Arc::new(ids))
    } else if index.iter().all(|c| matches!(c, Cell::Bool(_) | Cell::Null)) {
        let ids: BooleanArray = index
            .iter()
            .map(|c| match c {
                Cell::Bool(b) => Some(*b),
                _ => None,
            })
            .collect();
        (DataType::Boolean, Arc::new(ids))
    } else {
        let ids: StringArray = index
            .iter()
            .map(|c| if c.is_null() { None } else { Some(c.to_string()) })
            .collect();
        (DataType::Utf8, Arc::new(ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureTable {
        let mut table = FeatureTable::new("id", vec![Cell::Int(1), Cell::Int(2)]);
        table.push_column("value__mean", vec![1.0, 2.5]).unwrap();
        table.push_column("value__skewness", vec![f64::NAN, 0.5]).unwrap();
        table
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(",").unwrap(), b',');
        assert_eq!(parse_delimiter("|").unwrap(), b'|');
        assert_eq!(parse_delimiter("\t").unwrap(), b'\t');
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("||").is_err());
        assert!(parse_delimiter("\"").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn test_multibyte_delimiter_message() {
        let err = parse_delimiter("§").unwrap_err();
        assert!(matches!(err, TabularError::Encode(ref msg)
            if msg.contains("one-byte ASCII") && msg.contains("'§'")));
    }

    #[test]
    fn test_csv_index_first() {
        let out = String::from_utf8(encode(&sample(), DataFormat::Csv, b',').unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "id,value__mean,value__skewness");
        assert_eq!(lines[1], "1,1.0,");
        assert_eq!(lines[2], "2,2.5,0.5");
    }

    #[test]
    fn test_csv_custom_delimiter() {
        let out = String::from_utf8(encode(&sample(), DataFormat::Csv, b'|').unwrap()).unwrap();
        assert!(out.starts_with("id|value__mean|value__skewness\n"));
        assert!(!out.contains(','));
    }

    #[test]
    fn test_json_resets_index() {
        let out = encode(&sample(), DataFormat::Json, b',').unwrap();
        let parsed: JsonValue = serde_json::from_slice(&out).unwrap();
        let records = parsed.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], JsonValue::from(1));
        assert_eq!(records[0]["value__mean"], JsonValue::from(1.0));
        assert!(records[0]["value__skewness"].is_null());
        let first_key = records[1].as_object().unwrap().keys().next().unwrap();
        assert_eq!(first_key, "id");
    }

    #[test]
    fn test_parquet_string_index() {
        let mut table = FeatureTable::new(
            "entity",
            vec![Cell::Str("a".to_string()), Cell::Str("b".to_string())],
        );
        table.push_column("x__sum", vec![1.0, 2.0]).unwrap();
        let out = encode(&table, DataFormat::Parquet, b',').unwrap();
        assert_eq!(&out[..4], b"PAR1");
    }
}

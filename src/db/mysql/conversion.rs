//! MySQL row to JSON conversion.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Map, Value};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::db::value;

/// Convert a row into a JSON object keyed by column name.
pub fn row_to_json(row: &MySqlRow) -> Value {
    let mut object = Map::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let cell = cell_to_json(row, index, column.type_info().name());
        object.insert(column.name().to_string(), cell);
    }
    Value::Object(object)
}

fn cell_to_json(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    let decoded = match type_name {
        "BOOLEAN" => row.try_get_unchecked::<bool, _>(index).map(Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            row.try_get_unchecked::<i64, _>(index).map(Value::from)
        }
        name if name.ends_with(" UNSIGNED") => {
            row.try_get_unchecked::<u64, _>(index).map(Value::from)
        }
        "FLOAT" => row
            .try_get_unchecked::<f32, _>(index)
            .map(|v| value::float(f64::from(v))),
        "DOUBLE" => row.try_get_unchecked::<f64, _>(index).map(value::float),
        "DATETIME" | "TIMESTAMP" => row
            .try_get_unchecked::<NaiveDateTime, _>(index)
            .map(|ts| Value::String(ts.to_string())),
        "DATE" => row
            .try_get_unchecked::<NaiveDate, _>(index)
            .map(|date| Value::String(date.to_string())),
        "TIME" => row
            .try_get_unchecked::<NaiveTime, _>(index)
            .map(|time| Value::String(time.to_string())),
        "JSON" => row.try_get_unchecked::<Value, _>(index),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(|bytes| value::binary(&bytes)),
        // DECIMAL arrives as text, as do CHAR/VARCHAR/TEXT/ENUM/SET.
        _ => row.try_get_unchecked::<String, _>(index).map(Value::String),
    };

    decoded
        .or_else(|_| {
            row.try_get_unchecked::<Vec<u8>, _>(index)
                .map(|bytes| value::binary(&bytes))
        })
        .unwrap_or(Value::Null)
}

//! PostgreSQL row to JSON conversion.
//!
//! Values arrive in the binary wire format. Well-known types decode through
//! sqlx; NUMERIC is rendered as a decimal string without a decimal crate, and
//! anything unrecognised falls back to its text form or a hex string.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::{PgRow, PgValueRef};
use sqlx::{Column, Decode, Postgres, Row, TypeInfo, ValueRef};
use uuid::Uuid;

use crate::db::value;

const NUMERIC_POSITIVE: u16 = 0x0000;
const NUMERIC_NEGATIVE: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_POSITIVE_INFINITY: u16 = 0xD000;
const NUMERIC_NEGATIVE_INFINITY: u16 = 0xF000;

/// Convert a row into a JSON object keyed by column name.
pub fn row_to_json(row: &PgRow) -> Value {
    let mut object = Map::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let cell = cell_to_json(row, index, column.type_info().name());
        object.insert(column.name().to_string(), cell);
    }
    Value::Object(object)
}

fn cell_to_json(row: &PgRow, index: usize, type_name: &str) -> Value {
    let Ok(raw) = row.try_get_raw(index) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }

    let decoded = match type_name {
        "BOOL" => row.try_get::<bool, _>(index).map(Value::Bool),
        "INT2" => row.try_get::<i16, _>(index).map(Value::from),
        "INT4" => row.try_get::<i32, _>(index).map(Value::from),
        "INT8" => row.try_get::<i64, _>(index).map(Value::from),
        "OID" => row
            .try_get::<sqlx::postgres::types::Oid, _>(index)
            .map(|oid| Value::from(oid.0)),
        "FLOAT4" => row
            .try_get::<f32, _>(index)
            .map(|v| value::float(f64::from(v))),
        "FLOAT8" => row.try_get::<f64, _>(index).map(value::float),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<String, _>(index).map(Value::String)
        }
        "JSON" | "JSONB" => row.try_get::<Value, _>(index),
        "BYTEA" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|bytes| value::binary(&bytes)),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(index)
            .map(|ts| Value::String(ts.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(index)
            .map(|ts| Value::String(ts.to_rfc3339())),
        "DATE" => row
            .try_get::<NaiveDate, _>(index)
            .map(|date| Value::String(date.to_string())),
        "TIME" => row
            .try_get::<NaiveTime, _>(index)
            .map(|time| Value::String(time.to_string())),
        "UUID" => row
            .try_get::<Uuid, _>(index)
            .map(|uuid| Value::String(uuid.to_string())),
        "NUMERIC" => {
            return raw_bytes(raw)
                .and_then(numeric_string)
                .map_or(Value::Null, Value::String);
        }
        _ => return fallback(raw),
    };

    decoded.unwrap_or(Value::Null)
}

fn raw_bytes<'r>(raw: PgValueRef<'r>) -> Option<&'r [u8]> {
    <&'r [u8] as Decode<'r, Postgres>>::decode(raw).ok()
}

/// Text-like values keep their text, everything else becomes hex.
fn fallback(raw: PgValueRef<'_>) -> Value {
    match raw_bytes(raw) {
        Some(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) if !text.chars().any(char::is_control) => Value::String(text.to_string()),
            _ => value::binary(bytes),
        },
        None => Value::Null,
    }
}

/// Render a binary NUMERIC (base-10000 digit groups) as a decimal string.
fn numeric_string(bytes: &[u8]) -> Option<String> {
    let word = |offset: usize| -> Option<u16> {
        let pair = bytes.get(offset..offset + 2)?;
        Some(u16::from_be_bytes([pair[0], pair[1]]))
    };

    let ndigits = usize::from(word(0)?);
    let weight = word(2)? as i16 as i32;
    let sign = word(4)?;
    let scale = usize::from(word(6)?);

    let negative = match sign {
        NUMERIC_POSITIVE => false,
        NUMERIC_NEGATIVE => true,
        NUMERIC_NAN => return Some("NaN".to_string()),
        NUMERIC_POSITIVE_INFINITY => return Some("Infinity".to_string()),
        NUMERIC_NEGATIVE_INFINITY => return Some("-Infinity".to_string()),
        _ => return None,
    };

    let digits = (0..ndigits)
        .map(|i| word(8 + i * 2))
        .collect::<Option<Vec<u16>>>()?;
    let group = |position: i32| -> u16 {
        usize::try_from(position)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if negative {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&group(0).to_string());
        for position in 1..=weight {
            out.push_str(&format!("{:04}", group(position)));
        }
    }

    if scale > 0 {
        let mut fraction = String::with_capacity(scale + 4);
        let mut position = weight + 1;
        while fraction.len() < scale {
            fraction.push_str(&format!("{:04}", group(position)));
            position += 1;
        }
        fraction.truncate(scale);
        out.push('.');
        out.push_str(&fraction);
    }

    Some(out)
}

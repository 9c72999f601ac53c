//! Output formatting for query results.
//!
//! Supports two output formats: JSON (pretty-printed) and toon.

use clap::ValueEnum;
use serde_json::Value;

use crate::db::{DispatchError, Records};

/// Output format for query results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON format, indented with two spaces
    #[default]
    Json,
    /// Token-efficient toon format
    Toon,
}

impl OutputFormat {
    /// Render a record list in this format.
    pub fn format(self, records: &Records) -> String {
        match self {
            OutputFormat::Json => serde_json::to_string_pretty(records).unwrap_or_default(),
            OutputFormat::Toon => {
                let json_value = Value::Array(records.clone());
                toon::encode(&json_value, None)
            }
        }
    }
}

/// Two-line diagnostic shown when a dispatch fails.
///
/// The suggestion names whatever precedes the first `:` of the URI, case kept,
/// so even an unparseable URI gets a hint.
pub fn format_error(uri: &str, err: &DispatchError) -> String {
    let scheme = uri.split(':').next().unwrap_or_default();
    format!("DATABASE_ERROR: {err}\nSUGGESTION: Check if your {scheme} syntax is correct.")
}

//! Redis command-line interpreter.
//!
//! Turns a textual command line (`SET key "value with spaces"`) into a typed
//! [`Command`], runs it against a [`KeyValueClient`] and normalizes each reply
//! shape into a sequence of JSON records.

use serde_json::{Map, Value, json};
use thiserror::Error;

use super::native::KeyValueClient;
use crate::db::{NativeError, Records};

/// Argument errors, worded the way the Redis server words them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("wrong number of arguments for '{0}' command")]
    Arity(String),

    #[error("value is not an integer or out of range")]
    NotAnInteger,
}

/// Split a command line into tokens.
///
/// Whitespace separates tokens. Text between a matching pair of `'` or `"` is
/// one token, kept verbatim without the quotes. A quote opens even in the middle
/// of a token, and an unterminated quote still yields the partial token.
pub fn parse_command(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        match quote {
            Some(open) if ch == open => {
                quote = None;
                tokens.push(std::mem::take(&mut current));
            }
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(ch),
        }
    }

    if !current.is_empty() || quote.is_some() {
        tokens.push(current);
    }

    tokens
}

/// A parsed Redis command. Arguments beyond the ones a command uses are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get { key: String },
    Set { key: String, value: String },
    HGetAll { key: String },
    HMGet { key: String, fields: Vec<String> },
    LRange { key: String, start: isize, stop: isize },
    Keys { pattern: String },
    Exists { key: String },
    Del { key: String },
    FlushDb,
    /// Any other command, sent as-is with its name upper-cased.
    Raw(Vec<String>),
}

impl Command {
    /// Build a command from tokens produced by [`parse_command`].
    ///
    /// Returns `Ok(None)` for an empty token list.
    pub fn from_tokens(tokens: Vec<String>) -> Result<Option<Self>, ArgumentError> {
        let mut tokens = tokens.into_iter();
        let Some(name) = tokens.next() else {
            return Ok(None);
        };
        let name = name.to_uppercase();
        let args: Vec<String> = tokens.collect();

        let arg = |index: usize| -> Result<String, ArgumentError> {
            args.get(index)
                .cloned()
                .ok_or_else(|| ArgumentError::Arity(name.to_lowercase()))
        };

        let command = match name.as_str() {
            "GET" => Command::Get { key: arg(0)? },
            "SET" => Command::Set {
                key: arg(0)?,
                value: arg(1)?,
            },
            "HGETALL" => Command::HGetAll { key: arg(0)? },
            "HMGET" => {
                let key = arg(0)?;
                let fields = args[1..].to_vec();
                if fields.is_empty() {
                    return Err(ArgumentError::Arity(name.to_lowercase()));
                }
                Command::HMGet { key, fields }
            }
            "LRANGE" => Command::LRange {
                key: arg(0)?,
                start: parse_index(&arg(1)?)?,
                stop: parse_index(&arg(2)?)?,
            },
            "KEYS" => Command::Keys { pattern: arg(0)? },
            "EXISTS" => Command::Exists { key: arg(0)? },
            "DEL" => Command::Del { key: arg(0)? },
            "FLUSHDB" => Command::FlushDb,
            _ => {
                let mut raw = Vec::with_capacity(args.len() + 1);
                raw.push(name);
                raw.extend(args);
                Command::Raw(raw)
            }
        };

        Ok(Some(command))
    }

    /// Run the command and normalize the reply.
    pub async fn run(self, client: &mut dyn KeyValueClient) -> Result<Records, NativeError> {
        let records = match self {
            Command::Get { key } => {
                let value = match client.get(&key).await? {
                    Some(raw) => {
                        serde_json::from_str(&raw).unwrap_or_else(|_| Value::String(raw))
                    }
                    None => Value::Null,
                };
                vec![value]
            }
            Command::Set { key, value } => {
                let status = client.set(&key, &value).await?;
                vec![json!({ "status": status })]
            }
            Command::HGetAll { key } => {
                let fields: Map<String, Value> = client
                    .hgetall(&key)
                    .await?
                    .into_iter()
                    .map(|(field, value)| (field, Value::String(value)))
                    .collect();
                vec![Value::Object(fields)]
            }
            Command::HMGet { key, fields } => {
                let values = client.hmget(&key, &fields).await?;
                vec![json!(values)]
            }
            Command::LRange { key, start, stop } => client
                .lrange(&key, start, stop)
                .await?
                .into_iter()
                .map(Value::String)
                .collect(),
            Command::Keys { pattern } => client
                .keys(&pattern)
                .await?
                .into_iter()
                .map(|key| json!({ "key": key }))
                .collect(),
            Command::Exists { key } => {
                let count = client.exists(&key).await?;
                vec![json!({ "exists": count })]
            }
            Command::Del { key } => {
                let count = client.del(&key).await?;
                vec![json!({ "deleted": count })]
            }
            Command::FlushDb => {
                let status = client.flushdb().await?;
                vec![json!({ "flushed": status })]
            }
            Command::Raw(args) => into_records(client.send_command(&args).await?),
        };

        Ok(records)
    }
}

fn parse_index(token: &str) -> Result<isize, ArgumentError> {
    token.parse().map_err(|_| ArgumentError::NotAnInteger)
}

/// Arrays pass through as the record sequence; anything else becomes `[value]`.
pub fn into_records(value: Value) -> Records {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

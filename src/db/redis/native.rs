//! Native Redis client seam and its `redis` crate implementation.

use std::collections::BTreeMap;

use ::redis::aio::MultiplexedConnection;
use ::redis::{Client, FromRedisValue, Value as Reply};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::db::{NativeError, value};

/// The Redis calls the command interpreter needs.
#[async_trait]
pub trait KeyValueClient: Send {
    async fn get(&mut self, key: &str) -> Result<Option<String>, NativeError>;
    async fn set(&mut self, key: &str, value: &str) -> Result<String, NativeError>;
    async fn hgetall(&mut self, key: &str) -> Result<BTreeMap<String, String>, NativeError>;
    async fn hmget(
        &mut self,
        key: &str,
        fields: &[String],
    ) -> Result<Vec<Option<String>>, NativeError>;
    async fn lrange(
        &mut self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, NativeError>;
    async fn keys(&mut self, pattern: &str) -> Result<Vec<String>, NativeError>;
    async fn exists(&mut self, key: &str) -> Result<i64, NativeError>;
    async fn del(&mut self, key: &str) -> Result<i64, NativeError>;
    async fn flushdb(&mut self) -> Result<String, NativeError>;

    /// Send an arbitrary command (`args[0]` is the command name) and return the
    /// reply as JSON.
    async fn send_command(&mut self, args: &[String]) -> Result<Value, NativeError>;

    /// Gracefully close the connection (QUIT).
    async fn quit(self: Box<Self>) -> Result<(), NativeError>;
}

/// Opens a [`KeyValueClient`] for a `redis://` or `rediss://` URI.
#[async_trait]
pub trait KeyValueConnector: Send + Sync {
    async fn connect(&self, uri: &str) -> Result<Box<dyn KeyValueClient>, NativeError>;
}

/// Connector backed by the `redis` crate's multiplexed tokio connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

#[async_trait]
impl KeyValueConnector for RedisConnector {
    async fn connect(&self, uri: &str) -> Result<Box<dyn KeyValueClient>, NativeError> {
        let client = Client::open(uri)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Box::new(RedisClient { connection }))
    }
}

struct RedisClient {
    connection: MultiplexedConnection,
}

// Replies are read as raw bytes and decoded lossily so that binary values
// never fail a command.

fn lossy_hash(reply: Reply) -> Result<BTreeMap<String, String>, NativeError> {
    let fields = BTreeMap::<Vec<u8>, Vec<u8>>::from_owned_redis_value(reply)?;
    Ok(fields
        .into_iter()
        .map(|(field, value)| (value::lossy_string(&field), value::lossy_string(&value)))
        .collect())
}

fn lossy_list(reply: Reply) -> Result<Vec<String>, NativeError> {
    let items = Vec::<Vec<u8>>::from_owned_redis_value(reply)?;
    Ok(items.iter().map(|item| value::lossy_string(item)).collect())
}

fn lossy_optional_list(reply: Reply) -> Result<Vec<Option<String>>, NativeError> {
    let items = Vec::<Option<Vec<u8>>>::from_owned_redis_value(reply)?;
    Ok(items
        .iter()
        .map(|item| item.as_deref().map(value::lossy_string))
        .collect())
}

#[async_trait]
impl KeyValueClient for RedisClient {
    async fn get(&mut self, key: &str) -> Result<Option<String>, NativeError> {
        let raw: Option<Vec<u8>> = ::redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.connection)
            .await?;
        Ok(raw.as_deref().map(value::lossy_string))
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<String, NativeError> {
        let status: String = ::redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async(&mut self.connection)
            .await?;
        Ok(status)
    }

    async fn hgetall(&mut self, key: &str) -> Result<BTreeMap<String, String>, NativeError> {
        let reply: Reply = ::redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut self.connection)
            .await?;
        lossy_hash(reply)
    }

    async fn hmget(
        &mut self,
        key: &str,
        fields: &[String],
    ) -> Result<Vec<Option<String>>, NativeError> {
        let mut command = ::redis::cmd("HMGET");
        command.arg(key);
        for field in fields {
            command.arg(field);
        }
        let reply: Reply = command.query_async(&mut self.connection).await?;
        lossy_optional_list(reply)
    }

    async fn lrange(
        &mut self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, NativeError> {
        let reply: Reply = ::redis::cmd("LRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut self.connection)
            .await?;
        lossy_list(reply)
    }

    async fn keys(&mut self, pattern: &str) -> Result<Vec<String>, NativeError> {
        let reply: Reply = ::redis::cmd("KEYS")
            .arg(pattern)
            .query_async(&mut self.connection)
            .await?;
        lossy_list(reply)
    }

    async fn exists(&mut self, key: &str) -> Result<i64, NativeError> {
        let count: i64 = ::redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut self.connection)
            .await?;
        Ok(count)
    }

    async fn del(&mut self, key: &str) -> Result<i64, NativeError> {
        let count: i64 = ::redis::cmd("DEL")
            .arg(key)
            .query_async(&mut self.connection)
            .await?;
        Ok(count)
    }

    async fn flushdb(&mut self) -> Result<String, NativeError> {
        let status: String = ::redis::cmd("FLUSHDB")
            .query_async(&mut self.connection)
            .await?;
        Ok(status)
    }

    async fn send_command(&mut self, args: &[String]) -> Result<Value, NativeError> {
        let Some((name, rest)) = args.split_first() else {
            return Err("empty command".into());
        };

        let mut command = ::redis::cmd(name);
        for arg in rest {
            command.arg(arg);
        }

        let reply: Reply = command.query_async(&mut self.connection).await?;
        Ok(reply_to_json(reply))
    }

    async fn quit(mut self: Box<Self>) -> Result<(), NativeError> {
        let _: Reply = ::redis::cmd("QUIT")
            .query_async(&mut self.connection)
            .await?;
        Ok(())
    }
}

/// Convert a RESP2/RESP3 reply into JSON.
pub fn reply_to_json(reply: Reply) -> Value {
    match reply {
        Reply::Nil => Value::Null,
        Reply::Int(n) => Value::from(n),
        Reply::BulkString(bytes) => value::lossy_text(&bytes),
        Reply::SimpleString(text) => Value::String(text),
        Reply::Okay => Value::String("OK".to_string()),
        Reply::Array(items) | Reply::Set(items) => {
            Value::Array(items.into_iter().map(reply_to_json).collect())
        }
        Reply::Map(pairs) => Value::Object(pairs_to_object(pairs)),
        Reply::Attribute { data, .. } => reply_to_json(*data),
        Reply::Double(n) => value::float(n),
        Reply::Boolean(b) => Value::Bool(b),
        Reply::VerbatimString { text, .. } => Value::String(text),
        Reply::Push { data, .. } => {
            Value::Array(data.into_iter().map(reply_to_json).collect())
        }
        other => Value::String(format!("{other:?}")),
    }
}

fn pairs_to_object(pairs: Vec<(Reply, Reply)>) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| {
            let key = match reply_to_json(key) {
                Value::String(text) => text,
                other => other.to_string(),
            };
            (key, reply_to_json(value))
        })
        .collect()
}

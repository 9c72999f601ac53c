//! Protocol dispatch over heterogeneous database engines.
//!
//! This module provides the dispatch-and-normalization layer of the crate:
//! - [`Registry`] maps a URI scheme to an adapter factory, validates the request
//!   and drives the connect → execute → close lifecycle
//! - [`Adapter`] is the capability contract every engine implements
//! - one adapter per engine family (pooled Postgres, single-connection MySQL,
//!   MongoDB, SQLite, Redis)
//!
//! # Architecture
//!
//! Each adapter talks to its engine through a small native trait (a pool factory,
//! a connector, a callback-style file database). The real implementations wrap
//! `sqlx`, `mongodb`, `rusqlite` and `redis`; tests swap them for recording stubs
//! through [`Drivers`].
//!
//! # Result shape
//!
//! Every adapter returns [`Records`]: an ordered list of JSON values. Relational and
//! document engines yield one JSON object per row/document. The Redis interpreter
//! sometimes wraps a scalar, an array or a status object in a one-element list so
//! that callers always receive a sequence.

mod backend;
mod connection;
mod mongodb;
mod mysql;
mod postgres;
mod redis;
mod registry;
mod sqlite;
mod value;

pub use backend::{Adapter, DEFAULT_LIMIT, QueryOptions};
pub use connection::Session;
pub use self::mongodb::{DocumentClient, DocumentConnector, MongoAdapter, MongoConnector};
pub use mysql::{ConnectionFactory, MySqlAdapter, MySqlConfig, SingleConnection, SqlxMySqlFactory};
pub use postgres::{PoolFactory, PooledClient, PostgresAdapter, SqlxPgPoolFactory};
pub use self::redis::{
    ArgumentError, Command, KeyValueClient, KeyValueConnector, RedisAdapter, RedisConnector,
    parse_command,
};
pub use registry::{Drivers, Registry, extract_protocol, validate};
pub use sqlite::{Callback, FileDatabase, FileDatabaseOpener, RusqliteOpener, SqliteAdapter};

use thiserror::Error;

/// One normalized result element (a row, a document, or a wrapped scalar).
pub type Record = serde_json::Value;

/// The normalized result of a query: an ordered sequence of records.
pub type Records = Vec<Record>;

/// Error type crossing the native driver seam.
pub type NativeError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised inside an adapter.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("{operation}() is not implemented")]
    NotImplemented { operation: &'static str },

    #[error("{engine} adapter is not connected")]
    NotConnected { engine: &'static str },

    #[error("{engine} adapter is already connected")]
    AlreadyConnected { engine: &'static str },

    #[error("Failed to connect to {engine}: {message}")]
    ConnectFailed { engine: &'static str, message: String },

    #[error("Invalid MySQL URI format. Expected: user:password@host:port/database")]
    InvalidMySqlUri,

    #[error("Collection name is required for MongoDB")]
    MissingCollection,

    #[error("Invalid JSON filter: {message}")]
    InvalidFilter { message: String },

    #[error("[Postgres Execute Error]: {0}")]
    Postgres(String),

    #[error("MySQL Syntax Error: {0}")]
    MySql(String),

    #[error("MongoDB Query Error: {0}")]
    Mongo(String),

    #[error("SQLite Error: {0}")]
    Sqlite(String),

    #[error("Failed to close SQLite connection: {0}")]
    SqliteClose(String),

    #[error("Redis Command Error: {0}")]
    Redis(String),
}

/// Errors surfaced by [`Registry::run`].
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Invalid URI format. Expected 'protocol://...'")]
    InvalidUri,

    #[error("Protocol \"{protocol}\" is not supported. Supported: {}", .supported.join(", "))]
    UnsupportedProtocol {
        protocol: String,
        supported: Vec<&'static str>,
    },

    #[error("Query must be a string.")]
    InvalidQuery,

    #[error("Missing 'collection' parameter for MongoDB query.")]
    MissingCollection,

    #[error(transparent)]
    Connect(AdapterError),

    #[error("[{} Execute Error]: {source}", .protocol.to_uppercase())]
    Execute {
        protocol: String,
        source: AdapterError,
    },

    #[error(transparent)]
    Close(AdapterError),
}

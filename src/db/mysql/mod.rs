//! Single-connection relational adapter for MySQL.
//!
//! Unlike the pooled Postgres adapter, this one parses the URI itself into a
//! [`MySqlConfig`] so that SQLAlchemy-style driver hints (`mysql+pymysql://`)
//! are accepted.

mod conversion;

use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use sqlx::Connection;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use tracing::warn;
use url::Url;

use super::{Adapter, AdapterError, NativeError, QueryOptions, Records};

const ENGINE: &str = "MySQL";
const DEFAULT_PORT: u16 = 3306;

/// Connection settings parsed from a MySQL URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl MySqlConfig {
    /// Parse `mysql[+hint]://user[:password]@host[:port]/database`.
    ///
    /// Credentials are percent-decoded. A missing password becomes `""` and a
    /// missing port becomes 3306.
    pub fn from_uri(uri: &str) -> Result<Self, AdapterError> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or(AdapterError::InvalidMySqlUri)?;
        let scheme = scheme.split_once('+').map_or(scheme, |(base, _hint)| base);

        let url = Url::parse(&format!("{scheme}://{rest}"))
            .map_err(|_| AdapterError::InvalidMySqlUri)?;

        let host = url
            .host_str()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
            .filter(|host| !host.is_empty())
            .ok_or(AdapterError::InvalidMySqlUri)?;

        let password = match url.password() {
            Some(password) => decode(password)?,
            None => String::new(),
        };

        let path = url.path();
        let database = path.strip_prefix('/').unwrap_or(path);

        Ok(Self {
            host: host.to_string(),
            port: url.port().filter(|port| *port != 0).unwrap_or(DEFAULT_PORT),
            user: decode(url.username())?,
            password,
            database: database.to_string(),
        })
    }
}

fn decode(component: &str) -> Result<String, AdapterError> {
    percent_decode_str(component)
        .decode_utf8()
        .map(|text| text.into_owned())
        .map_err(|_| AdapterError::InvalidMySqlUri)
}

/// One open MySQL connection.
#[async_trait]
pub trait SingleConnection: Send {
    async fn execute(&mut self, sql: &str) -> Result<Records, NativeError>;

    async fn end(self: Box<Self>) -> Result<(), NativeError>;
}

/// Opens single connections from parsed settings.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self, config: &MySqlConfig)
    -> Result<Box<dyn SingleConnection>, NativeError>;
}

/// Connection factory backed by `sqlx::MySqlConnection`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxMySqlFactory;

#[async_trait]
impl ConnectionFactory for SqlxMySqlFactory {
    async fn connect(
        &self,
        config: &MySqlConfig,
    ) -> Result<Box<dyn SingleConnection>, NativeError> {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password);
        if !config.database.is_empty() {
            options = options.database(&config.database);
        }

        let connection = MySqlConnection::connect_with(&options).await?;
        Ok(Box::new(SqlxMySqlConnection { connection }))
    }
}

struct SqlxMySqlConnection {
    connection: MySqlConnection,
}

#[async_trait]
impl SingleConnection for SqlxMySqlConnection {
    async fn execute(&mut self, sql: &str) -> Result<Records, NativeError> {
        let rows = sqlx::query(sql).fetch_all(&mut self.connection).await?;
        Ok(rows.iter().map(conversion::row_to_json).collect())
    }

    async fn end(self: Box<Self>) -> Result<(), NativeError> {
        self.connection.close().await?;
        Ok(())
    }
}

pub struct MySqlAdapter {
    factory: Arc<dyn ConnectionFactory>,
    connection: Option<Box<dyn SingleConnection>>,
}

impl MySqlAdapter {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            factory,
            connection: None,
        }
    }
}

#[async_trait]
impl Adapter for MySqlAdapter {
    async fn connect(&mut self, uri: &str) -> Result<(), AdapterError> {
        if self.connection.is_some() {
            return Err(AdapterError::AlreadyConnected { engine: ENGINE });
        }

        let config = MySqlConfig::from_uri(uri)?;
        let connection = self
            .factory
            .connect(&config)
            .await
            .map_err(|e| AdapterError::ConnectFailed {
                engine: ENGINE,
                message: e.to_string(),
            })?;
        self.connection = Some(connection);
        Ok(())
    }

    async fn execute(
        &mut self,
        query: &str,
        _options: &QueryOptions,
    ) -> Result<Records, AdapterError> {
        let connection = self
            .connection
            .as_deref_mut()
            .ok_or(AdapterError::NotConnected { engine: ENGINE })?;

        connection
            .execute(query)
            .await
            .map_err(|e| AdapterError::MySql(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.end().await {
                warn!(error = %e, "failed to end MySQL connection");
            }
        }
        Ok(())
    }
}

//! Pooled relational adapter for PostgreSQL.
//!
//! `connect` only builds the pool; the first connection is opened lazily by the
//! first query. The URI is handed to the native client untouched, so every
//! connection-string option the driver understands is available.

mod conversion;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::{Adapter, AdapterError, NativeError, QueryOptions, Records};

const ENGINE: &str = "Postgres";

/// A connection pool as seen by the adapter.
#[async_trait]
pub trait PooledClient: Send + Sync {
    /// Run one SQL statement and return its rows.
    async fn query(&self, sql: &str) -> Result<Records, NativeError>;

    /// Close every pooled connection.
    async fn end(&self);
}

/// Builds pools from a connection URI.
pub trait PoolFactory: Send + Sync {
    fn create(&self, uri: &str) -> Result<Box<dyn PooledClient>, NativeError>;
}

/// Pool factory backed by `sqlx::PgPool`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxPgPoolFactory;

impl PoolFactory for SqlxPgPoolFactory {
    fn create(&self, uri: &str) -> Result<Box<dyn PooledClient>, NativeError> {
        let pool = PgPoolOptions::new().connect_lazy(uri)?;
        Ok(Box::new(SqlxPgPool { pool }))
    }
}

struct SqlxPgPool {
    pool: PgPool,
}

#[async_trait]
impl PooledClient for SqlxPgPool {
    async fn query(&self, sql: &str) -> Result<Records, NativeError> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(conversion::row_to_json).collect())
    }

    async fn end(&self) {
        self.pool.close().await;
    }
}

pub struct PostgresAdapter {
    factory: Arc<dyn PoolFactory>,
    pool: Option<Box<dyn PooledClient>>,
}

impl PostgresAdapter {
    pub fn new(factory: Arc<dyn PoolFactory>) -> Self {
        Self {
            factory,
            pool: None,
        }
    }
}

#[async_trait]
impl Adapter for PostgresAdapter {
    async fn connect(&mut self, uri: &str) -> Result<(), AdapterError> {
        if self.pool.is_some() {
            return Err(AdapterError::AlreadyConnected { engine: ENGINE });
        }

        let pool = self
            .factory
            .create(uri)
            .map_err(|e| AdapterError::ConnectFailed {
                engine: ENGINE,
                message: e.to_string(),
            })?;
        self.pool = Some(pool);
        Ok(())
    }

    async fn execute(
        &mut self,
        query: &str,
        _options: &QueryOptions,
    ) -> Result<Records, AdapterError> {
        let pool = self
            .pool
            .as_deref()
            .ok_or(AdapterError::NotConnected { engine: ENGINE })?;

        pool.query(query)
            .await
            .map_err(|e| AdapterError::Postgres(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        if let Some(pool) = self.pool.take() {
            pool.end().await;
        }
        Ok(())
    }
}

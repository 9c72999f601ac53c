//! Embedded-file adapter for SQLite.
//!
//! The native API is callback based: every operation takes a completion
//! callback that receives the outcome. The adapter bridges each callback into a
//! single awaited result with a oneshot channel.

mod native;

pub use native::RusqliteOpener;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{Adapter, AdapterError, NativeError, QueryOptions, Records};

const ENGINE: &str = "SQLite";

/// Completion callback handed to a [`FileDatabase`] operation.
pub type Callback<T> = Box<dyn FnOnce(Result<T, NativeError>) + Send>;

/// An open database file.
pub trait FileDatabase: Send + Sync {
    /// Run `sql` and report every result row to `done`.
    fn all(&self, sql: &str, done: Callback<Records>);

    /// Close the file and report the outcome to `done`.
    fn close(&self, done: Callback<()>);
}

/// Opens database files by path.
pub trait FileDatabaseOpener: Send + Sync {
    fn open(&self, path: &str) -> Result<Box<dyn FileDatabase>, NativeError>;
}

/// Extract the file path from a `sqlite://` URI, dropping any `?query` suffix.
fn database_path(uri: &str) -> &str {
    let path = uri.split_once("://").map_or(uri, |(_, rest)| rest);
    path.split_once('?').map_or(path, |(path, _)| path)
}

/// Wait for a callback-style operation to report its outcome.
async fn completion<T: Send + 'static>(
    start: impl FnOnce(Callback<T>),
) -> Result<T, NativeError> {
    let (tx, rx) = oneshot::channel();
    start(Box::new(move |outcome| {
        let _ = tx.send(outcome);
    }));
    rx.await
        .unwrap_or_else(|_| Err("completion callback was dropped without being called".into()))
}

pub struct SqliteAdapter {
    opener: Arc<dyn FileDatabaseOpener>,
    db: Option<Box<dyn FileDatabase>>,
}

impl SqliteAdapter {
    pub fn new(opener: Arc<dyn FileDatabaseOpener>) -> Self {
        Self { opener, db: None }
    }
}

#[async_trait]
impl Adapter for SqliteAdapter {
    async fn connect(&mut self, uri: &str) -> Result<(), AdapterError> {
        if self.db.is_some() {
            return Err(AdapterError::AlreadyConnected { engine: ENGINE });
        }

        let db = self
            .opener
            .open(database_path(uri))
            .map_err(|e| AdapterError::ConnectFailed {
                engine: ENGINE,
                message: e.to_string(),
            })?;
        self.db = Some(db);
        Ok(())
    }

    async fn execute(
        &mut self,
        query: &str,
        _options: &QueryOptions,
    ) -> Result<Records, AdapterError> {
        let db = self
            .db
            .as_deref()
            .ok_or(AdapterError::NotConnected { engine: ENGINE })?;

        completion(|done| db.all(query, done))
            .await
            .map_err(|e| AdapterError::Sqlite(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        let Some(db) = self.db.take() else {
            return Ok(());
        };

        completion(|done| db.close(done))
            .await
            .map_err(|e| AdapterError::SqliteClose(e.to_string()))
    }
}

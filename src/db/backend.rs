//! Adapter capability contract shared by every engine.
//!
//! An adapter owns exactly one native handle (pool, connection or client) for the
//! duration of a single dispatch. The registry creates a fresh adapter per call,
//! connects it, executes one query and closes it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AdapterError, Records};

/// Number of documents returned by the document engine when no limit is given.
pub const DEFAULT_LIMIT: i64 = 50;

/// Engine-specific options passed alongside a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Collection name, required by the MongoDB adapter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// Result-count bound for the MongoDB adapter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

impl QueryOptions {
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Collection name, treating an empty string as absent.
    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref().filter(|name| !name.is_empty())
    }

    /// The limit to apply: `limit` when set and non-zero, otherwise [`DEFAULT_LIMIT`].
    pub fn effective_limit(&self) -> i64 {
        match self.limit {
            Some(limit) if limit != 0 => limit,
            _ => DEFAULT_LIMIT,
        }
    }
}

/// The connect → execute → close contract implemented by every engine adapter.
///
/// The provided method bodies are the reference implementation: each one fails
/// with [`AdapterError::NotImplemented`]. Concrete adapters override all three.
///
/// `close` must be safe to call when `connect` never ran or failed; only the
/// SQLite adapter may return an error from it.
#[async_trait]
pub trait Adapter: Send {
    /// Open the native handle for `uri` and keep it as adapter state.
    async fn connect(&mut self, _uri: &str) -> Result<(), AdapterError> {
        Err(AdapterError::NotImplemented {
            operation: "connect",
        })
    }

    /// Issue exactly one logical query against the open handle.
    async fn execute(
        &mut self,
        _query: &str,
        _options: &QueryOptions,
    ) -> Result<Records, AdapterError> {
        Err(AdapterError::NotImplemented {
            operation: "execute",
        })
    }

    /// Release the native handle if one was opened.
    async fn close(&mut self) -> Result<(), AdapterError> {
        Err(AdapterError::NotImplemented { operation: "close" })
    }
}

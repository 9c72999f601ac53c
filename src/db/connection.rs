//! Scoped adapter lifecycle.
//!
//! A [`Session`] owns one adapter for the length of one dispatch and guarantees
//! the adapter is closed exactly once on every exit path: after a successful
//! execute, after a failed execute, after a failed connect, and when the dispatch
//! future is dropped before finishing.

use tracing::{debug, warn};

use super::{Adapter, AdapterError, DispatchError, QueryOptions, Records};

/// Owns an adapter between connect and close.
pub struct Session {
    protocol: String,
    adapter: Option<Box<dyn Adapter>>,
}

impl Session {
    /// Wrap a freshly created adapter. `protocol` labels execute errors.
    pub fn new(protocol: impl Into<String>, adapter: Box<dyn Adapter>) -> Self {
        Self {
            protocol: protocol.into(),
            adapter: Some(adapter),
        }
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Connect, execute one query, then close.
    ///
    /// Connect errors are returned unchanged, execute errors are wrapped with the
    /// upper-cased protocol label. A close error replaces either outcome.
    pub async fn run(
        mut self,
        uri: &str,
        query: &str,
        options: &QueryOptions,
    ) -> Result<Records, DispatchError> {
        let outcome = self.connect_and_execute(uri, query, options).await;
        let closed = self.close().await;

        match (outcome, closed) {
            (outcome, Ok(())) => outcome,
            (Ok(_), Err(err)) => Err(DispatchError::Close(err)),
            (Err(original), Err(err)) => {
                warn!(
                    protocol = %self.protocol,
                    error = %original,
                    "close failure replaces the dispatch error"
                );
                Err(DispatchError::Close(err))
            }
        }
    }

    async fn connect_and_execute(
        &mut self,
        uri: &str,
        query: &str,
        options: &QueryOptions,
    ) -> Result<Records, DispatchError> {
        let protocol = self.protocol.clone();
        let Some(adapter) = self.adapter.as_deref_mut() else {
            return Err(DispatchError::Connect(AdapterError::NotConnected {
                engine: "session",
            }));
        };

        debug!(%protocol, "connecting");
        adapter.connect(uri).await.map_err(DispatchError::Connect)?;

        debug!(%protocol, "executing");
        let records = adapter
            .execute(query, options)
            .await
            .map_err(|source| DispatchError::Execute {
                protocol: protocol.clone(),
                source,
            })?;

        debug!(%protocol, rows = records.len(), "query finished");
        Ok(records)
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        match self.adapter.take() {
            Some(mut adapter) => {
                debug!(protocol = %self.protocol, "closing");
                adapter.close().await
            }
            None => Ok(()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let Some(mut adapter) = self.adapter.take() else {
            return;
        };

        let protocol = std::mem::take(&mut self.protocol);
        warn!(%protocol, "session dropped before close, releasing in the background");

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = adapter.close().await {
                        warn!(%protocol, error = %err, "background close failed");
                    }
                });
            }
            Err(_) => {
                warn!(%protocol, "no async runtime available, native handle dropped without close");
            }
        }
    }
}

//! Key-value adapter for Redis.

mod command;
mod native;

pub use command::{ArgumentError, Command, parse_command};
pub use native::{KeyValueClient, KeyValueConnector, RedisConnector};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{Adapter, AdapterError, QueryOptions, Records};

const ENGINE: &str = "Redis";

/// Prefix a bare `host:port` with `redis://`; `redis://` and `rediss://` URIs pass unchanged.
fn normalize_uri(uri: &str) -> String {
    let lower = uri.to_ascii_lowercase();
    if lower.starts_with("redis://") || lower.starts_with("rediss://") {
        uri.to_string()
    } else {
        format!("redis://{uri}")
    }
}

/// Interprets one command line per dispatch.
pub struct RedisAdapter {
    connector: Arc<dyn KeyValueConnector>,
    client: Option<Box<dyn KeyValueClient>>,
}

impl RedisAdapter {
    pub fn new(connector: Arc<dyn KeyValueConnector>) -> Self {
        Self {
            connector,
            client: None,
        }
    }
}

#[async_trait]
impl Adapter for RedisAdapter {
    async fn connect(&mut self, uri: &str) -> Result<(), AdapterError> {
        if self.client.is_some() {
            return Err(AdapterError::AlreadyConnected { engine: ENGINE });
        }

        let client = self
            .connector
            .connect(&normalize_uri(uri))
            .await
            .map_err(|e| AdapterError::ConnectFailed {
                engine: ENGINE,
                message: e.to_string(),
            })?;
        self.client = Some(client);
        Ok(())
    }

    async fn execute(
        &mut self,
        query: &str,
        _options: &QueryOptions,
    ) -> Result<Records, AdapterError> {
        let command = match Command::from_tokens(parse_command(query)) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(Vec::new()),
            Err(e) => return Err(AdapterError::Redis(e.to_string())),
        };

        let client = self
            .client
            .as_deref_mut()
            .ok_or(AdapterError::NotConnected { engine: ENGINE })?;

        command
            .run(client)
            .await
            .map_err(|e| AdapterError::Redis(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.quit().await {
                warn!(error = %e, "redis QUIT failed");
            }
        }
        Ok(())
    }
}

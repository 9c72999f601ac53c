//! Document-store adapter for MongoDB.
//!
//! The query is a JSON filter document (extended JSON is accepted, so
//! `{"_id": {"$oid": "..."}}` works). Results are rendered as relaxed extended
//! JSON.

use std::sync::Arc;

use ::mongodb::bson::{Bson, Document, doc};
use ::mongodb::{Client, Database};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::Value;

use super::{Adapter, AdapterError, NativeError, QueryOptions, Records};

const ENGINE: &str = "MongoDB";

/// Database used when the URI names none, matching the driver's own default.
const FALLBACK_DATABASE: &str = "test";

/// A connected client bound to its default database.
#[async_trait]
pub trait DocumentClient: Send + Sync {
    /// Find at most `limit` documents in `collection` matching `filter`.
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        limit: i64,
    ) -> Result<Records, NativeError>;

    async fn close(self: Box<Self>);
}

/// Connects document clients from a `mongodb://` URI.
#[async_trait]
pub trait DocumentConnector: Send + Sync {
    async fn connect(&self, uri: &str) -> Result<Box<dyn DocumentClient>, NativeError>;
}

/// Connector backed by the official `mongodb` driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoConnector;

#[async_trait]
impl DocumentConnector for MongoConnector {
    async fn connect(&self, uri: &str) -> Result<Box<dyn DocumentClient>, NativeError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client
            .default_database()
            .unwrap_or_else(|| client.database(FALLBACK_DATABASE));

        // The driver connects lazily; ping so connection errors surface here.
        db.run_command(doc! { "ping": 1 }).await?;

        Ok(Box::new(MongoClient { client, db }))
    }
}

struct MongoClient {
    client: Client,
    db: Database,
}

#[async_trait]
impl DocumentClient for MongoClient {
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        limit: i64,
    ) -> Result<Records, NativeError> {
        let cursor = self
            .db
            .collection::<Document>(collection)
            .find(filter)
            .limit(limit)
            .await?;
        let documents: Vec<Document> = cursor.try_collect().await?;

        Ok(documents
            .into_iter()
            .map(|document| Bson::Document(document).into_relaxed_extjson())
            .collect())
    }

    async fn close(self: Box<Self>) {
        self.client.shutdown().await;
    }
}

/// Parse a JSON filter string into a BSON document.
fn parse_filter(query: &str) -> Result<Document, AdapterError> {
    let invalid = |message: String| AdapterError::InvalidFilter { message };

    let json: Value = serde_json::from_str(query).map_err(|e| invalid(e.to_string()))?;
    if !json.is_object() {
        return Err(invalid("filter must be a JSON object".to_string()));
    }

    match Bson::try_from(json).map_err(|e| invalid(e.to_string()))? {
        Bson::Document(document) => Ok(document),
        _ => Err(invalid("filter must be a JSON object".to_string())),
    }
}

pub struct MongoAdapter {
    connector: Arc<dyn DocumentConnector>,
    client: Option<Box<dyn DocumentClient>>,
}

impl MongoAdapter {
    pub fn new(connector: Arc<dyn DocumentConnector>) -> Self {
        Self {
            connector,
            client: None,
        }
    }
}

#[async_trait]
impl Adapter for MongoAdapter {
    async fn connect(&mut self, uri: &str) -> Result<(), AdapterError> {
        if self.client.is_some() {
            return Err(AdapterError::AlreadyConnected { engine: ENGINE });
        }

        let client = self
            .connector
            .connect(uri)
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
        options: &QueryOptions,
    ) -> Result<Records, AdapterError> {
        let collection = options.collection().ok_or(AdapterError::MissingCollection)?;
        let filter = parse_filter(query)?;

        let client = self
            .client
            .as_deref()
            .ok_or(AdapterError::NotConnected { engine: ENGINE })?;

        client
            .find(collection, filter, options.effective_limit())
            .await
            .map_err(|e| AdapterError::Mongo(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        if let Some(client) = self.client.take() {
            client.close().await;
        }
        Ok(())
    }
}

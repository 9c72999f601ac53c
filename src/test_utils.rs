//! Shared test utilities: recording stubs for every native driver seam.
//!
//! Each stub appends a line to a shared [`CallLog`] for every native call so
//! tests can assert call order and close counts. Default replies mirror what a
//! healthy server would send for a trivial `users` table.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::db::{
    Adapter, AdapterError, Callback, ConnectionFactory, DocumentClient, DocumentConnector, Drivers,
    FileDatabase, FileDatabaseOpener, KeyValueClient, KeyValueConnector, MySqlConfig, NativeError,
    PoolFactory, PooledClient, QueryOptions, Records, SingleConnection,
};
use ::mongodb::bson::{Bson, Document};

/// Ordered record of native calls, shared between a test and its stubs.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, call: impl Into<String>) {
        self.0.lock().expect("call log poisoned").push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().expect("call log poisoned").clone()
    }

    /// Number of recorded calls starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

fn user_rows() -> Records {
    vec![json!({"id": 1, "name": "Test"})]
}

// =============================================================================
// Scripted adapter (for Session tests)
// =============================================================================

/// An [`Adapter`] whose outcomes are scripted up front.
pub struct ScriptedAdapter {
    log: CallLog,
    records: Records,
    fail_connect: bool,
    fail_execute: Option<String>,
    fail_close: Option<String>,
}

impl ScriptedAdapter {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            records: Vec::new(),
            fail_connect: false,
            fail_execute: None,
            fail_close: None,
        }
    }

    pub fn returning(mut self, records: Records) -> Self {
        self.records = records;
        self
    }

    /// `connect` fails with [`AdapterError::InvalidMySqlUri`].
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// `execute` fails with [`AdapterError::MySql`].
    pub fn failing_execute(mut self, message: &str) -> Self {
        self.fail_execute = Some(message.to_string());
        self
    }

    /// `close` fails with [`AdapterError::SqliteClose`].
    pub fn failing_close(mut self, message: &str) -> Self {
        self.fail_close = Some(message.to_string());
        self
    }
}

#[async_trait]
impl Adapter for ScriptedAdapter {
    async fn connect(&mut self, uri: &str) -> Result<(), AdapterError> {
        self.log.record(format!("connect {uri}"));
        if self.fail_connect {
            return Err(AdapterError::InvalidMySqlUri);
        }
        Ok(())
    }

    async fn execute(
        &mut self,
        query: &str,
        _options: &QueryOptions,
    ) -> Result<Records, AdapterError> {
        self.log.record(format!("execute {query}"));
        match &self.fail_execute {
            Some(message) => Err(AdapterError::MySql(message.clone())),
            None => Ok(self.records.clone()),
        }
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        self.log.record("close");
        match &self.fail_close {
            Some(message) => Err(AdapterError::SqliteClose(message.clone())),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Postgres
// =============================================================================

#[derive(Clone)]
pub struct StubPoolFactory {
    log: CallLog,
    fail_create: bool,
    fail_queries: bool,
}

impl StubPoolFactory {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail_create: false,
            fail_queries: false,
        }
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_queries = true;
        self
    }
}

impl PoolFactory for StubPoolFactory {
    fn create(&self, uri: &str) -> Result<Box<dyn PooledClient>, NativeError> {
        self.log.record(format!("pg.create {uri}"));
        if self.fail_create {
            return Err("invalid connection string".into());
        }
        Ok(Box::new(StubPool {
            log: self.log.clone(),
            fail: self.fail_queries,
        }))
    }
}

struct StubPool {
    log: CallLog,
    fail: bool,
}

#[async_trait]
impl PooledClient for StubPool {
    async fn query(&self, sql: &str) -> Result<Records, NativeError> {
        self.log.record(format!("pg.query {sql}"));
        if self.fail {
            return Err("relation \"nonexistent_table\" does not exist".into());
        }
        Ok(user_rows())
    }

    async fn end(&self) {
        self.log.record("pg.end");
    }
}

// =============================================================================
// MySQL
// =============================================================================

#[derive(Clone)]
pub struct StubMySqlFactory {
    log: CallLog,
    fail_connect: bool,
    fail_queries: bool,
}

impl StubMySqlFactory {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail_connect: false,
            fail_queries: false,
        }
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_queries = true;
        self
    }
}

#[async_trait]
impl ConnectionFactory for StubMySqlFactory {
    async fn connect(
        &self,
        config: &MySqlConfig,
    ) -> Result<Box<dyn SingleConnection>, NativeError> {
        self.log.record(format!(
            "mysql.connect {}@{}:{}/{}",
            config.user, config.host, config.port, config.database
        ));
        if self.fail_connect {
            return Err(
                format!("Access denied for user '{}'@'{}'", config.user, config.host).into(),
            );
        }
        Ok(Box::new(StubMySqlConnection {
            log: self.log.clone(),
            fail: self.fail_queries,
        }))
    }
}

struct StubMySqlConnection {
    log: CallLog,
    fail: bool,
}

#[async_trait]
impl SingleConnection for StubMySqlConnection {
    async fn execute(&mut self, sql: &str) -> Result<Records, NativeError> {
        self.log.record(format!("mysql.execute {sql}"));
        if self.fail {
            return Err("Unknown table 'nonexistent_table'".into());
        }
        Ok(user_rows())
    }

    async fn end(self: Box<Self>) -> Result<(), NativeError> {
        self.log.record("mysql.end");
        Ok(())
    }
}

// =============================================================================
// MongoDB
// =============================================================================

#[derive(Clone)]
pub struct StubMongoConnector {
    log: CallLog,
    fail_connect: bool,
    fail_queries: bool,
}

impl StubMongoConnector {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail_connect: false,
            fail_queries: false,
        }
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_queries = true;
        self
    }
}

#[async_trait]
impl DocumentConnector for StubMongoConnector {
    async fn connect(&self, uri: &str) -> Result<Box<dyn DocumentClient>, NativeError> {
        self.log.record(format!("mongo.connect {uri}"));
        if self.fail_connect {
            return Err("server selection timeout".into());
        }
        Ok(Box::new(StubMongoClient {
            log: self.log.clone(),
            fail: self.fail_queries,
        }))
    }
}

struct StubMongoClient {
    log: CallLog,
    fail: bool,
}

#[async_trait]
impl DocumentClient for StubMongoClient {
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        limit: i64,
    ) -> Result<Records, NativeError> {
        let filter = Bson::Document(filter).into_relaxed_extjson();
        self.log
            .record(format!("mongo.find {collection} {filter} limit {limit}"));
        if self.fail {
            return Err("connection pool cleared".into());
        }
        Ok(vec![json!({"_id": "1", "name": "Test"})])
    }

    async fn close(self: Box<Self>) {
        self.log.record("mongo.close");
    }
}

// =============================================================================
// SQLite
// =============================================================================

#[derive(Clone)]
pub struct StubSqliteOpener {
    log: CallLog,
    fail_open: bool,
    fail_queries: bool,
    fail_close: bool,
    silent: bool,
}

impl StubSqliteOpener {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail_open: false,
            fail_queries: false,
            fail_close: false,
            silent: false,
        }
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// `all` drops its callback without calling it.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

impl FileDatabaseOpener for StubSqliteOpener {
    fn open(&self, path: &str) -> Result<Box<dyn FileDatabase>, NativeError> {
        self.log.record(format!("sqlite.open {path}"));
        if self.fail_open {
            return Err("unable to open database file".into());
        }
        Ok(Box::new(StubSqliteDatabase {
            options: self.clone(),
        }))
    }
}

struct StubSqliteDatabase {
    options: StubSqliteOpener,
}

impl FileDatabase for StubSqliteDatabase {
    fn all(&self, sql: &str, done: Callback<Records>) {
        self.options.log.record(format!("sqlite.all {sql}"));
        if self.options.silent {
            return;
        }
        if self.options.fail_queries {
            done(Err("no such table: nonexistent_table".into()));
        } else {
            done(Ok(user_rows()));
        }
    }

    fn close(&self, done: Callback<()>) {
        self.options.log.record("sqlite.close");
        if self.options.fail_close {
            done(Err("database is locked".into()));
        } else {
            done(Ok(()));
        }
    }
}

// =============================================================================
// Redis
// =============================================================================

#[derive(Clone)]
pub struct StubRedisConnector {
    log: CallLog,
    fail_connect: bool,
    fail_commands: bool,
}

impl StubRedisConnector {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail_connect: false,
            fail_commands: false,
        }
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Every command, QUIT included, fails with "Connection refused".
    pub fn failing(mut self) -> Self {
        self.fail_commands = true;
        self
    }
}

#[async_trait]
impl KeyValueConnector for StubRedisConnector {
    async fn connect(&self, uri: &str) -> Result<Box<dyn KeyValueClient>, NativeError> {
        self.log.record(format!("redis.connect {uri}"));
        if self.fail_connect {
            return Err("Connection refused".into());
        }
        let client = StubRedisClient::new(&self.log);
        Ok(Box::new(if self.fail_commands {
            client.failing()
        } else {
            client
        }))
    }
}

/// Redis client stub with the replies a small test dataset would produce.
pub struct StubRedisClient {
    log: CallLog,
    fail: bool,
    get_reply: Option<String>,
    raw_reply: Value,
}

impl StubRedisClient {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail: false,
            get_reply: Some("test_value".to_string()),
            raw_reply: json!("custom_result"),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn with_get_reply(mut self, reply: Option<&str>) -> Self {
        self.get_reply = reply.map(str::to_string);
        self
    }

    pub fn with_raw_reply(mut self, reply: Value) -> Self {
        self.raw_reply = reply;
        self
    }

    fn call(&self, call: String) -> Result<(), NativeError> {
        self.log.record(call);
        if self.fail {
            return Err("Connection refused".into());
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueClient for StubRedisClient {
    async fn get(&mut self, key: &str) -> Result<Option<String>, NativeError> {
        self.call(format!("redis.get {key}"))?;
        Ok(self.get_reply.clone())
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<String, NativeError> {
        self.call(format!("redis.set {key} {value}"))?;
        Ok("OK".to_string())
    }

    async fn hgetall(&mut self, key: &str) -> Result<BTreeMap<String, String>, NativeError> {
        self.call(format!("redis.hgetall {key}"))?;
        Ok(BTreeMap::from([
            ("field1".to_string(), "value1".to_string()),
            ("field2".to_string(), "value2".to_string()),
        ]))
    }

    async fn hmget(
        &mut self,
        key: &str,
        fields: &[String],
    ) -> Result<Vec<Option<String>>, NativeError> {
        self.call(format!("redis.hmget {key} {}", fields.join(" ")))?;
        Ok(vec![Some("value1".to_string()), Some("value2".to_string())])
    }

    async fn lrange(
        &mut self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, NativeError> {
        self.call(format!("redis.lrange {key} {start} {stop}"))?;
        Ok(vec!["item1".to_string(), "item2".to_string()])
    }

    async fn keys(&mut self, pattern: &str) -> Result<Vec<String>, NativeError> {
        self.call(format!("redis.keys {pattern}"))?;
        Ok(vec!["key1".to_string(), "key2".to_string()])
    }

    async fn exists(&mut self, key: &str) -> Result<i64, NativeError> {
        self.call(format!("redis.exists {key}"))?;
        Ok(1)
    }

    async fn del(&mut self, key: &str) -> Result<i64, NativeError> {
        self.call(format!("redis.del {key}"))?;
        Ok(1)
    }

    async fn flushdb(&mut self) -> Result<String, NativeError> {
        self.call("redis.flushdb".to_string())?;
        Ok("OK".to_string())
    }

    async fn send_command(&mut self, args: &[String]) -> Result<Value, NativeError> {
        self.call(format!("redis.send_command {}", args.join(" ")))?;
        Ok(self.raw_reply.clone())
    }

    async fn quit(self: Box<Self>) -> Result<(), NativeError> {
        self.call("redis.quit".to_string())
    }
}

// =============================================================================
// Driver bundle
// =============================================================================

/// Builds a [`Drivers`] bundle of stubs sharing one [`CallLog`].
pub struct StubDrivers {
    log: CallLog,
    fail_queries: bool,
}

impl StubDrivers {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail_queries: false,
        }
    }

    /// Every engine's query path fails; connects still succeed.
    pub fn failing_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    pub fn build(self) -> Drivers {
        let mut postgres = StubPoolFactory::new(&self.log);
        let mut mysql = StubMySqlFactory::new(&self.log);
        let mut mongodb = StubMongoConnector::new(&self.log);
        let mut sqlite = StubSqliteOpener::new(&self.log);
        let mut redis = StubRedisConnector::new(&self.log);

        if self.fail_queries {
            postgres = postgres.failing();
            mysql = mysql.failing();
            mongodb = mongodb.failing();
            sqlite = sqlite.failing();
            redis = redis.failing();
        }

        Drivers {
            postgres: Arc::new(postgres),
            mysql: Arc::new(mysql),
            mongodb: Arc::new(mongodb),
            sqlite: Arc::new(sqlite),
            redis: Arc::new(redis),
        }
    }
}

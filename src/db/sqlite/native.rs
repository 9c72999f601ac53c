//! `rusqlite` implementation of the callback-style file database.
//!
//! Work runs on the tokio blocking pool when a runtime is available and inline
//! otherwise; the callback fires once the statement has finished.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde_json::{Map, Value};

use super::{Callback, FileDatabase, FileDatabaseOpener};
use crate::db::{NativeError, Records, value};

#[derive(Debug, Clone, Copy, Default)]
pub struct RusqliteOpener;

impl FileDatabaseOpener for RusqliteOpener {
    fn open(&self, path: &str) -> Result<Box<dyn FileDatabase>, NativeError> {
        let connection = Connection::open(path)?;
        Ok(Box::new(RusqliteDatabase {
            connection: Arc::new(Mutex::new(Some(connection))),
        }))
    }
}

struct RusqliteDatabase {
    connection: Arc<Mutex<Option<Connection>>>,
}

fn run_blocking(job: impl FnOnce() + Send + 'static) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(job);
        }
        Err(_) => job(),
    }
}

impl FileDatabase for RusqliteDatabase {
    fn all(&self, sql: &str, done: Callback<Records>) {
        let connection = Arc::clone(&self.connection);
        let sql = sql.to_string();
        run_blocking(move || {
            let outcome = connection
                .lock()
                .map_err(|_| NativeError::from("database lock poisoned"))
                .and_then(|guard| match guard.as_ref() {
                    Some(conn) => query_all(conn, &sql).map_err(NativeError::from),
                    None => Err("database is closed".into()),
                });
            done(outcome);
        });
    }

    fn close(&self, done: Callback<()>) {
        let connection = Arc::clone(&self.connection);
        run_blocking(move || {
            let outcome = match connection.lock() {
                Ok(mut guard) => match guard.take() {
                    Some(conn) => conn.close().map_err(|(conn, err)| {
                        *guard = Some(conn);
                        NativeError::from(err)
                    }),
                    None => Ok(()),
                },
                Err(_) => Err("database lock poisoned".into()),
            };
            done(outcome);
        });
    }
}

/// Run one statement and collect every row as a JSON object keyed by column name.
fn query_all(conn: &Connection, sql: &str) -> rusqlite::Result<Records> {
    let mut statement = conn.prepare(sql)?;
    let columns: Vec<String> = statement
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let mut rows = statement.query([])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut object = Map::with_capacity(columns.len());
        for (index, name) in columns.iter().enumerate() {
            object.insert(name.clone(), cell_to_json(row.get_ref(index)?));
        }
        records.push(Value::Object(object));
    }
    Ok(records)
}

fn cell_to_json(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::from(n),
        ValueRef::Real(f) => value::float(f),
        ValueRef::Text(bytes) => value::lossy_text(bytes),
        ValueRef::Blob(bytes) => value::binary(bytes),
    }
}

//! Scheme routing and request validation.
//!
//! The registry is the single entry point callers use: it extracts the protocol
//! token from a connection URI, picks the adapter factory registered for it,
//! validates the request and hands a fresh adapter to a [`Session`].

use std::sync::Arc;

use tracing::debug;

use super::connection::Session;
use super::mongodb::{DocumentConnector, MongoAdapter, MongoConnector};
use super::mysql::{ConnectionFactory, MySqlAdapter, SqlxMySqlFactory};
use super::postgres::{PoolFactory, PostgresAdapter, SqlxPgPoolFactory};
use super::redis::{KeyValueConnector, RedisAdapter, RedisConnector};
use super::sqlite::{FileDatabaseOpener, RusqliteOpener, SqliteAdapter};
use super::{Adapter, DispatchError, QueryOptions, Records};

const SCHEME_DELIMITER: &str = "://";
const DOCUMENT_PROTOCOL: &str = "mongodb";

/// Native driver entry points handed to adapters when they are created.
///
/// `Drivers::default()` wires the real client crates. Tests replace individual
/// fields with stubs.
#[derive(Clone)]
pub struct Drivers {
    pub postgres: Arc<dyn PoolFactory>,
    pub mysql: Arc<dyn ConnectionFactory>,
    pub mongodb: Arc<dyn DocumentConnector>,
    pub sqlite: Arc<dyn FileDatabaseOpener>,
    pub redis: Arc<dyn KeyValueConnector>,
}

impl Default for Drivers {
    fn default() -> Self {
        Self {
            postgres: Arc::new(SqlxPgPoolFactory),
            mysql: Arc::new(SqlxMySqlFactory),
            mongodb: Arc::new(MongoConnector),
            sqlite: Arc::new(RusqliteOpener),
            redis: Arc::new(RedisConnector),
        }
    }
}

type Factory = fn(&Drivers) -> Box<dyn Adapter>;

struct Route {
    scheme: &'static str,
    factory: Factory,
    /// Whether `scheme+hint` tokens (e.g. `mysql+pymysql`) route here too.
    driver_hints: bool,
}

fn postgres(drivers: &Drivers) -> Box<dyn Adapter> {
    Box::new(PostgresAdapter::new(Arc::clone(&drivers.postgres)))
}

fn mongodb(drivers: &Drivers) -> Box<dyn Adapter> {
    Box::new(MongoAdapter::new(Arc::clone(&drivers.mongodb)))
}

fn sqlite(drivers: &Drivers) -> Box<dyn Adapter> {
    Box::new(SqliteAdapter::new(Arc::clone(&drivers.sqlite)))
}

fn redis(drivers: &Drivers) -> Box<dyn Adapter> {
    Box::new(RedisAdapter::new(Arc::clone(&drivers.redis)))
}

fn mysql(drivers: &Drivers) -> Box<dyn Adapter> {
    Box::new(MySqlAdapter::new(Arc::clone(&drivers.mysql)))
}

/// Registration order is the order reported in "not supported" errors.
static ROUTES: [Route; 6] = [
    Route {
        scheme: "postgres",
        factory: postgres,
        driver_hints: false,
    },
    Route {
        scheme: "postgresql",
        factory: postgres,
        driver_hints: false,
    },
    Route {
        scheme: "mongodb",
        factory: mongodb,
        driver_hints: false,
    },
    Route {
        scheme: "sqlite",
        factory: sqlite,
        driver_hints: false,
    },
    Route {
        scheme: "redis",
        factory: redis,
        driver_hints: false,
    },
    Route {
        scheme: "mysql",
        factory: mysql,
        driver_hints: true,
    },
];

/// Routes queries to engine adapters by URI scheme.
#[derive(Clone, Default)]
pub struct Registry {
    drivers: Drivers,
}

impl Registry {
    /// Registry backed by the real native clients.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry backed by the given native clients.
    pub fn with_drivers(drivers: Drivers) -> Self {
        Self { drivers }
    }

    /// Every registered scheme, in registration order.
    pub fn supported(&self) -> Vec<&'static str> {
        ROUTES.iter().map(|route| route.scheme).collect()
    }

    /// Extract the protocol token from `uri`. See [`extract_protocol`].
    pub fn extract_protocol(&self, uri: &str) -> Result<String, DispatchError> {
        extract_protocol(uri)
    }

    /// Check the request before any connection is attempted. See [`validate`].
    pub fn validate(
        &self,
        query: &str,
        protocol: &str,
        options: &QueryOptions,
    ) -> Result<(), DispatchError> {
        validate(query, protocol, options)
    }

    /// Execute `query` against the database at `uri`.
    ///
    /// Validation runs before any connection attempt. The adapter is created
    /// fresh for this call and is always closed before returning.
    pub async fn run(
        &self,
        uri: &str,
        query: &str,
        options: &QueryOptions,
    ) -> Result<Records, DispatchError> {
        let protocol = extract_protocol(uri)?;
        let route = find_route(&protocol).ok_or_else(|| DispatchError::UnsupportedProtocol {
            protocol: protocol.clone(),
            supported: self.supported(),
        })?;

        validate(query, route.scheme, options)?;

        debug!(%protocol, scheme = route.scheme, "dispatching query");
        let adapter = (route.factory)(&self.drivers);
        Session::new(route.scheme, adapter)
            .run(uri, query, options)
            .await
    }
}

fn find_route(protocol: &str) -> Option<&'static Route> {
    ROUTES
        .iter()
        .find(|route| route.scheme == protocol)
        .or_else(|| {
            let (base, _hint) = protocol.split_once('+')?;
            ROUTES
                .iter()
                .find(|route| route.driver_hints && route.scheme == base)
        })
}

/// Return the lower-cased scheme of `uri` (the text before the first `://`).
///
/// Fails with [`DispatchError::InvalidUri`] when the delimiter is missing or the
/// scheme is empty.
pub fn extract_protocol(uri: &str) -> Result<String, DispatchError> {
    match uri.split_once(SCHEME_DELIMITER) {
        Some((scheme, _)) if !scheme.is_empty() => Ok(scheme.to_lowercase()),
        _ => Err(DispatchError::InvalidUri),
    }
}

/// Reject empty queries, and MongoDB queries without a collection.
pub fn validate(query: &str, protocol: &str, options: &QueryOptions) -> Result<(), DispatchError> {
    if query.is_empty() {
        return Err(DispatchError::InvalidQuery);
    }
    if protocol == DOCUMENT_PROTOCOL && options.collection().is_none() {
        return Err(DispatchError::MissingCollection);
    }
    Ok(())
}

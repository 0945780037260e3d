//! Connection manager for database lifecycle and switching.
//!
//! Connections are cached per parameter tuple: connecting twice with the same
//! backend, host, port, user, password and database hands back the same
//! client without opening a new pool. The manager hands out the snapshot
//! taken at connect time; later refreshes belong to the session actor.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::db::{build_snapshot, DatabaseBackend, DatabaseClient, SchemaSnapshot};
use crate::error::Result;

/// Opens database clients. The default implementation goes through the real
/// drivers; tests substitute their own.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn DatabaseClient>>;
}

/// Connector backed by the sqlx drivers.
#[derive(Debug, Default, Clone, Copy)]
pub struct DriverConnector;

#[async_trait]
impl Connector for DriverConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn DatabaseClient>> {
        crate::db::connect(config).await
    }
}

/// Cache key: the full connection parameter tuple.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub backend: DatabaseBackend,
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
}

impl ConnectionKey {
    /// Builds the key for a config. The database name is required.
    pub fn from_config(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backend: config.backend,
            host: config
                .host
                .clone()
                .unwrap_or_else(|| "localhost".to_string()),
            port: config.effective_port(),
            user: config.user.clone(),
            password: config.password.clone(),
            database: config.database.clone().unwrap_or_default(),
        })
    }
}

impl fmt::Debug for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionKey")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .finish()
    }
}

/// An active database connection with its metadata.
#[derive(Clone)]
pub struct ActiveConnection {
    pub key: ConnectionKey,
    pub db: Arc<dyn DatabaseClient>,
    pub schema: Arc<SchemaSnapshot>,
    /// Server version reported at connect time.
    pub version: Option<String>,
}

impl ActiveConnection {
    /// SQL dialect of the connected backend.
    pub fn dialect(&self) -> &str {
        self.db.dialect()
    }
}

/// Manages database connections and switching between them.
pub struct ConnectionManager {
    connector: Box<dyn Connector>,
    cache: HashMap<ConnectionKey, Arc<dyn DatabaseClient>>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    /// Creates a manager that connects through the sqlx drivers.
    pub fn new() -> Self {
        Self::with_connector(DriverConnector)
    }

    /// Creates a manager with a custom connector.
    pub fn with_connector(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            cache: HashMap::new(),
        }
    }

    /// Connects with the given configuration. An identical parameter tuple
    /// reuses the cached client.
    ///
    /// The schema snapshot is rebuilt on every call.
    pub async fn connect(&mut self, config: &ConnectionConfig) -> Result<ActiveConnection> {
        let key = ConnectionKey::from_config(config)?;

        let db = match self.cache.get(&key) {
            Some(db) => {
                debug!("Reusing cached connection for {}", config.display_string());
                Arc::clone(db)
            }
            None => {
                let db = self.connector.connect(config).await?;
                self.cache.insert(key.clone(), Arc::clone(&db));
                info!("Connected to {}", config.display_string());
                db
            }
        };

        let schema = build_snapshot(db.as_ref(), &key.database).await?;
        let version = db.server_version().await;

        Ok(ActiveConnection {
            key,
            db,
            schema: Arc::new(schema),
            version,
        })
    }

    /// Number of cached clients.
    pub fn cached_connections(&self) -> usize {
        self.cache.len()
    }

    /// Closes every cached client.
    pub async fn close(&mut self) -> Result<()> {
        for (key, db) in self.cache.drain() {
            debug!("Closing connection to {}@{}", key.database, key.host);
            db.close().await?;
        }
        Ok(())
    }
}

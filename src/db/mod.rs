//! Database abstraction layer for genviz.
//!
//! Provides a trait-based interface for schema introspection and query
//! execution, allowing different database backends to be used interchangeably.

mod mock;
mod mysql;
mod postgres;
mod schema;
mod types;

pub use mock::MockDatabaseClient;
pub use mysql::MySqlClient;
pub use postgres::PostgresClient;
pub use schema::{build_snapshot, Column, Relation, RelationKind, SchemaSnapshot};
pub use types::{ColumnInfo, QueryResult, Row, Value, MAX_ROWS};

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Supported database backends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Postgres,
    #[serde(alias = "mariadb")]
    MySql,
}

impl DatabaseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::MySql),
            _ => None,
        }
    }

    /// Returns the default port for this backend.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::MySql => 3306,
        }
    }

    /// Returns the URL scheme for this backend.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
        }
    }

    /// Returns the SQL dialect name handed to the translator.
    pub fn dialect(&self) -> &'static str {
        match self {
            Self::Postgres => "postgresql",
            Self::MySql => "mysql",
        }
    }
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Creates a database client for the configured backend.
///
/// This is the central factory function for database connections.
pub async fn connect(config: &ConnectionConfig) -> Result<Arc<dyn DatabaseClient>> {
    match config.backend {
        DatabaseBackend::Postgres => {
            let client = PostgresClient::connect(config).await?;
            Ok(Arc::new(client))
        }
        DatabaseBackend::MySql => {
            let client = MySqlClient::connect(config).await?;
            Ok(Arc::new(client))
        }
    }
}

/// Trait defining the interface for database clients.
///
/// A client is both the schema introspector and the query executor for one
/// live connection.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Lists base table names in the given database.
    async fn list_tables(&self, database: &str) -> Result<Vec<String>>;

    /// Lists view names in the given database.
    async fn list_views(&self, database: &str) -> Result<Vec<String>>;

    /// Lists the columns of a table or view, in ordinal order.
    async fn list_columns(&self, database: &str, relation: &str) -> Result<Vec<Column>>;

    /// Executes a SQL query and returns the results.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// SQL dialect name, e.g. "postgresql".
    fn dialect(&self) -> &str;

    /// Server version string, if the server reports one.
    async fn server_version(&self) -> Option<String>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}

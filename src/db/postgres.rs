//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using sqlx.

use crate::config::ConnectionConfig;
use crate::db::{Column, ColumnInfo, DatabaseClient, QueryResult, Row, Value};
use crate::error::{ExecutionFailure, GenvizError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// PostgreSQL database client.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Creates a new PostgresClient from an existing connection pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool for the given config, retrying transient failures with
    /// exponential backoff.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;

        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;

        loop {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(10))
                .connect(&conn_str)
                .await;

            match result {
                Ok(pool) => {
                    debug!("Connected to {}", config.display_string());
                    return Ok(Self { pool });
                }
                Err(e) if attempt < MAX_RETRY_ATTEMPTS && is_transient_error(&e) => {
                    warn!(
                        "Connection attempt {} failed (transient error), retrying in {:?}",
                        attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(map_connection_error(e, config)),
            }
        }
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn list_tables(&self, database: &str) -> Result<Vec<String>> {
        self.list_relations(database, "BASE TABLE").await
    }

    async fn list_views(&self, database: &str) -> Result<Vec<String>> {
        self.list_relations(database, "VIEW").await
    }

    async fn list_columns(&self, database: &str, relation: &str) -> Result<Vec<Column>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT column_name::text, data_type::text
            FROM information_schema.columns
            WHERE table_catalog = $1
                AND table_name = $2
                AND table_schema = (
                    SELECT t.table_schema
                    FROM information_schema.tables t
                    WHERE t.table_catalog = $1
                        AND t.table_name = $2
                        AND t.table_schema::name = ANY (current_schemas(false))
                    ORDER BY array_position(current_schemas(false), t.table_schema::name)
                    LIMIT 1
                )
            ORDER BY ordinal_position
            "#,
        )
        .bind(database)
        .bind(relation)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GenvizError::schema(format!("Failed to fetch columns for {relation}: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|(name, data_type)| Column::new(name, data_type))
            .collect())
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();

        let result = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_query_error)?;

        let execution_time = start.elapsed();

        let columns: Vec<ColumnInfo> = result
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        let rows: Vec<Row> = result.iter().map(convert_row).collect();
        let result = QueryResult::with_data(columns, rows)
            .with_execution_time(execution_time)
            .truncated();

        if let Some(warning) = result.truncation_warning() {
            warn!("{}", warning);
        }

        Ok(result)
    }

    fn dialect(&self) -> &str {
        "postgresql"
    }

    async fn server_version(&self) -> Option<String> {
        sqlx::query_scalar::<_, String>("SHOW server_version")
            .fetch_one(&self.pool)
            .await
            .ok()
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

impl PostgresClient {
    /// Relations visible without a schema qualifier. A name shadowed further
    /// down the search path is listed once.
    async fn list_relations(&self, database: &str, table_type: &str) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT DISTINCT ON (table_name) table_name::text
            FROM information_schema.tables
            WHERE table_catalog = $1
                AND table_type = $2
                AND table_schema::name = ANY (current_schemas(false))
            ORDER BY table_name, array_position(current_schemas(false), table_schema::name)
            "#,
        )
        .bind(database)
        .bind(table_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GenvizError::schema(format!("Failed to fetch relations: {e}")))
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

fn decode<'r, T>(row: &'r PgRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get::<Option<T>, _>(index).ok().flatten()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    let value = match type_name.to_uppercase().as_str() {
        "BOOL" => decode::<bool>(row, index).map(Value::Bool),
        "INT2" => decode::<i16>(row, index).map(|v| Value::Int(v as i64)),
        "INT4" => decode::<i32>(row, index).map(|v| Value::Int(v as i64)),
        "INT8" => decode::<i64>(row, index).map(Value::Int),
        "FLOAT4" => decode::<f32>(row, index).map(|v| Value::Float(v as f64)),
        "FLOAT8" => decode::<f64>(row, index).map(Value::Float),
        "NUMERIC" => decode::<Decimal>(row, index)
            .and_then(|d| d.to_f64())
            .map(Value::Float),
        "DATE" => decode::<NaiveDate>(row, index).map(|d| Value::String(d.to_string())),
        "TIME" => decode::<NaiveTime>(row, index).map(|t| Value::String(t.to_string())),
        "TIMESTAMP" => decode::<NaiveDateTime>(row, index)
            .map(|ts| Value::String(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string())),
        "TIMESTAMPTZ" => decode::<DateTime<Utc>>(row, index).map(|ts| Value::String(ts.to_rfc3339())),
        "BYTEA" => decode::<Vec<u8>>(row, index).map(Value::Bytes),
        _ => decode::<String>(row, index).map(Value::String),
    };
    value.unwrap_or(Value::Null)
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    if matches!(error, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) {
        return true;
    }

    let error_str = error.to_string().to_lowercase();
    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> GenvizError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.effective_port();
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        GenvizError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        GenvizError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        GenvizError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        GenvizError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        GenvizError::connection(format!("Connection failed: {error}"))
    }
}

/// Maps a query error to an execution failure, keeping PostgreSQL's detail
/// and hint lines in the message.
fn map_query_error(error: sqlx::Error) -> GenvizError {
    let Some(db_error) = error.as_database_error() else {
        return GenvizError::execution(ExecutionFailure::Other, error.to_string());
    };

    let kind = db_error
        .code()
        .map(|code| classify_sqlstate(&code))
        .unwrap_or(ExecutionFailure::Other);

    let mut message = format!("ERROR: {}", db_error.message());
    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            message.push_str("\n  DETAIL: ");
            message.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            message.push_str("\n  HINT: ");
            message.push_str(hint);
        }
    }

    GenvizError::execution(kind, message)
}

/// Maps a SQLSTATE code to an execution failure kind.
fn classify_sqlstate(code: &str) -> ExecutionFailure {
    match code {
        "42501" => ExecutionFailure::Permission,
        "57014" => ExecutionFailure::Timeout,
        c if c.starts_with("42") => ExecutionFailure::Syntax,
        _ => ExecutionFailure::Other,
    }
}

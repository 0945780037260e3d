//! MySQL / MariaDB database client implementation.

use crate::config::ConnectionConfig;
use crate::db::{Column, ColumnInfo, DatabaseClient, QueryResult, Row, Value};
use crate::error::{ExecutionFailure, GenvizError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlDatabaseError, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const MAX_RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;

/// MySQL database client.
#[derive(Debug)]
pub struct MySqlClient {
    pool: MySqlPool,
}

impl MySqlClient {
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Opens a pool for the given config, retrying transient failures.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;

        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;

        loop {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = MySqlPoolOptions::new()
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

    async fn list_relations(&self, database: &str, table_type: &str) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT CAST(table_name AS CHAR)
            FROM information_schema.tables
            WHERE table_schema = ? AND table_type = ?
            ORDER BY table_name
            "#,
        )
        .bind(database)
        .bind(table_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GenvizError::schema(format!("Failed to fetch relations: {e}")))
    }
}

#[async_trait]
impl DatabaseClient for MySqlClient {
    async fn list_tables(&self, database: &str) -> Result<Vec<String>> {
        self.list_relations(database, "BASE TABLE").await
    }

    async fn list_views(&self, database: &str) -> Result<Vec<String>> {
        self.list_relations(database, "VIEW").await
    }

    async fn list_columns(&self, database: &str, relation: &str) -> Result<Vec<Column>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT CAST(column_name AS CHAR), CAST(column_type AS CHAR)
            FROM information_schema.columns
            WHERE table_schema = ? AND table_name = ?
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
        "mysql"
    }

    async fn server_version(&self) -> Option<String> {
        sqlx::query_scalar::<_, String>("SELECT CAST(VERSION() AS CHAR)")
            .fetch_one(&self.pool)
            .await
            .ok()
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

fn convert_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

fn decode<'r, T>(row: &'r MySqlRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
{
    row.try_get::<Option<T>, _>(index).ok().flatten()
}

fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    let upper = type_name.to_uppercase();
    let value = match upper.as_str() {
        "BOOLEAN" => decode::<bool>(row, index).map(Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            decode::<i64>(row, index).map(Value::Int)
        }
        t if t.ends_with("UNSIGNED") => decode::<u64>(row, index).map(|v| {
            i64::try_from(v)
                .map(Value::Int)
                .unwrap_or(Value::Float(v as f64))
        }),
        "FLOAT" => decode::<f32>(row, index).map(|v| Value::Float(v as f64)),
        "DOUBLE" => decode::<f64>(row, index).map(Value::Float),
        "DECIMAL" => decode::<Decimal>(row, index)
            .and_then(|d| d.to_f64())
            .map(Value::Float),
        "DATE" => decode::<NaiveDate>(row, index).map(|d| Value::String(d.to_string())),
        "TIME" => decode::<NaiveTime>(row, index).map(|t| Value::String(t.to_string())),
        "DATETIME" => decode::<NaiveDateTime>(row, index)
            .map(|ts| Value::String(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string())),
        "TIMESTAMP" => decode::<DateTime<Utc>>(row, index).map(|ts| Value::String(ts.to_rfc3339())),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            decode::<String>(row, index)
                .map(Value::String)
                .or_else(|| decode::<Vec<u8>>(row, index).map(Value::Bytes))
        }
        _ => decode::<String>(row, index).map(Value::String),
    };
    value.unwrap_or(Value::Null)
}

fn is_transient_error(error: &sqlx::Error) -> bool {
    if matches!(error, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) {
        return true;
    }

    let error_str = error.to_string().to_lowercase();
    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("connection reset")
        || error_str.contains("too many connections")
}

fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> GenvizError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.effective_port();
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let number = error
        .as_database_error()
        .and_then(|e| e.try_downcast_ref::<MySqlDatabaseError>())
        .map(|e| e.number());

    match number {
        Some(1045) => GenvizError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        )),
        Some(1049) => GenvizError::connection(format!("Database '{database}' does not exist.")),
        _ => {
            let error_str = error.to_string().to_lowercase();
            if error_str.contains("connection refused") {
                GenvizError::connection(format!(
                    "Cannot connect to {host}:{port}. Check that the server is running."
                ))
            } else if error_str.contains("timed out") {
                GenvizError::connection(format!("Connection to {host}:{port} timed out."))
            } else {
                GenvizError::connection(format!("Connection failed: {error}"))
            }
        }
    }
}

fn map_query_error(error: sqlx::Error) -> GenvizError {
    let Some(db_error) = error.as_database_error() else {
        return GenvizError::execution(ExecutionFailure::Other, error.to_string());
    };

    let kind = db_error
        .try_downcast_ref::<MySqlDatabaseError>()
        .map(|e| classify_error_number(e.number()))
        .unwrap_or(ExecutionFailure::Other);

    GenvizError::execution(kind, format!("ERROR: {}", db_error.message()))
}

/// Maps a MySQL server error number to an execution failure kind.
fn classify_error_number(number: u16) -> ExecutionFailure {
    match number {
        // ER_PARSE_ERROR, ER_BAD_FIELD_ERROR, ER_NO_SUCH_TABLE
        1064 | 1054 | 1146 => ExecutionFailure::Syntax,
        // ER_TABLEACCESS_DENIED_ERROR, ER_DBACCESS_DENIED_ERROR, ER_ACCESS_DENIED_ERROR
        1142 | 1044 | 1045 => ExecutionFailure::Permission,
        // ER_QUERY_TIMEOUT, ER_QUERY_INTERRUPTED
        3024 | 1317 => ExecutionFailure::Timeout,
        _ => ExecutionFailure::Other,
    }
}

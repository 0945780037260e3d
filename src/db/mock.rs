//! Mock database client for testing.
//!
//! Holds an in-memory catalog and canned results matched by SQL substring.

use super::{Column, ColumnInfo, DatabaseClient, QueryResult, Value};
use crate::error::{ExecutionFailure, GenvizError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A mock database client that returns predefined results.
#[derive(Debug, Default)]
pub struct MockDatabaseClient {
    tables: Vec<(String, Vec<Column>)>,
    views: Vec<(String, Vec<Column>)>,
    results: Vec<(String, QueryResult)>,
    failures: Vec<(String, GenvizError)>,
    introspection_error: Option<String>,
    delay: Option<Duration>,
    executions: AtomicUsize,
}

impl MockDatabaseClient {
    /// Creates a new mock database client with an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table to the catalog.
    pub fn with_table(mut self, name: impl Into<String>, columns: Vec<Column>) -> Self {
        self.tables.push((name.into(), columns));
        self
    }

    /// Adds a view to the catalog.
    pub fn with_view(mut self, name: impl Into<String>, columns: Vec<Column>) -> Self {
        self.views.push((name.into(), columns));
        self
    }

    /// Returns `result` for any SQL containing `pattern` (case-insensitive).
    pub fn with_result(mut self, pattern: impl Into<String>, result: QueryResult) -> Self {
        self.results.push((pattern.into(), result));
        self
    }

    /// Fails any SQL containing `pattern` with `error`.
    pub fn with_failure(mut self, pattern: impl Into<String>, error: GenvizError) -> Self {
        self.failures.push((pattern.into(), error));
        self
    }

    /// Makes every introspection call fail with the given message.
    pub fn failing_introspection(mut self, message: impl Into<String>) -> Self {
        self.introspection_error = Some(message.into());
        self
    }

    /// Sleeps for `delay` before answering each query.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `execute_query` calls observed.
    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    fn check_introspection(&self) -> Result<()> {
        match &self.introspection_error {
            Some(message) => Err(GenvizError::schema(message.clone())),
            None => Ok(()),
        }
    }

    fn lookup<'a, T>(entries: &'a [(String, T)], sql: &str) -> Option<&'a T> {
        let sql_lower = sql.to_lowercase();
        entries
            .iter()
            .find(|(pattern, _)| sql_lower.contains(&pattern.to_lowercase()))
            .map(|(_, value)| value)
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn list_tables(&self, _database: &str) -> Result<Vec<String>> {
        self.check_introspection()?;
        Ok(self.tables.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn list_views(&self, _database: &str) -> Result<Vec<String>> {
        self.check_introspection()?;
        Ok(self.views.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn list_columns(&self, _database: &str, relation: &str) -> Result<Vec<Column>> {
        self.check_introspection()?;
        self.tables
            .iter()
            .chain(self.views.iter())
            .find(|(name, _)| name == relation)
            .map(|(_, columns)| columns.clone())
            .ok_or_else(|| GenvizError::schema(format!("Relation '{relation}' not found")))
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        self.executions.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = Self::lookup(&self.failures, sql) {
            return Err(error.clone());
        }

        if let Some(result) = Self::lookup(&self.results, sql) {
            return Ok(result.clone().with_execution_time(Duration::from_millis(1)));
        }

        if sql.trim_start().to_uppercase().starts_with("SELECT") {
            let columns = vec![ColumnInfo::new("result", "TEXT")];
            let rows = vec![vec![Value::String(format!("Mock result for: {sql}"))]];
            Ok(QueryResult::with_data(columns, rows).with_execution_time(Duration::from_millis(1)))
        } else {
            Err(GenvizError::execution(
                ExecutionFailure::Syntax,
                format!("Mock database only understands SELECT: {sql}"),
            ))
        }
    }

    fn dialect(&self) -> &str {
        "postgresql"
    }

    async fn server_version(&self) -> Option<String> {
        Some("mock 1.0".to_string())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

//! Shared fixtures for the integration tests.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use genviz::config::ConnectionConfig;
use genviz::db::{
    Column, ColumnInfo, DatabaseClient, MockDatabaseClient, PostgresClient, QueryResult, Value,
};
use genviz::error::Result;
use genviz::llm::{LlmTranslator, MockLlmClient};
use genviz::session::{
    Pipeline, Question, SchemaContext, SessionActor, SessionHandle, SessionSnapshot, StageTimeouts,
};
use genviz::speech::MockTranscriber;

/// Helper to get test database URL from environment.
pub fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Helper to connect to the test database, with the config it came from.
pub async fn get_test_client() -> Option<(PostgresClient, ConnectionConfig)> {
    let url = get_test_database_url()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    let client = PostgresClient::connect(&config).await.ok()?;
    Some((client, config))
}

/// `orders(id int, total numeric, created_at date)` with canned answers for
/// the daily totals and count queries the mock translator produces.
pub fn orders_db() -> MockDatabaseClient {
    let daily = QueryResult::with_data(
        vec![
            ColumnInfo::new("created_at", "DATE"),
            ColumnInfo::new("total", "NUMERIC"),
        ],
        vec![
            vec![Value::from("2024-03-01"), Value::Float(120.5)],
            vec![Value::from("2024-03-02"), Value::Float(98.0)],
            vec![Value::from("2024-03-03"), Value::Float(143.25)],
        ],
    );
    let count = QueryResult::with_data(
        vec![ColumnInfo::new("count", "INT8")],
        vec![vec![Value::Int(42)]],
    );

    MockDatabaseClient::new()
        .with_table(
            "orders",
            vec![
                Column::new("id", "integer"),
                Column::new("total", "numeric"),
                Column::new("created_at", "date"),
            ],
        )
        .with_result("GROUP BY created_at", daily)
        .with_result("COUNT(*)", count)
}

pub fn fast_timeouts() -> StageTimeouts {
    StageTimeouts {
        transcription: Duration::from_secs(2),
        translation: Duration::from_secs(2),
        execution: Duration::from_secs(2),
    }
}

/// Spawns a session actor over the given collaborators.
pub async fn spawn_session(
    db: Arc<dyn DatabaseClient>,
    llm: MockLlmClient,
    transcriber: MockTranscriber,
    timeouts: StageTimeouts,
) -> SessionHandle {
    let context = SchemaContext::load(db, "shop")
        .await
        .expect("mock schema should load");
    let pipeline = Pipeline::new(
        Arc::new(transcriber),
        Arc::new(LlmTranslator::new(Box::new(llm))),
    )
    .with_timeouts(timeouts);
    SessionActor::spawn(pipeline, context)
}

/// Submits a question and waits for its session to finish.
pub async fn ask(handle: &SessionHandle, question: Question) -> SessionSnapshot {
    let id = handle.submit(question).await.expect("actor should accept");
    tokio::time::timeout(Duration::from_secs(5), handle.wait_for_terminal(id))
        .await
        .expect("session should finish in time")
        .expect("session should not be superseded")
}

/// Executor that holds queries matching a pattern until released.
pub struct GatedDatabase {
    inner: MockDatabaseClient,
    pattern: String,
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl GatedDatabase {
    pub fn new(inner: MockDatabaseClient, pattern: impl Into<String>) -> Self {
        Self {
            inner,
            pattern: pattern.into(),
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }

    pub fn execution_count(&self) -> usize {
        self.inner.execution_count()
    }
}

#[async_trait]
impl DatabaseClient for GatedDatabase {
    async fn list_tables(&self, database: &str) -> Result<Vec<String>> {
        self.inner.list_tables(database).await
    }

    async fn list_views(&self, database: &str) -> Result<Vec<String>> {
        self.inner.list_views(database).await
    }

    async fn list_columns(&self, database: &str, relation: &str) -> Result<Vec<Column>> {
        self.inner.list_columns(database, relation).await
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        if sql.contains(&self.pattern) {
            self.started.notify_one();
            self.release.notified().await;
        }
        self.inner.execute_query(sql).await
    }

    fn dialect(&self) -> &str {
        self.inner.dialect()
    }

    async fn server_version(&self) -> Option<String> {
        self.inner.server_version().await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}

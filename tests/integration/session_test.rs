//! End-to-end session tests with mock collaborators.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

use genviz::chart::{ChartSpec, ColumnKind};
use genviz::classifier::Classification;
use genviz::db::{DatabaseClient, MockDatabaseClient, Value};
use genviz::error::{ExecutionFailure, GenvizError, TranscriptionFailure};
use genviz::llm::MockLlmClient;
use genviz::session::{Phase, Question, StageTimeouts};
use genviz::speech::MockTranscriber;

use super::common::{ask, fast_timeouts, orders_db, spawn_session, GatedDatabase};

#[tokio::test]
async fn test_total_sales_by_day_draws_line_chart() {
    let handle = spawn_session(
        Arc::new(orders_db()),
        MockLlmClient::new(),
        MockTranscriber::new(),
        fast_timeouts(),
    )
    .await;

    let done = ask(&handle, Question::text("total sales by day")).await;

    assert_eq!(done.phase, Phase::Done);
    assert!(matches!(done.classification, Some(Classification::Executable(_))));
    assert_eq!(
        done.sql.as_deref(),
        Some("SELECT created_at, SUM(total) AS total FROM orders GROUP BY created_at ORDER BY created_at;")
    );
    assert_eq!(
        done.chart,
        Some(ChartSpec::Line {
            x: "created_at".into(),
            y_series: vec!["total".into()],
        })
    );
    assert_eq!(done.chart_title.as_deref(), Some("total over time"));

    let rows = done.result_set.unwrap();
    assert_eq!(rows.row_count(), 3);
    // The stored result set keeps the executor's kinds; promotion is internal
    // to chart selection.
    assert_eq!(rows.columns[0].kind, ColumnKind::Categorical);
    assert!(done.error.is_none());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_newer_question_supersedes_executing_one() {
    let llm = MockLlmClient::new()
        .with_response("by region", "SELECT region, SUM(total) AS total FROM sales GROUP BY region");
    let gated = Arc::new(GatedDatabase::new(orders_db(), "FROM sales"));
    let db: Arc<dyn DatabaseClient> = gated.clone();
    let handle = spawn_session(db, llm, MockTranscriber::new(), fast_timeouts()).await;

    let first = handle.submit(Question::text("sales by region")).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), gated.started.notified())
        .await
        .expect("first query should start executing");
    assert_eq!(handle.snapshot().unwrap().phase, Phase::Executing);

    let second = handle.submit(Question::text("how many orders")).await.unwrap();
    assert!(matches!(
        handle.wait_for_terminal(first).await,
        Err(GenvizError::Internal(_))
    ));

    // Executions are serialized, so the second query runs once the first
    // finishes; the first one's late result must not leak into the session.
    gated.release.notify_one();
    let done = tokio::time::timeout(Duration::from_secs(5), handle.wait_for_terminal(second))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(done.id, second);
    assert_eq!(done.question.as_deref(), Some("how many orders"));
    assert_eq!(
        done.chart,
        Some(ChartSpec::Metric {
            label: "count".into(),
            value: Value::Int(42),
        })
    );
    assert_eq!(done.result_set.unwrap().columns[0].name, "count");
    assert_eq!(gated.execution_count(), 2);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.snapshot().unwrap().id, second);
}

#[tokio::test]
async fn test_explanation_is_not_executed() {
    let db = Arc::new(orders_db());
    let handle = spawn_session(
        db.clone(),
        MockLlmClient::new(),
        MockTranscriber::new(),
        fast_timeouts(),
    )
    .await;

    let done = ask(&handle, Question::text("what is the weather in Oslo")).await;

    assert_eq!(done.phase, Phase::Done);
    assert_eq!(
        done.classification,
        Some(Classification::Explanation(
            "-- I cannot answer that question with the available schema.".into()
        ))
    );
    assert!(done.result_set.is_none());
    assert!(done.chart.is_none());
    assert_eq!(db.execution_count(), 0);
}

#[tokio::test]
async fn test_audio_question_is_transcribed() {
    let handle = spawn_session(
        Arc::new(orders_db()),
        MockLlmClient::new(),
        MockTranscriber::new().with_transcript("how many orders"),
        fast_timeouts(),
    )
    .await;

    let done = ask(&handle, Question::Audio(vec![0x52, 0x49, 0x46, 0x46, 0, 0])).await;

    assert_eq!(done.phase, Phase::Done);
    assert_eq!(done.audio_bytes, Some(6));
    assert_eq!(done.transcript.as_deref(), Some("how many orders"));
    assert_eq!(done.question_text(), Some("how many orders"));
    assert!(matches!(done.chart, Some(ChartSpec::Metric { .. })));
}

#[tokio::test]
async fn test_unrecognized_audio_fails_session() {
    let llm = MockLlmClient::new();
    let handle = spawn_session(
        Arc::new(orders_db()),
        llm.clone(),
        MockTranscriber::new().failing(
            TranscriptionFailure::Unrecognized,
            "Sorry, I could not understand the audio. Please try again.",
        ),
        fast_timeouts(),
    )
    .await;

    let done = ask(&handle, Question::Audio(vec![1, 2, 3])).await;

    assert_eq!(done.phase, Phase::Failed);
    assert_eq!(
        done.error,
        Some(GenvizError::transcription(
            TranscriptionFailure::Unrecognized,
            "Sorry, I could not understand the audio. Please try again."
        ))
    );
    assert!(done.sql.is_none());
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_slow_query_times_out() {
    let db = Arc::new(orders_db().with_delay(Duration::from_secs(2)));
    let timeouts = StageTimeouts {
        execution: Duration::from_millis(100),
        ..fast_timeouts()
    };
    let handle = spawn_session(db, MockLlmClient::new(), MockTranscriber::new(), timeouts).await;

    let done = ask(&handle, Question::text("how many orders")).await;

    assert_eq!(done.phase, Phase::Failed);
    let error = done.error.unwrap();
    assert!(error.is_timeout());
    assert_eq!(
        error,
        GenvizError::execution(ExecutionFailure::Timeout, "Query timed out after 100ms.")
    );
}

#[tokio::test]
async fn test_execution_error_fails_session() {
    let db = MockDatabaseClient::new().with_failure(
        "orders",
        GenvizError::execution(ExecutionFailure::Permission, "permission denied for table orders"),
    );
    let handle = spawn_session(
        Arc::new(db),
        MockLlmClient::new(),
        MockTranscriber::new(),
        fast_timeouts(),
    )
    .await;

    let done = ask(&handle, Question::text("how many orders")).await;

    assert_eq!(done.phase, Phase::Failed);
    assert_eq!(done.sql.as_deref(), Some("SELECT COUNT(*) AS count FROM orders;"));
    assert!(matches!(
        done.error,
        Some(GenvizError::Execution {
            kind: ExecutionFailure::Permission,
            ..
        })
    ));
}

#[tokio::test]
async fn test_blank_question_fails_without_translation() {
    let llm = MockLlmClient::new();
    let handle = spawn_session(
        Arc::new(orders_db()),
        llm.clone(),
        MockTranscriber::new(),
        fast_timeouts(),
    )
    .await;

    let done = ask(&handle, Question::text("   ")).await;

    assert_eq!(done.phase, Phase::Failed);
    assert_eq!(done.error, Some(GenvizError::translation("Please ask a question.")));
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_repeated_question_uses_cache_until_refresh() {
    let llm = MockLlmClient::new();
    let handle = spawn_session(
        Arc::new(orders_db()),
        llm.clone(),
        MockTranscriber::new(),
        fast_timeouts(),
    )
    .await;

    ask(&handle, Question::text("how many orders")).await;
    let again = ask(&handle, Question::text("how many orders")).await;
    assert_eq!(again.phase, Phase::Done);
    assert_eq!(llm.call_count(), 1);

    let schema = handle.refresh_schema().await.unwrap();
    assert_eq!(schema.tables.len(), 1);

    ask(&handle, Question::text("how many orders")).await;
    assert_eq!(llm.call_count(), 2);
}

#[tokio::test]
async fn test_translation_failure_fails_session() {
    let handle = spawn_session(
        Arc::new(orders_db()),
        MockLlmClient::new().failing("Rate limited. Please wait and try again."),
        MockTranscriber::new(),
        fast_timeouts(),
    )
    .await;

    let done = ask(&handle, Question::text("how many orders")).await;

    assert_eq!(done.phase, Phase::Failed);
    assert_eq!(
        done.error,
        Some(GenvizError::translation("Rate limited. Please wait and try again."))
    );
}

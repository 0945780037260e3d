//! Query execution integration tests against PostgreSQL.

use std::sync::Arc;

use genviz::chart::ChartSpec;
use genviz::db::{DatabaseClient, Value, MAX_ROWS};
use genviz::error::{ExecutionFailure, GenvizError};
use genviz::llm::MockLlmClient;
use genviz::session::{Phase, Question};
use genviz::speech::MockTranscriber;

use super::common::{ask, fast_timeouts, get_test_client, spawn_session};

#[tokio::test]
async fn test_execute_simple_select() {
    let Some((client, _)) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT 1::int8 AS num, 'hello' AS greeting, NULL::text AS nothing")
        .await
        .unwrap();

    assert_eq!(result.columns.len(), 3);
    assert_eq!(result.columns[0].name, "num");
    assert_eq!(
        result.rows,
        vec![vec![Value::Int(1), Value::from("hello"), Value::Null]]
    );

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_numeric_and_date_values() {
    let Some((client, _)) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT 12.50::numeric AS total, DATE '2024-03-01' AS day")
        .await
        .unwrap();

    assert_eq!(
        result.rows,
        vec![vec![Value::Float(12.5), Value::from("2024-03-01")]]
    );

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_large_results_are_truncated() {
    let Some((client, _)) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT g FROM generate_series(1, 1500) AS g")
        .await
        .unwrap();

    assert_eq!(result.row_count(), MAX_ROWS);
    assert!(result.was_truncated);
    assert_eq!(result.total_rows, 1500);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_syntax_error_is_classified() {
    let Some((client, _)) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = client.execute_query("SELEC 1").await.unwrap_err();
    assert!(matches!(
        err,
        GenvizError::Execution {
            kind: ExecutionFailure::Syntax,
            ..
        }
    ));

    let err = client
        .execute_query("SELECT * FROM genviz_missing_relation")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GenvizError::Execution {
            kind: ExecutionFailure::Syntax,
            ..
        }
    ));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_session_against_live_database() {
    let Some((client, _)) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let llm = MockLlmClient::new().with_response(
        "daily",
        "```sql\nSELECT DATE '2024-03-01' + g AS day, g * 10 AS total FROM generate_series(0, 4) AS g\n```",
    );
    let db: Arc<dyn DatabaseClient> = Arc::new(client);
    let context_db = db.clone();
    let handle = spawn_session(db, llm, MockTranscriber::new(), fast_timeouts()).await;

    let done = ask(&handle, Question::text("daily totals")).await;

    assert_eq!(done.phase, Phase::Done, "error: {:?}", done.error);
    assert_eq!(
        done.chart,
        Some(ChartSpec::Line {
            x: "day".into(),
            y_series: vec!["total".into()],
        })
    );

    handle.shutdown().await.unwrap();
    context_db.close().await.unwrap();
}

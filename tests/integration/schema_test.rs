//! Schema introspection integration tests.

use genviz::db::{build_snapshot, DatabaseClient};

use super::common::get_test_client;

#[tokio::test]
async fn test_snapshot_of_test_database() {
    let Some((client, config)) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let database = config.database.clone().unwrap();

    client
        .execute_query("SELECT 1")
        .await
        .expect("connection should be usable");
    let snapshot = build_snapshot(&client, &database).await.unwrap();

    assert_eq!(snapshot.database_name, database);
    for relation in snapshot.relations() {
        assert!(
            !relation.columns.is_empty(),
            "relation {} has no columns",
            relation.name
        );
    }
    if snapshot.is_empty() {
        assert!(snapshot.format_for_display().contains("No tables or views found"));
    }

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_system_catalogs_are_excluded() {
    let Some((client, config)) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let database = config.database.clone().unwrap();

    let tables = client.list_tables(&database).await.unwrap();
    assert!(!tables.iter().any(|t| t == "pg_class" || t == "tables"));

    let views = client.list_views(&database).await.unwrap();
    assert!(!views.iter().any(|v| v == "pg_stat_activity"));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_unknown_relation_has_no_columns() {
    let Some((client, config)) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let database = config.database.clone().unwrap();

    let columns = client
        .list_columns(&database, "genviz_relation_that_does_not_exist")
        .await
        .unwrap();
    assert!(columns.is_empty());

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_shadowed_table_is_listed_once() {
    let Some((client, config)) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let database = config.database.clone().unwrap();

    for ddl in [
        "DROP SCHEMA IF EXISTS genviz_shadow CASCADE",
        "DROP TABLE IF EXISTS public.genviz_dup",
        "CREATE SCHEMA genviz_shadow",
        "CREATE TABLE public.genviz_dup (id integer)",
        "CREATE TABLE genviz_shadow.genviz_dup (label text, extra integer)",
    ] {
        client.execute_query(ddl).await.unwrap();
    }

    let tables = client.list_tables(&database).await.unwrap();
    let columns = client.list_columns(&database, "genviz_dup").await.unwrap();

    for ddl in [
        "DROP SCHEMA genviz_shadow CASCADE",
        "DROP TABLE public.genviz_dup",
    ] {
        client.execute_query(ddl).await.unwrap();
    }

    assert_eq!(tables.iter().filter(|t| *t == "genviz_dup").count(), 1);
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id"]);

    client.close().await.unwrap();
}

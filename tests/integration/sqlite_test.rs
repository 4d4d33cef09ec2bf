//! End-to-end collection against an in-memory SQLite database.

use std::sync::Arc;
use std::time::Duration;

use db_sampler::collector::QueryDispatcher;
use db_sampler::config::QueryDefinition;
use db_sampler::db::{DataSource, SqlxSource};
use db_sampler::error::CollectorError;
use db_sampler::report::CapturingReporter;
use db_sampler::sink::Samples;
use sqlx::sqlite::SqlitePoolOptions;
use tokio_util::sync::CancellationToken;

/// Helper to create a seeded in-memory database.
///
/// A single pooled connection keeps every query on the same in-memory database.
async fn seeded_source() -> SqlxSource {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    sqlx::raw_sql(
        r#"
        CREATE TABLE table_stats (
            table_schema TEXT NOT NULL,
            table_name TEXT NOT NULL,
            table_rows INTEGER,
            data_length REAL,
            status TEXT
        );
        INSERT INTO table_stats VALUES ('shop', 'orders', 1200, 16384.5, 'OK');
        INSERT INTO table_stats VALUES ('shop', 'order items', 5400, 65536, 'OK');
        INSERT INTO table_stats VALUES ('crm', 'leads', NULL, 512, 'OK');
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    SqlxSource::from(pool)
}

#[tokio::test]
async fn test_collect_table_stats() {
    let source = Arc::new(seeded_source().await);
    let samples = Arc::new(Samples::new());
    let reporter = Arc::new(CapturingReporter::new());
    let dispatcher = QueryDispatcher::new(source.clone(), samples.clone(), reporter.clone());

    let queries = vec![QueryDefinition::new(
        "mysql_table",
        "SELECT TABLE_SCHEMA, TABLE_NAME, TABLE_ROWS, DATA_LENGTH FROM table_stats ORDER BY table_rows DESC",
    )
    .with_metric_fields(["table_rows", "data_length"])
    .with_label_fields(["table_schema", "table_name"])
    .with_timeout(Duration::from_secs(5))];

    dispatcher.dispatch(&queries, &CancellationToken::new()).await;

    let collected = samples.snapshot();
    // Three rows with two fields each, minus the NULL row count for `leads`.
    assert_eq!(collected.len(), 5);
    assert!(collected.iter().all(|s| s.name() == "mysql_table"));

    let items = collected
        .iter()
        .find(|s| s.value("table_rows") == Some(5400.0))
        .unwrap();
    assert_eq!(
        items.labels().get("table_name").map(String::as_str),
        Some("order_items")
    );

    let diagnostics = reporter.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(
        &diagnostics[0].error,
        CollectorError::Conversion { field, value, .. } if field == "table_rows" && value.is_empty()
    ));

    source.close().await.unwrap();
}

#[tokio::test]
async fn test_unknown_table_reported() {
    let source = Arc::new(seeded_source().await);
    let samples = Arc::new(Samples::new());
    let reporter = Arc::new(CapturingReporter::new());
    let dispatcher = QueryDispatcher::new(source.clone(), samples.clone(), reporter.clone());

    let queries = vec![
        QueryDefinition::new("missing", "SELECT x FROM nonexistent_table_xyz")
            .with_metric_fields(["x"]),
        QueryDefinition::new("count", "SELECT COUNT(*) AS n FROM table_stats")
            .with_metric_fields(["n"]),
    ];

    dispatcher.dispatch(&queries, &CancellationToken::new()).await;

    let collected = samples.snapshot();
    assert_eq!(collected.len(), 1);
    assert_eq!(collected[0].value("n"), Some(3.0));

    let diagnostics = reporter.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(diagnostics[0].error, CollectorError::Query(_)));
    assert_eq!(
        diagnostics[0].query.as_deref(),
        Some("SELECT x FROM nonexistent_table_xyz")
    );
}

//! Collection cycle tests against the mock data source.

use std::sync::Arc;
use std::time::Duration;

use db_sampler::collector::QueryDispatcher;
use db_sampler::config::QueryDefinition;
use db_sampler::db::{FetchedRow, MockDataSource, MockResponse};
use db_sampler::error::CollectorError;
use db_sampler::report::{CapturingReporter, Severity};
use db_sampler::sink::Samples;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

fn row(pairs: &[(&str, &str)]) -> FetchedRow {
    pairs.iter().copied().collect()
}

struct Cycle {
    samples: Arc<Samples>,
    reporter: Arc<CapturingReporter>,
    dispatcher: QueryDispatcher,
}

fn cycle(source: MockDataSource) -> Cycle {
    let samples = Arc::new(Samples::new());
    let reporter = Arc::new(CapturingReporter::new());
    let dispatcher = QueryDispatcher::new(Arc::new(source), samples.clone(), reporter.clone());
    Cycle {
        samples,
        reporter,
        dispatcher,
    }
}

/// Scenario: one query out of several times out
/// Given N definitions where one query never finishes within its timeout
/// When the cycle is dispatched
/// Then dispatch returns
/// And every other query's samples are emitted
/// And exactly one timeout is reported, carrying the slow query's text
#[tokio::test(start_paused = true)]
async fn test_timeout_does_not_block_siblings() {
    let mut source = MockDataSource::new().with_response(
        "SELECT SLEEP(3600)",
        MockResponse::rows(vec![row(&[("value", "1")])]).with_delay(Duration::from_secs(3600)),
    );
    let mut queries = vec![QueryDefinition::new("slow", "SELECT SLEEP(3600)")
        .with_metric_fields(["value"])
        .with_timeout(Duration::from_secs(2))];

    for i in 0..4 {
        let sql = format!("SELECT {i} AS value");
        source = source.with_response(
            sql.as_str(),
            MockResponse::rows(vec![row(&[("value", i.to_string().as_str())])]),
        );
        queries.push(
            QueryDefinition::new(format!("fast_{i}"), sql)
                .with_metric_fields(["value"])
                .with_timeout(Duration::from_secs(2)),
        );
    }

    let c = cycle(source);
    c.dispatcher.dispatch(&queries, &CancellationToken::new()).await;

    let mut names: Vec<String> = c
        .samples
        .snapshot()
        .iter()
        .map(|s| s.name().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["fast_0", "fast_1", "fast_2", "fast_3"]);

    let diagnostics = c.reporter.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].severity, Severity::Error);
    assert_eq!(
        diagnostics[0].error,
        CollectorError::timeout(Duration::from_secs(2))
    );
    assert_eq!(diagnostics[0].query.as_deref(), Some("SELECT SLEEP(3600)"));
}

/// Scenario: a non-numeric metric field next to a numeric one
/// Given a row where `bad` is "abc" and `good` is "42.5"
/// When the cycle is dispatched
/// Then exactly one sample is emitted, for `good`
/// And exactly one diagnostic names `bad` and its raw value
#[tokio::test]
async fn test_non_numeric_field_reports_once() {
    let source = MockDataSource::new().with_response(
        "q",
        MockResponse::rows(vec![row(&[("bad", "abc"), ("good", "42.5")])]),
    );
    let queries = vec![QueryDefinition::new("m", "q").with_metric_fields(["bad", "good"])];

    let c = cycle(source);
    c.dispatcher.dispatch(&queries, &CancellationToken::new()).await;

    let samples = c.samples.snapshot();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].value("good"), Some(42.5));

    let diagnostics = c.reporter.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    let context = diagnostics[0].context();
    assert!(context.contains(&("field", "bad".to_string())));
    assert!(context.contains(&("value", "abc".to_string())));
    assert!(context.contains(&("query", "q".to_string())));
}

/// Scenario: failing queries are isolated
/// Given one query that the server rejects and one that succeeds
/// When the cycle is dispatched
/// Then the successful query's samples are emitted
/// And the failure is reported with its query text
#[tokio::test]
async fn test_execution_failure_is_isolated() {
    let source = MockDataSource::new()
        .with_response("SELEC oops", MockResponse::failure("You have an error in your SQL syntax"))
        .with_response(
            "SELECT 1 AS up",
            MockResponse::rows(vec![row(&[("up", "1")])]),
        );
    let queries = vec![
        QueryDefinition::new("broken", "SELEC oops").with_metric_fields(["v"]),
        QueryDefinition::new("mysql", "SELECT 1 AS up").with_metric_fields(["up"]),
    ];

    let c = cycle(source);
    c.dispatcher.dispatch(&queries, &CancellationToken::new()).await;

    let samples = c.samples.snapshot();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].name(), "mysql");

    let diagnostics = c.reporter.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(diagnostics[0].error, CollectorError::Query(_)));
    assert_eq!(diagnostics[0].query.as_deref(), Some("SELEC oops"));
}

/// Scenario: field_to_append splits one query into per-row series
/// Given a query whose `volume` column varies per row
/// When the cycle is dispatched
/// Then each row's sample is named after its sanitized volume
/// And labels have spaces replaced with underscores
#[tokio::test]
async fn test_field_to_append_names_series() {
    let source = MockDataSource::new().with_response(
        "disks",
        MockResponse::rows(vec![
            row(&[("Volume", "Disk (C:) % Used"), ("Pct", "73"), ("Host", "db one")]),
            row(&[("Volume", "Data/Logs"), ("Pct", "12"), ("Host", "db one")]),
        ]),
    );
    let queries = vec![QueryDefinition::new("measurement", "disks")
        .with_metric_fields(["pct"])
        .with_label_fields(["host"])
        .with_field_to_append("volume")];

    let c = cycle(source);
    c.dispatcher.dispatch(&queries, &CancellationToken::new()).await;

    let samples = c.samples.snapshot();
    let names: Vec<&str> = samples.iter().map(|s| s.name()).collect();
    assert_eq!(
        names,
        vec!["measurement_disk_c_percent_used", "measurement_datalogs"]
    );
    for sample in &samples {
        assert_eq!(
            sample.labels().get("host").map(String::as_str),
            Some("db_one")
        );
    }
    assert!(c.reporter.is_empty());
}

/// Scenario: a timeout too large to represent as an instant
/// Given a definition whose timeout is `u64::MAX` seconds
/// When the cycle is dispatched
/// Then the query runs without a deadline and its sample is emitted
#[tokio::test]
async fn test_huge_timeout_does_not_abort_query() {
    let source = MockDataSource::new().with_response(
        "q",
        MockResponse::rows(vec![row(&[("value", "1")])]),
    );
    let queries = vec![QueryDefinition::new("m", "q")
        .with_metric_fields(["value"])
        .with_timeout(Duration::from_secs(u64::MAX))];

    let c = cycle(source);
    c.dispatcher.dispatch(&queries, &CancellationToken::new()).await;

    assert_eq!(c.samples.len(), 1);
    assert!(c.reporter.is_empty());
}

/// Scenario: zero definitions
/// When an empty cycle is dispatched
/// Then nothing is emitted and nothing is reported
#[tokio::test]
async fn test_empty_cycle() {
    let c = cycle(MockDataSource::new());
    c.dispatcher.dispatch(&[], &CancellationToken::new()).await;

    assert!(c.samples.is_empty());
    assert!(c.reporter.is_empty());
}

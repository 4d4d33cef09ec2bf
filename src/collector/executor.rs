//! Single-query execution under a deadline.
//!
//! Runs one query definition against the data source, streams its rows
//! through the row mapper, and reports every failure instead of returning it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::mapper::map_row;
use crate::config::QueryDefinition;
use crate::db::DataSource;
use crate::error::{CollectorError, Result};
use crate::report::{Diagnostic, Reporter};
use crate::sink::SampleSink;

/// Counters for one query execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Rows handed to the mapper.
    pub rows: usize,
    /// Samples appended to the sink.
    pub samples: usize,
    /// Metric fields that failed to convert.
    pub rejected: usize,
    /// Whether the query was abandoned (timeout, execution or read failure, cancellation).
    pub failed: bool,
}

/// Executes query definitions one at a time; cheap to clone across tasks.
#[derive(Clone)]
pub struct QueryExecutor {
    source: Arc<dyn DataSource>,
    sink: Arc<dyn SampleSink>,
    reporter: Arc<dyn Reporter>,
}

impl QueryExecutor {
    /// Creates a new query executor.
    pub fn new(
        source: Arc<dyn DataSource>,
        sink: Arc<dyn SampleSink>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            source,
            sink,
            reporter,
        }
    }

    /// Returns the reporter diagnostics go to.
    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.reporter
    }

    /// Runs one definition to completion.
    ///
    /// The deadline is the definition's timeout measured from this call; a
    /// timeout too large to represent as an instant leaves the query unbounded.
    /// Cancelling `cancel` abandons the query the same way an expired
    /// deadline does. Failures are reported, never returned.
    pub async fn run(&self, definition: &QueryDefinition, cancel: CancellationToken) -> QueryStats {
        let deadline = Instant::now().checked_add(definition.timeout);
        let mut stats = QueryStats::default();

        if let Err(error) = self.execute(definition, deadline, &cancel, &mut stats).await {
            stats.failed = true;
            let diagnostic = match error {
                CollectorError::Cancelled => Diagnostic::warn(error),
                error => Diagnostic::error(error),
            };
            self.reporter
                .report(diagnostic.with_query(definition.request.as_str()));
        }

        debug!(
            measurement = %definition.measurement,
            rows = stats.rows,
            samples = stats.samples,
            rejected = stats.rejected,
            failed = stats.failed,
            "Query finished"
        );
        stats
    }

    async fn execute(
        &self,
        definition: &QueryDefinition,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
        stats: &mut QueryStats,
    ) -> Result<()> {
        let timeout = definition.timeout;
        let mut rows = bounded(
            deadline,
            timeout,
            cancel,
            self.source.query(&definition.request),
        )
        .await??;

        while let Some(row) = bounded(deadline, timeout, cancel, rows.next()).await? {
            let row = row?;
            stats.rows += 1;

            let mapped = map_row(&row, definition, self.sink.as_ref());
            stats.samples += mapped.emitted;
            stats.rejected += mapped.rejected.len();

            for error in mapped.rejected {
                self.reporter
                    .report(Diagnostic::error(error).with_query(definition.request.as_str()));
            }
        }

        Ok(())
    }
}

/// Awaits `fut` unless the deadline passes or the token is cancelled first.
async fn bounded<F: Future>(
    deadline: Option<Instant>,
    timeout: Duration,
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output> {
    let limited = async {
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| CollectorError::timeout(timeout)),
            None => Ok(fut.await),
        }
    };

    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(CollectorError::Cancelled),
        result = limited => result,
    }
}

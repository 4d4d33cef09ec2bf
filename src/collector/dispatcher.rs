//! Concurrent fan-out of query definitions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::executor::QueryExecutor;
use crate::config::QueryDefinition;
use crate::db::DataSource;
use crate::error::CollectorError;
use crate::report::{Diagnostic, Reporter};
use crate::sink::SampleSink;

/// Runs every query definition of a cycle in its own task.
#[derive(Clone)]
pub struct QueryDispatcher {
    executor: QueryExecutor,
}

impl QueryDispatcher {
    /// Creates a dispatcher over a shared data source, sink and reporter.
    pub fn new(
        source: Arc<dyn DataSource>,
        sink: Arc<dyn SampleSink>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            executor: QueryExecutor::new(source, sink, reporter),
        }
    }

    /// Executes all definitions concurrently and waits for every one.
    ///
    /// Each task gets a child of `cancel` and its own deadline, so one
    /// query timing out or failing never affects its siblings. Outcomes are
    /// visible only through the sink and the reporter.
    pub async fn dispatch(&self, queries: &[QueryDefinition], cancel: &CancellationToken) {
        if queries.is_empty() {
            return;
        }

        let mut tasks = JoinSet::new();
        let mut requests = HashMap::with_capacity(queries.len());
        for definition in queries {
            let executor = self.executor.clone();
            let task_definition = definition.clone();
            let cancel = cancel.child_token();
            let handle = tasks.spawn(async move { executor.run(&task_definition, cancel).await });
            requests.insert(handle.id(), definition.request.clone());
        }

        let mut completed = 0;
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok(_) => completed += 1,
                Err(e) => {
                    let mut diagnostic = Diagnostic::error(CollectorError::internal(format!(
                        "query task failed: {e}"
                    )));
                    if let Some(request) = requests.remove(&e.id()) {
                        diagnostic = diagnostic.with_query(request);
                    }
                    self.executor.reporter().report(diagnostic);
                }
            }
        }

        debug!(queries = queries.len(), completed, "Collection cycle finished");
    }
}

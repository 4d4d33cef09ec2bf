//! Mock data source for testing.
//!
//! Serves scripted rows, delays and failures keyed by query text, so the
//! collector can be exercised without a database.

use super::{DataSource, FetchedRow, RowStream};
use crate::error::{CollectorError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted behavior for one query text.
#[derive(Debug, Clone, Default)]
pub struct MockResponse {
    rows: Vec<FetchedRow>,
    delay: Duration,
    row_delay: Duration,
    failure: Option<String>,
    row_failure: Option<(usize, String)>,
}

impl MockResponse {
    /// Responds with the given rows.
    pub fn rows(rows: Vec<FetchedRow>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    /// Fails execution with the given message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Default::default()
        }
    }

    /// Waits before execution completes.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Waits before yielding each row.
    pub fn with_row_delay(mut self, delay: Duration) -> Self {
        self.row_delay = delay;
        self
    }

    /// Fails to read the row at `index`, after the preceding rows were yielded.
    pub fn with_row_failure(mut self, index: usize, message: impl Into<String>) -> Self {
        self.row_failure = Some((index, message.into()));
        self
    }
}

/// A data source that returns predefined results.
#[derive(Debug, Default)]
pub struct MockDataSource {
    responses: HashMap<String, MockResponse>,
    executed: AtomicUsize,
}

impl MockDataSource {
    /// Creates a mock with no scripted queries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the response for a query text.
    pub fn with_response(mut self, sql: impl Into<String>, response: MockResponse) -> Self {
        self.responses.insert(sql.into(), response);
        self
    }

    /// Number of queries started so far.
    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for MockDataSource {
    async fn query<'a>(&'a self, sql: &'a str) -> Result<RowStream<'a>> {
        self.executed.fetch_add(1, Ordering::SeqCst);

        let response = self
            .responses
            .get(sql)
            .ok_or_else(|| CollectorError::query(format!("no mock response for: {sql}")))?;

        if !response.delay.is_zero() {
            tokio::time::sleep(response.delay).await;
        }
        if let Some(message) = &response.failure {
            return Err(CollectorError::query(message.clone()));
        }

        let mut items: Vec<Result<FetchedRow>> = response.rows.iter().cloned().map(Ok).collect();
        if let Some((index, message)) = &response.row_failure {
            items.truncate(*index);
            items.push(Err(CollectorError::row_read(message.clone())));
        }

        let row_delay = response.row_delay;
        let rows = futures::stream::iter(items)
            .then(move |item| async move {
                if !row_delay.is_zero() {
                    tokio::time::sleep(row_delay).await;
                }
                item
            })
            .boxed();
        Ok(rows)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

//! sqlx-backed data source.
//!
//! Provides the `SqlxSource` struct that implements the `DataSource` trait
//! for MySQL, PostgreSQL and SQLite pools. Queries run through the text
//! protocol (`sqlx::raw_sql`), so every column arrives in its textual form
//! regardless of its SQL type.

use crate::config::ConnectionConfig;
use crate::db::{DataSource, DatabaseBackend, FetchedRow, RowStream};
use crate::error::{CollectorError, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{Column, ColumnIndex, Decode, Row};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum number of connection attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between connection attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// How long a query waits for a pooled connection.
const ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Connection pool for one of the supported backends.
#[derive(Debug, Clone)]
enum Pool {
    MySql(MySqlPool),
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

/// Data source backed by a sqlx connection pool.
#[derive(Debug, Clone)]
pub struct SqlxSource {
    pool: Pool,
}

impl From<MySqlPool> for SqlxSource {
    fn from(pool: MySqlPool) -> Self {
        Self {
            pool: Pool::MySql(pool),
        }
    }
}

impl From<PgPool> for SqlxSource {
    fn from(pool: PgPool) -> Self {
        Self {
            pool: Pool::Postgres(pool),
        }
    }
}

impl From<SqlitePool> for SqlxSource {
    fn from(pool: SqlitePool) -> Self {
        Self {
            pool: Pool::Sqlite(pool),
        }
    }
}

impl SqlxSource {
    /// Connects a pool for the configured backend.
    ///
    /// Transient failures (refused or reset connections, timeouts) are
    /// retried with exponential backoff; anything else fails immediately.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;
        let max_connections = config.max_connections.max(1);
        let acquire_timeout = Duration::from_secs(ACQUIRE_TIMEOUT_SECS);

        let source = match config.backend() {
            DatabaseBackend::MySql => connect_with_retry(|| {
                MySqlPoolOptions::new()
                    .max_connections(max_connections)
                    .acquire_timeout(acquire_timeout)
                    .connect(&conn_str)
            })
            .await
            .map(Self::from),
            DatabaseBackend::Postgres => connect_with_retry(|| {
                PgPoolOptions::new()
                    .max_connections(max_connections)
                    .acquire_timeout(acquire_timeout)
                    .connect(&conn_str)
            })
            .await
            .map(Self::from),
            DatabaseBackend::Sqlite => connect_with_retry(|| {
                SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .acquire_timeout(acquire_timeout)
                    .connect(&conn_str)
            })
            .await
            .map(Self::from),
        };

        source.map_err(|e| map_connection_error(e, config))
    }

    /// Returns the backend this source talks to.
    pub fn backend(&self) -> DatabaseBackend {
        match self.pool {
            Pool::MySql(_) => DatabaseBackend::MySql,
            Pool::Postgres(_) => DatabaseBackend::Postgres,
            Pool::Sqlite(_) => DatabaseBackend::Sqlite,
        }
    }
}

#[async_trait]
impl DataSource for SqlxSource {
    async fn query<'a>(&'a self, sql: &'a str) -> Result<RowStream<'a>> {
        let rows = match &self.pool {
            Pool::MySql(pool) => sqlx::raw_sql(sql)
                .fetch(pool)
                .map_err(|e| CollectorError::query(format_query_error(e)))
                .and_then(|row| futures::future::ready(materialize(&row)))
                .boxed(),
            Pool::Postgres(pool) => sqlx::raw_sql(sql)
                .fetch(pool)
                .map_err(|e| CollectorError::query(format_query_error(e)))
                .and_then(|row| futures::future::ready(materialize(&row)))
                .boxed(),
            Pool::Sqlite(pool) => sqlx::raw_sql(sql)
                .fetch(pool)
                .map_err(|e| CollectorError::query(format_query_error(e)))
                .and_then(|row| futures::future::ready(materialize(&row)))
                .boxed(),
        };
        Ok(rows)
    }

    async fn close(&self) -> Result<()> {
        match &self.pool {
            Pool::MySql(pool) => pool.close().await,
            Pool::Postgres(pool) => pool.close().await,
            Pool::Sqlite(pool) => pool.close().await,
        }
        Ok(())
    }
}

/// Reads every column of a row as text, lowercasing column names.
///
/// Decoding is unchecked: text-protocol values are already strings, and
/// SQLite converts numeric storage classes to text on request.
fn materialize<R>(row: &R) -> Result<FetchedRow>
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> Option<String>: Decode<'r, R::Database>,
{
    let mut fetched = FetchedRow::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let value: Option<String> = row.try_get_unchecked(index).map_err(|e| {
            CollectorError::row_read(format!("failed to read column '{}': {e}", column.name()))
        })?;
        fetched.insert(column.name(), value.unwrap_or_default());
    }
    Ok(fetched)
}

/// Runs a connection attempt, retrying transient failures with backoff.
async fn connect_with_retry<P, F, Fut>(mut attempt_connect: F) -> std::result::Result<P, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<P, sqlx::Error>>,
{
    let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
    let mut attempt = 1;

    loop {
        debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

        match attempt_connect().await {
            Ok(pool) => {
                debug!("Successfully connected to database");
                return Ok(pool);
            }
            Err(e) if attempt < MAX_RETRY_ATTEMPTS && is_transient_error(&e) => {
                warn!(
                    "Connection attempt {} failed (transient error), retrying in {:?}",
                    attempt, delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Determines if a connection error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    if matches!(error, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) {
        return true;
    }

    let error_str = error.to_string().to_lowercase();
    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps sqlx connection errors to operator-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> CollectorError {
    let target = config.display_string();
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        CollectorError::connection(format!(
            "Cannot connect to {target}. Check that the server is running."
        ))
    } else if error_str.contains("access denied") || error_str.contains("authentication failed") {
        CollectorError::connection(format!(
            "Authentication failed for {target}. Check your credentials."
        ))
    } else if error_str.contains("unknown database")
        || (error_str.contains("does not exist") && error_str.contains("database"))
    {
        CollectorError::connection(format!("Database for {target} does not exist."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        CollectorError::connection(format!(
            "Connection to {target} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        CollectorError::connection(error.to_string())
    }
}

/// Formats a query error, keeping the server's message and code when present.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => match db_error.code() {
            Some(code) => format!("ERROR {code}: {}", db_error.message()),
            None => format!("ERROR: {}", db_error.message()),
        },
        None => error.to_string(),
    }
}

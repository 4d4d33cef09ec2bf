//! Data source abstraction for db-sampler.
//!
//! Provides a trait-based interface for running parameterless text queries
//! and streaming their rows, allowing the collector to run against any sqlx
//! backend or an in-memory mock.

mod mock;
mod sqlx_source;
mod types;

pub use mock::{MockDataSource, MockResponse};
pub use sqlx_source::SqlxSource;
pub use types::{FetchedRow, RowStream};

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    MySql,
    Postgres,
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the backend as a string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "postgres" | "postgresql" => Some(Self::Postgres),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Returns the default port for this backend.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Postgres => 5432,
            Self::Sqlite => 0,
        }
    }

    /// Returns the URL scheme for this backend.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }
}

impl std::str::FromStr for DatabaseBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!("Invalid backend: {s}. Expected: mysql, postgres, or sqlite")
        })
    }
}

/// Creates a data source for the given configuration.
pub async fn connect(config: &ConnectionConfig) -> Result<SqlxSource> {
    SqlxSource::connect(config).await
}

/// Trait defining the interface for queryable data sources.
///
/// Implementations must allow concurrent independent queries through a
/// shared reference.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Executes a query and returns its rows as a stream.
    ///
    /// Execution errors may surface either here or as the first stream item.
    async fn query<'a>(&'a self, sql: &'a str) -> Result<RowStream<'a>>;

    /// Closes the underlying connections.
    async fn close(&self) -> Result<()>;
}

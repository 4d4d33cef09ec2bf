//! Error types for db-sampler.
//!
//! Defines the main error enum used throughout the collector. Per-query
//! failures never escape a collection cycle; they are wrapped in a
//! [`Diagnostic`](crate::report::Diagnostic) and handed to a reporter.

use std::time::Duration;
use thiserror::Error;

/// Main error type for db-sampler operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollectorError {
    /// The query did not finish before its deadline.
    #[error("Query timed out after {}", humantime::format_duration(*timeout))]
    Timeout { timeout: Duration },

    /// The data source rejected or failed the query (syntax, permissions, connectivity).
    #[error("Query error: {0}")]
    Query(String),

    /// A row could not be materialized while streaming results.
    #[error("Row read error: {0}")]
    RowRead(String),

    /// A metric field value is not a finite number.
    #[error("Failed to convert field '{field}' value {value:?}: {reason}")]
    Conversion {
        field: String,
        value: String,
        reason: String,
    },

    /// The collection cycle was cancelled while the query was in flight.
    #[error("Query cancelled")]
    Cancelled,

    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (panicked tasks, unexpected states).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CollectorError {
    /// Creates a timeout error for the given deadline.
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }

    /// Creates a query execution error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a row read error with the given message.
    pub fn row_read(msg: impl Into<String>) -> Self {
        Self::RowRead(msg.into())
    }

    /// Creates a field conversion error.
    pub fn conversion(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Conversion {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "Timeout",
            Self::Query(_) => "Query Error",
            Self::RowRead(_) => "Row Read Error",
            Self::Conversion { .. } => "Conversion Error",
            Self::Cancelled => "Cancelled",
            Self::Connection(_) => "Connection Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using CollectorError.
pub type Result<T> = std::result::Result<T, CollectorError>;

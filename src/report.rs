//! Diagnostic reporting.
//!
//! The collector never logs directly; every failure is turned into a
//! [`Diagnostic`] and passed to an injected [`Reporter`]. The binary uses
//! [`TracingReporter`], tests use [`CapturingReporter`].

use crate::error::CollectorError;
use std::sync::{Mutex, PoisonError};
use tracing::{error, warn};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warn,
    Error,
}

/// One reported failure plus the context needed to diagnose it.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub error: CollectorError,
    /// Text of the query the failure belongs to, if any.
    pub query: Option<String>,
}

impl Diagnostic {
    /// Creates an error-level diagnostic.
    pub fn error(error: CollectorError) -> Self {
        Self {
            severity: Severity::Error,
            error,
            query: None,
        }
    }

    /// Creates a warning-level diagnostic.
    pub fn warn(error: CollectorError) -> Self {
        Self {
            severity: Severity::Warn,
            error,
            query: None,
        }
    }

    /// Attaches the query text.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Human-readable message.
    pub fn message(&self) -> String {
        self.error.to_string()
    }

    /// Column name and raw value of a failed field conversion.
    pub fn conversion_input(&self) -> Option<(&str, &str)> {
        match &self.error {
            CollectorError::Conversion { field, value, .. } => {
                Some((field.as_str(), value.as_str()))
            }
            _ => None,
        }
    }

    /// Contextual key/value pairs: query text, column name and raw value as applicable.
    pub fn context(&self) -> Vec<(&'static str, String)> {
        let mut context = Vec::new();
        if let Some(query) = &self.query {
            context.push(("query", query.clone()));
        }
        if let Some((field, value)) = self.conversion_input() {
            context.push(("field", field.to_string()));
            context.push(("value", value.to_string()));
        }
        context
    }
}

/// Receiver of diagnostics.
pub trait Reporter: Send + Sync {
    /// Reports one diagnostic.
    fn report(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing` as structured events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, diagnostic: Diagnostic) {
        let query = diagnostic.query.as_deref();
        let category = diagnostic.error.category();
        let (field, value) = diagnostic.conversion_input().unzip();
        let message = diagnostic.message();

        match diagnostic.severity {
            Severity::Warn => warn!(category, query, field, value, "{message}"),
            Severity::Error => error!(category, query, field, value, "{message}"),
        }
    }
}

/// Records diagnostics in memory.
#[derive(Debug, Default)]
pub struct CapturingReporter {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl CapturingReporter {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything reported so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of diagnostics reported so far.
    pub fn len(&self) -> usize {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if nothing has been reported.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Reporter for CapturingReporter {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }
}

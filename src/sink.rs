//! Metric samples and the sink that collects them.
//!
//! A [`SampleSink`] receives every sample derived during a collection cycle.
//! [`Samples`] is the in-process implementation: an append-only buffer that
//! many query tasks write to concurrently.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Label name to label value.
pub type Labels = BTreeMap<String, String>;

/// Field name to numeric value.
pub type Fields = BTreeMap<String, f64>;

/// One emitted measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    name: String,
    fields: Fields,
    labels: Labels,
}

impl MetricSample {
    /// Creates a sample.
    pub fn new(name: impl Into<String>, fields: Fields, labels: Labels) -> Self {
        Self {
            name: name.into(),
            fields,
            labels,
        }
    }

    /// Metric name (measurement plus optional suffix).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field values carried by the sample.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Labels attached to the sample.
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Returns the value of a single field.
    pub fn value(&self, field: &str) -> Option<f64> {
        self.fields.get(field).copied()
    }

    /// Renders the sample as one line per field:
    /// `name_field{label="value",...} 42`.
    pub fn render(&self) -> String {
        let labels = if self.labels.is_empty() {
            String::new()
        } else {
            let pairs: Vec<String> = self
                .labels
                .iter()
                .map(|(k, v)| format!("{k}=\"{}\"", escape_label(v)))
                .collect();
            format!("{{{}}}", pairs.join(","))
        };

        let mut out = String::new();
        for (field, value) in &self.fields {
            let _ = writeln!(out, "{}_{}{} {}", self.name, field, labels, value);
        }
        out
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Receiver of emitted samples.
///
/// Implementations must accept concurrent appends from many tasks.
pub trait SampleSink: Send + Sync {
    /// Appends one sample.
    fn add_metric(&self, name: &str, fields: Fields, labels: Labels);
}

/// Append-only, thread-safe sample buffer.
#[derive(Debug, Default)]
pub struct Samples {
    inner: Mutex<Vec<MetricSample>>,
}

impl Samples {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MetricSample>> {
        // Appends are single pushes, so a poisoned buffer is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of buffered samples.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copies the buffered samples.
    pub fn snapshot(&self) -> Vec<MetricSample> {
        self.lock().clone()
    }

    /// Takes the buffered samples, leaving the buffer empty.
    pub fn drain(&self) -> Vec<MetricSample> {
        std::mem::take(&mut *self.lock())
    }
}

impl SampleSink for Samples {
    fn add_metric(&self, name: &str, fields: Fields, labels: Labels) {
        self.lock().push(MetricSample::new(name, fields, labels));
    }
}

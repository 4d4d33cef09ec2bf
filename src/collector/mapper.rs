//! Row-to-sample mapping.
//!
//! Turns one fetched row into one sample per configured metric field.

use super::convert::to_float;
use super::sanitize::sanitize_name;
use crate::config::QueryDefinition;
use crate::db::FetchedRow;
use crate::error::CollectorError;
use crate::sink::{Fields, Labels, SampleSink};

/// What mapping a single row produced.
#[derive(Debug, Default, PartialEq)]
pub struct MappedRow {
    /// Samples appended to the sink.
    pub emitted: usize,
    /// Metric fields skipped because their value did not convert.
    pub rejected: Vec<CollectorError>,
}

/// Builds the label set for a row.
///
/// Only label fields present in the row are included; spaces in values are
/// replaced by underscores.
pub fn build_labels(row: &FetchedRow, definition: &QueryDefinition) -> Labels {
    definition
        .label_fields
        .iter()
        .filter_map(|name| {
            row.get(name)
                .map(|value| (name.clone(), value.replace(' ', "_")))
        })
        .collect()
}

/// Returns the metric name for a row.
pub fn metric_name(row: &FetchedRow, definition: &QueryDefinition) -> String {
    match definition.append_field() {
        None => definition.measurement.clone(),
        Some(column) => {
            let suffix = sanitize_name(row.get(column).unwrap_or_default());
            format!("{}_{}", definition.measurement, suffix)
        }
    }
}

/// Maps one row, appending a sample to `sink` for every metric field whose
/// value converts.
///
/// A field that fails to convert is skipped and returned in
/// [`MappedRow::rejected`]; labels and the remaining fields are unaffected.
pub fn map_row(row: &FetchedRow, definition: &QueryDefinition, sink: &dyn SampleSink) -> MappedRow {
    let labels = build_labels(row, definition);
    let name = metric_name(row, definition);
    let mut mapped = MappedRow::default();

    for field in &definition.metric_fields {
        let raw = row.get(field).unwrap_or_default();
        match to_float(field, raw) {
            Ok(value) => {
                let fields = Fields::from([(field.clone(), value)]);
                sink.add_metric(&name, fields, labels.clone());
                mapped.emitted += 1;
            }
            Err(e) => mapped.rejected.push(e),
        }
    }

    mapped
}

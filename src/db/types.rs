//! Row types for db-sampler.
//!
//! Defines the text-only row representation handed from the data source to
//! the row mapper.

use crate::error::Result;
use futures::stream::BoxStream;
use serde::Serialize;
use std::borrow::Cow;

/// A stream of materialized rows from one query.
///
/// Dropping the stream abandons the query.
pub type RowStream<'a> = BoxStream<'a, Result<FetchedRow>>;

/// One result row with every column rendered as raw text.
///
/// Column names are lowercased when inserted, so lookups are
/// case-insensitive. Column order is preserved. SQL NULL is stored as an
/// empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchedRow {
    columns: Vec<(String, String)>,
}

impl FetchedRow {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty row with room for `capacity` columns.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Inserts a column value, normalizing the column name to lowercase.
    ///
    /// A repeated column name keeps its first position and takes the new value.
    pub fn insert(&mut self, column: &str, value: impl Into<String>) {
        let column = column.to_lowercase();
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.columns.push((column, value)),
        }
    }

    /// Returns the raw text of a column, if present.
    pub fn get(&self, column: &str) -> Option<&str> {
        let column = normalize(column);
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Returns true if the row has the given column.
    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Iterates over `(column, value)` pairs in result-set order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

fn normalize(column: &str) -> Cow<'_, str> {
    if column.chars().any(char::is_uppercase) {
        Cow::Owned(column.to_lowercase())
    } else {
        Cow::Borrowed(column)
    }
}

impl<K, V> FromIterator<(K, V)> for FetchedRow
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Self::new();
        for (column, value) in iter {
            row.insert(column.as_ref(), value);
        }
        row
    }
}

//! Text-to-number conversion for metric fields.

use crate::error::{CollectorError, Result};

/// Converts the raw text of a metric field to a finite `f64`.
///
/// Besides plain numbers, the switch words servers report in status tables
/// (`ON`/`OFF`, `YES`/`NO`, `true`/`false`) map to 1 and 0.
pub fn to_float(field: &str, raw: &str) -> Result<f64> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(CollectorError::conversion(field, raw, "empty value"));
    }

    if let Ok(value) = text.parse::<f64>() {
        if value.is_finite() {
            return Ok(value);
        }
        return Err(CollectorError::conversion(field, raw, "value is not finite"));
    }

    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Ok(1.0),
        "false" | "no" | "off" => Ok(0.0),
        _ => Err(CollectorError::conversion(field, raw, "not a number")),
    }
}

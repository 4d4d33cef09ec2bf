//! Metric-name sanitization.

/// Turns an arbitrary column value into a metric-name fragment.
///
/// Spaces become underscores, `(` `)` `/` `*` `:` are dropped, `%` becomes
/// `percent`, and the result is lowercased. Applying it twice is the same
/// as applying it once.
pub fn sanitize_name(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ' ' => out.push('_'),
            '(' | ')' | '/' | '*' | ':' => {}
            '%' => out.push_str("percent"),
            c => out.extend(c.to_lowercase()),
        }
    }
    out
}

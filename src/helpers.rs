//! Shared helpers for turning raw reduction results into metric values.
//!
//! The raster source answers `null` when nothing intersects the polygon and
//! time window (cloud cover, no radar pass). Every such answer becomes `0.0`
//! before it reaches a `MetricsRecord`; the prescription thresholds are
//! calibrated against that convention, so "no observation" and "observed zero"
//! are deliberately indistinguishable downstream.

/// Collapse an optional reduction result to a metric value.
///
/// `None` and non-finite values (NaN, ±Inf) both become `0.0`.
pub(crate) fn or_zero(v: Option<f64>) -> f64 {
    match v {
        Some(x) if x.is_finite() => x,
        Some(x) => {
            tracing::warn!("or_zero received non-finite value {}, defaulting to 0", x);
            0.0
        }
        None => 0.0,
    }
}

/// Keep only finite values of a series, preserving order.
pub(crate) fn finite_values(values: impl IntoIterator<Item = Option<f64>>) -> Vec<f64> {
    values
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect()
}

/// Escape text for inclusion in an HTML body.
pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

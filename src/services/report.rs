//! Daily report rendering (subject line and HTML body).

use chrono::{DateTime, Utc};

use crate::helpers::escape_html;
use crate::services::metrics::MetricsRecord;
use crate::services::prescription::{max_severity, Prescription, Severity};

/// Alert panel border colour, driven by the most severe prescription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightColor {
    Red,
    Orange,
    Green,
}

impl HighlightColor {
    pub fn for_prescriptions(prescriptions: &[Prescription]) -> Self {
        match max_severity(prescriptions) {
            Severity::Urgent => HighlightColor::Red,
            Severity::Alert => HighlightColor::Orange,
            Severity::Action | Severity::Info => HighlightColor::Green,
        }
    }

    pub fn hex(&self) -> &'static str {
        match self {
            HighlightColor::Red => "#d32f2f",
            HighlightColor::Orange => "#f57c00",
            HighlightColor::Green => "#388e3c",
        }
    }
}

pub struct RenderedReport {
    pub subject: String,
    pub html_body: String,
}

pub fn render(
    farm_name: &str,
    analyzed_at: DateTime<Utc>,
    metrics: &MetricsRecord,
    prescriptions: &[Prescription],
) -> RenderedReport {
    let date = analyzed_at.format("%d/%m/%Y").to_string();
    let name = escape_html(farm_name);
    let color = HighlightColor::for_prescriptions(prescriptions).hex();

    let items: String = prescriptions
        .iter()
        .map(|p| format!("<li>{}</li>", escape_html(&p.message)))
        .collect();

    let html_body = format!(
        r#"<html>
<body style="font-family: Arial, sans-serif; color: #333;">
  <h2>CropWatch Daily Report</h2>
  <p><strong>Farm:</strong> {name}<br><strong>Date:</strong> {date}</p>
  <table style="border-collapse: collapse;">
    <tr><td>Precipitation (7 days)</td><td>{p7:.1} mm</td></tr>
    <tr><td>Precipitation (30 days)</td><td>{p30:.1} mm</td></tr>
    <tr><td>NDVI (vigor)</td><td>{ndvi:.3}</td></tr>
    <tr><td>NBR (burn ratio)</td><td>{nbr:.3}</td></tr>
    <tr><td>RVI (radar vegetation)</td><td>{rvi:.3}</td></tr>
    <tr><td>VV backscatter (mean)</td><td>{vv:.3} dB</td></tr>
  </table>
  <div style="border: 3px solid {color}; padding: 12px; margin-top: 16px;">
    <h3>Prescriptions</h3>
    <ul>{items}</ul>
  </div>
</body>
</html>"#,
        p7 = metrics.precipitation_7d,
        p30 = metrics.precipitation_30d,
        ndvi = metrics.ndvi_mean,
        nbr = metrics.nbr_mean,
        rvi = metrics.rvi_mean,
        vv = metrics.vv_mean,
    );

    RenderedReport {
        subject: format!("CropWatch - Daily Report {} - {}", farm_name, date),
        html_body,
    }
}

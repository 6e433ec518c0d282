use super::{format_optional, DailySummary, ExportError};
use std::io::Write;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "N")]
    samples: usize,
    #[tabled(rename = "Average")]
    average: String,
    #[tabled(rename = "Range")]
    range: String,
    #[tabled(rename = "Total")]
    sum: String,
    #[tabled(rename = "History Avg")]
    history: String,
}

#[derive(Tabled)]
struct DerivedRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "RMSSD")]
    rmssd: String,
    #[tabled(rename = "NN50")]
    nn50: String,
    #[tabled(rename = "pNN50")]
    pnn50: String,
    #[tabled(rename = "MeanRR")]
    mean_rr: String,
    #[tabled(rename = "MxDMn")]
    mxdmn: String,
    #[tabled(rename = "CV")]
    cv: String,
}

fn int(value: Option<i64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Render the metric table, followed by a derived HRV table when any day has one
pub fn render(summaries: &[DailySummary]) -> String {
    let metric_rows: Vec<MetricRow> = summaries
        .iter()
        .flat_map(|summary| {
            summary.metrics.iter().map(move |m| MetricRow {
                date: summary.date.format("%Y-%m-%d").to_string(),
                metric: format!("{} ({})", m.category, m.unit),
                samples: m.samples,
                average: format_optional(m.average),
                range: match (m.min, m.max) {
                    (Some(min), Some(max)) => format!("{} - {}", min, max),
                    _ => "-".to_string(),
                },
                sum: format_optional(m.sum),
                history: format_optional(m.history_average),
            })
        })
        .collect();

    let mut output = if metric_rows.is_empty() {
        "No metrics selected\n".to_string()
    } else {
        format!("{}\n", Table::new(metric_rows).with(Style::rounded()))
    };

    let derived_rows: Vec<DerivedRow> = summaries
        .iter()
        .filter_map(|summary| {
            summary.derived_hrv.map(|d| DerivedRow {
                date: summary.date.format("%Y-%m-%d").to_string(),
                rmssd: int(d.rmssd),
                nn50: int(d.nn50),
                pnn50: d.pnn50.map_or_else(|| "-".to_string(), |v| format!("{:.1}%", v * 100.0)),
                mean_rr: int(d.mean_rr),
                mxdmn: int(d.mxdmn),
                cv: int(d.cv),
            })
        })
        .collect();

    if !derived_rows.is_empty() {
        output.push_str("\nDerived HRV\n");
        output.push_str(&Table::new(derived_rows).with(Style::rounded()).to_string());
        output.push('\n');
    }

    output
}

/// Write the rendered tables
pub fn write_summaries<W: Write>(summaries: &[DailySummary], mut writer: W) -> Result<(), ExportError> {
    writer.write_all(render(summaries).as_bytes())?;
    writer.flush()?;
    Ok(())
}

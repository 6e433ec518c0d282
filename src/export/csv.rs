use super::{DailySummary, ExportError};
use crate::models::HrvDerivedMetrics;
use csv::Writer;
use rust_decimal::Decimal;
use std::io::Write;

const HEADER: [&str; 9] = [
    "date",
    "metric",
    "unit",
    "samples",
    "average",
    "min",
    "max",
    "sum",
    "history_average",
];

fn cell(value: Option<Decimal>) -> String {
    value.map_or_else(String::new, |v| v.to_string())
}

/// Write summaries as CSV, one row per day and metric
///
/// Derived HRV indices follow each day's metrics as extra rows named after the
/// index, with the value in the `average` column.
pub fn write_summaries<W: Write>(summaries: &[DailySummary], writer: W) -> Result<(), ExportError> {
    let mut writer = Writer::from_writer(writer);
    writer.write_record(HEADER)?;

    for summary in summaries {
        let date = summary.date.format("%Y-%m-%d").to_string();

        for metric in &summary.metrics {
            writer.write_record(&[
                date.clone(),
                metric.category.to_string(),
                metric.unit.clone(),
                metric.samples.to_string(),
                cell(metric.average),
                cell(metric.min),
                cell(metric.max),
                cell(metric.sum),
                cell(metric.history_average),
            ])?;
        }

        if let Some(derived) = &summary.derived_hrv {
            for (name, unit, value) in derived_rows(derived) {
                writer.write_record(&[
                    date.clone(),
                    name.to_string(),
                    unit.to_string(),
                    String::new(),
                    value,
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                ])?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}

fn derived_rows(derived: &HrvDerivedMetrics) -> Vec<(&'static str, &'static str, String)> {
    let int = |v: Option<i64>| v.map_or_else(String::new, |v| v.to_string());
    vec![
        ("RMSSD", "ms", int(derived.rmssd)),
        ("NN50", "count", int(derived.nn50)),
        ("pNN50", "fraction", derived.pnn50.map_or_else(String::new, |v| format!("{:.4}", v))),
        ("MeanRR", "ms", int(derived.mean_rr)),
        ("MxDMn", "ms", int(derived.mxdmn)),
        ("CV", "%", int(derived.cv)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::summaries;
    use crate::export::tests::sample_record;
    use crate::models::SampleCategory;

    #[test]
    fn test_csv_rows() {
        let records = vec![sample_record()];
        let data = summaries(&records, &[SampleCategory::HeartRate, SampleCategory::StepCount]);

        let mut buffer = Vec::new();
        write_summaries(&data, &mut buffer).unwrap();
        let content = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "date,metric,unit,samples,average,min,max,sum,history_average");
        assert_eq!(lines[1], "2025-03-01,Heart Rate,count/min,2,70,60,80,,");
        assert_eq!(lines[2], "2025-03-01,Step Count,count,1,4200,4200,4200,4200,");
        assert!(lines[3].starts_with("2025-03-01,RMSSD,ms,,79"));
        assert_eq!(lines.len(), 3 + 6);
    }

    #[test]
    fn test_csv_empty() {
        let mut buffer = Vec::new();
        write_summaries(&[], &mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap().lines().count(), 1);
    }
}

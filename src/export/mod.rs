use crate::daily::{DailyRecord, DailySeries};
use crate::models::{HrvDerivedMetrics, SampleCategory};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

pub mod csv;
pub mod json;
pub mod text;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Text,
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "text" | "txt" | "table" => Ok(ExportFormat::Text),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] ::csv::Error),
}

/// Aggregates of one category for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub category: SampleCategory,
    pub unit: String,
    pub samples: usize,
    pub average: Option<Decimal>,
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
    /// Only for cumulative categories
    pub sum: Option<Decimal>,
    /// Two-level average over the attached history days
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_average: Option<Decimal>,
}

/// Flattened view of a [`DailyRecord`] for output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub metrics: Vec<MetricSummary>,
    /// Mean of the derived HRV indices attached to the day's HRV samples
    pub derived_hrv: Option<HrvDerivedMetrics>,
    /// Number of history days attached to the record
    pub history_days: usize,
}

impl DailySummary {
    /// Summarise the given categories of a record
    pub fn from_record(record: &DailyRecord, categories: &[SampleCategory]) -> Self {
        let history = record.past_records.as_slice();

        let metrics = categories
            .iter()
            .map(|&category| {
                let range = record.range(category);
                MetricSummary {
                    category,
                    unit: category.unit().to_string(),
                    samples: record.samples(category).len(),
                    average: record.average(category),
                    min: range.map(|r| r.min),
                    max: range.map(|r| r.max),
                    sum: record.sum(category),
                    history_average: if history.is_empty() {
                        None
                    } else {
                        history.average(category)
                    },
                }
            })
            .collect();

        DailySummary {
            date: record.day(),
            metrics,
            derived_hrv: record.avg_derived_hrv(),
            history_days: history.len(),
        }
    }

    pub fn metric(&self, category: SampleCategory) -> Option<&MetricSummary> {
        self.metrics.iter().find(|m| m.category == category)
    }
}

/// Summaries for a run of records, in the same order
pub fn summaries(records: &[DailyRecord], categories: &[SampleCategory]) -> Vec<DailySummary> {
    records
        .iter()
        .map(|record| DailySummary::from_record(record, categories))
        .collect()
}

/// Write summaries in the chosen format
pub fn write_summaries<W: Write>(
    summaries: &[DailySummary],
    format: ExportFormat,
    writer: W,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Json => json::write_json(summaries, writer),
        ExportFormat::Csv => csv::write_summaries(summaries, writer),
        ExportFormat::Text => text::write_summaries(summaries, writer),
    }
}

/// Write summaries to a file
pub fn export_summaries<P: AsRef<Path>>(
    summaries: &[DailySummary],
    format: ExportFormat,
    output_path: P,
) -> Result<(), ExportError> {
    if format == ExportFormat::Json {
        return json::export_json(summaries, output_path);
    }

    let file = std::fs::File::create(output_path)?;
    write_summaries(summaries, format, std::io::BufWriter::new(file))
}

/// Render an optional decimal, `-` when absent
pub(crate) fn format_optional(value: Option<Decimal>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

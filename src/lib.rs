// Library interface for quickhealth modules
// This allows integration tests and benchmarks to access the core functionality

pub mod aggregation;
pub mod bucketing;
pub mod config;
pub mod daily;
pub mod error;
pub mod export;
pub mod intervals;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod source;

// Re-export commonly used types for convenience
pub use aggregation::{SampleAggregator, ValueRange};
pub use bucketing::{DayBucketer, DayCalendar};
pub use config::{AppConfig, RequestConfiguration};
pub use daily::{DailyRecord, DailySeries};
pub use error::{FetchError, HealthError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use models::{sort_by_display_time, HrvDerivedMetrics, Sample, SampleCategory};
pub use orchestrator::AggregationOrchestrator;
pub use source::{MemorySampleSource, SampleSource, SeriesHandle};

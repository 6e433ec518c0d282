//! Sample acquisition boundary
//!
//! The aggregation engine never talks to a health store directly; it queries an
//! injected [`SampleSource`]. [`MemorySampleSource`] serves recorded data from memory
//! (loaded from a JSON dataset) and backs the CLI, tests and benchmarks.

use crate::error::{FetchError, HealthError, Result};
use crate::intervals::{collect_beat_timestamps, BeatEvent};
use crate::models::{sort_in_place, Sample, SampleCategory};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Opaque reference to one heartbeat series in the source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesHandle(pub String);

impl fmt::Display for SeriesHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata of a heartbeat series; its beats are fetched separately
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatSeriesSample {
    pub handle: SeriesHandle,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl BeatSeriesSample {
    pub fn display_time(&self) -> DateTime<Utc> {
        self.end_time
    }
}

/// Provider of raw health samples
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Samples of one category whose display time lies in `[start, end]`,
    /// ordered by display time
    async fn fetch(
        &self,
        category: SampleCategory,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        ascending: bool,
    ) -> Result<Vec<Sample>>;

    /// Heartbeat series recorded in `[start, end]`, in the same order the
    /// matching HRV samples would be returned
    async fn fetch_beat_series(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        ascending: bool,
    ) -> Result<Vec<BeatSeriesSample>>;

    /// Beat times of one series in milliseconds since the series started
    async fn fetch_raw_beat_timestamps(&self, series: &SeriesHandle) -> Result<Vec<f64>>;

    /// Whether the underlying store can be queried on this system
    fn is_available(&self) -> bool {
        true
    }
}

/// One recorded heartbeat series with its beats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedBeatSeries {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub beats: Vec<BeatEvent>,
}

impl RecordedBeatSeries {
    pub fn metadata(&self) -> BeatSeriesSample {
        BeatSeriesSample {
            handle: SeriesHandle(self.id.clone()),
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// On-disk dataset format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub samples: Vec<Sample>,
    #[serde(default)]
    pub beat_series: Vec<RecordedBeatSeries>,
}

/// In-memory sample store
#[derive(Debug, Clone, Default)]
pub struct MemorySampleSource {
    samples: Vec<Sample>,
    beat_series: Vec<RecordedBeatSeries>,
    failing: HashSet<SampleCategory>,
    unavailable: bool,
}

impl MemorySampleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dataset(dataset: Dataset) -> Self {
        Self {
            samples: dataset.samples,
            beat_series: dataset.beat_series,
            ..Self::default()
        }
    }

    /// Parse a JSON dataset
    pub fn from_json_str(json: &str) -> Result<Self> {
        let dataset: Dataset = serde_json::from_str(json)?;
        Ok(Self::from_dataset(dataset))
    }

    /// Load a JSON dataset from disk
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let source = Self::from_json_str(&content)?;
        debug!(
            "Loaded {} samples and {} beat series from {}",
            source.samples.len(),
            source.beat_series.len(),
            path.as_ref().display()
        );
        Ok(source)
    }

    pub fn with_samples(mut self, samples: impl IntoIterator<Item = Sample>) -> Self {
        self.samples.extend(samples);
        self
    }

    pub fn with_beat_series(mut self, series: RecordedBeatSeries) -> Self {
        self.beat_series.push(series);
        self
    }

    /// Make every fetch of `category` fail
    pub fn with_failing_category(mut self, category: SampleCategory) -> Self {
        self.failing.insert(category);
        self
    }

    /// Report the store as unavailable and refuse every query
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            Err(HealthError::SourceUnavailable(
                "in-memory store is switched off".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Earliest and latest display time of all stored samples
    pub fn time_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.samples.iter().map(Sample::display_time).min()?;
        let last = self.samples.iter().map(Sample::display_time).max()?;
        Some((first, last))
    }
}

fn within(at: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    start <= at && at <= end
}

#[async_trait]
impl SampleSource for MemorySampleSource {
    async fn fetch(
        &self,
        category: SampleCategory,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        ascending: bool,
    ) -> Result<Vec<Sample>> {
        self.check_available()?;
        if self.failing.contains(&category) {
            return Err(FetchError::Failed {
                category,
                reason: "query rejected by store".to_string(),
            }
            .into());
        }

        let mut samples: Vec<Sample> = self
            .samples
            .iter()
            .filter(|s| s.category == category && within(s.display_time(), start, end))
            .cloned()
            .collect();
        sort_in_place(&mut samples, ascending);
        Ok(samples)
    }

    async fn fetch_beat_series(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        ascending: bool,
    ) -> Result<Vec<BeatSeriesSample>> {
        self.check_available()?;
        let mut series: Vec<BeatSeriesSample> = self
            .beat_series
            .iter()
            .map(RecordedBeatSeries::metadata)
            .filter(|s| within(s.display_time(), start, end))
            .collect();

        if ascending {
            series.sort_by(|a, b| a.display_time().cmp(&b.display_time()));
        } else {
            series.sort_by(|a, b| b.display_time().cmp(&a.display_time()));
        }
        Ok(series)
    }

    async fn fetch_raw_beat_timestamps(&self, series: &SeriesHandle) -> Result<Vec<f64>> {
        self.check_available()?;
        let recorded = self
            .beat_series
            .iter()
            .find(|s| s.id == series.0)
            .ok_or_else(|| FetchError::MalformedSeries {
                series: series.to_string(),
                reason: "unknown series".to_string(),
            })?;

        Ok(collect_beat_timestamps(&recorded.beats))
    }

    fn is_available(&self) -> bool {
        !self.unavailable
    }
}

impl From<Dataset> for MemorySampleSource {
    fn from(dataset: Dataset) -> Self {
        Self::from_dataset(dataset)
    }
}

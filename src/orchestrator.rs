//! Request orchestration: concurrent fetches, HRV correlation, day bucketing
//!
//! One request runs in three stages, each joined before the next starts:
//!
//! 1. one tokio task per enabled category fetches its samples, and (when derived
//!    HRV is requested) one task per heartbeat series fetches and analyzes beats;
//! 2. derived HRV results are attached to the HRV samples by position;
//! 3. the collections are bucketed into [`DailyRecord`]s.
//!
//! A failing fetch never fails the request. It is logged at the level its
//! [`severity`](HealthError::severity) maps to, and the affected category (or
//! heartbeat series) is treated as having no data.
//!
//! Sources are queried for exactly the requested range; only the records are
//! snapped to whole local days.

use crate::bucketing::{DayBucketer, DayCalendar};
use crate::config::RequestConfiguration;
use crate::daily::DailyRecord;
use crate::error::{HealthError, Result};
use crate::intervals;
use crate::models::{HrvDerivedMetrics, Sample, SampleCategory};
use crate::source::SampleSource;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn, Level};

/// Default number of history days attached by [`AggregationOrchestrator::aggregate_with_history`]
pub const DEFAULT_HISTORY_DAYS: u32 = 30;

/// Aggregates samples from an injected source into daily records
#[derive(Clone)]
pub struct AggregationOrchestrator {
    source: Arc<dyn SampleSource>,
    bucketer: DayBucketer,
    history_days: u32,
}

impl AggregationOrchestrator {
    pub fn new(source: Arc<dyn SampleSource>, calendar: DayCalendar) -> Self {
        Self {
            source,
            bucketer: DayBucketer::new(calendar),
            history_days: DEFAULT_HISTORY_DAYS,
        }
    }

    pub fn with_history_days(mut self, days: u32) -> Self {
        self.history_days = days;
        self
    }

    pub fn history_days(&self) -> u32 {
        self.history_days
    }

    pub fn calendar(&self) -> &DayCalendar {
        self.bucketer.calendar()
    }

    /// Fail early when the source cannot be queried at all
    pub fn ensure_available(&self) -> Result<()> {
        if self.source.is_available() {
            Ok(())
        } else {
            Err(HealthError::SourceUnavailable(
                "the sample source reports no data access".to_string(),
            ))
        }
    }

    /// Daily records for every local day in `[start, end]`
    pub async fn aggregate(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        config: &RequestConfiguration,
        ascending: bool,
    ) -> Vec<DailyRecord> {
        let started = Instant::now();
        let (start, end) = if start <= end { (start, end) } else { (end, start) };

        let (mut collections, derived) = tokio::join!(
            self.fetch_collections(config, start, end, ascending),
            self.fetch_derived_hrv(config, start, end, ascending),
        );

        if !derived.is_empty() {
            if let Some(hrv) = collections.get_mut(&SampleCategory::HrvSdnn) {
                correlate_derived_hrv(hrv, &derived);
            }
        }

        let category_count = collections.len();
        let bucketer = self.bucketer;
        // grouping fans out on rayon, off the async workers
        let records = match tokio::task::spawn_blocking(move || {
            bucketer.bucket(start, end, &collections, ascending)
        })
        .await
        {
            Ok(records) => records,
            Err(e) => {
                error!("Bucketing task did not complete: {}", e);
                bucketer.bucket(start, end, &BTreeMap::new(), ascending)
            }
        };

        info!(
            "Aggregated {} categories into {} days in {:?}",
            category_count,
            records.len(),
            started.elapsed()
        );

        records
    }

    /// Record for a single local calendar day
    ///
    /// A day without any samples yields an empty record for that day.
    pub async fn aggregate_day(
        &self,
        day: NaiveDate,
        config: &RequestConfiguration,
        ascending: bool,
    ) -> DailyRecord {
        let calendar = self.calendar();
        let start = calendar.day_start(day);
        let end = calendar.day_end(day);

        self.aggregate(start.with_timezone(&Utc), end.with_timezone(&Utc), config, ascending)
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| DailyRecord::new(start, end))
    }

    /// Daily records for `[start, end]`, each carrying the records of the
    /// preceding [`history_days`](Self::history_days) days as `past_records`
    pub async fn aggregate_with_history(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        config: &RequestConfiguration,
        ascending: bool,
    ) -> Vec<DailyRecord> {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let days = self.history_days as usize;

        if days == 0 {
            return self.aggregate(start, end, config, ascending).await;
        }

        let calendar = self.calendar();
        let first_day = calendar.day_key(start);
        let history_start = calendar
            .day_start(first_day - Duration::days(i64::from(self.history_days)))
            .with_timezone(&Utc);
        let history_end = calendar
            .day_end(first_day - Duration::days(1))
            .with_timezone(&Utc);

        let (mut history, mut primary) = tokio::join!(
            self.aggregate(history_start, history_end, config, ascending),
            self.aggregate(start, end, config, ascending),
        );
        if !ascending {
            history.reverse();
            primary.reverse();
        }

        // oldest first: history days, then the requested days
        let offset = history.len();
        let mut timeline = history;
        timeline.append(&mut primary);

        let mut records: Vec<DailyRecord> = (offset..timeline.len())
            .map(|i| {
                let mut record = timeline[i].clone();
                record.past_records = timeline[i.saturating_sub(days)..i].to_vec();
                record
            })
            .collect();
        if !ascending {
            records.reverse();
        }

        debug!(
            "Attached up to {} history days to {} records",
            days,
            records.len()
        );
        records
    }

    async fn fetch_collections(
        &self,
        config: &RequestConfiguration,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        ascending: bool,
    ) -> BTreeMap<SampleCategory, Vec<Sample>> {
        let categories = config.enabled_categories();

        let handles: Vec<_> = categories
            .iter()
            .map(|&category| {
                let source = Arc::clone(&self.source);
                tokio::spawn(async move { source.fetch(category, start, end, ascending).await })
            })
            .collect();

        let results = join_all(handles).await;

        categories
            .into_iter()
            .zip(results)
            .map(|(category, result)| {
                let samples = match result {
                    Ok(Ok(samples)) => {
                        debug!("Fetched {} {} samples", samples.len(), category);
                        samples
                    }
                    Ok(Err(e)) => {
                        log_absorbed(&format!("Treating {} as empty", category), &e);
                        Vec::new()
                    }
                    Err(e) => {
                        warn!("Fetch task for {} did not complete: {}", category, e);
                        Vec::new()
                    }
                };
                (category, samples)
            })
            .collect()
    }

    /// Derived HRV metrics per heartbeat series, in series order
    async fn fetch_derived_hrv(
        &self,
        config: &RequestConfiguration,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        ascending: bool,
    ) -> Vec<Option<HrvDerivedMetrics>> {
        if !config.hrv_derived {
            return Vec::new();
        }

        let series = match self.source.fetch_beat_series(start, end, ascending).await {
            Ok(series) => series,
            Err(e) => {
                log_absorbed("Skipping derived HRV", &e);
                return Vec::new();
            }
        };

        let handles: Vec<_> = series
            .into_iter()
            .map(|series| {
                let source = Arc::clone(&self.source);
                tokio::spawn(async move {
                    match source.fetch_raw_beat_timestamps(&series.handle).await {
                        Ok(timestamps) => intervals::analyze(&timestamps),
                        Err(e) => {
                            log_absorbed(&format!("No beats for series {}", series.handle), &e);
                            None
                        }
                    }
                })
            })
            .collect();

        let derived: Vec<Option<HrvDerivedMetrics>> = join_all(handles)
            .await
            .into_iter()
            .map(|result| {
                result.unwrap_or_else(|e| {
                    warn!("Heartbeat series task did not complete: {}", e);
                    None
                })
            })
            .collect();

        debug!(
            "Derived HRV for {} of {} heartbeat series",
            derived.iter().filter(|d| d.is_some()).count(),
            derived.len()
        );
        derived
    }
}

/// Log an error that the request absorbs as missing data
fn log_absorbed(context: &str, err: &HealthError) {
    if err.severity().to_tracing_level() == Level::ERROR {
        error!("{}: {}", context, err);
    } else {
        warn!("{}: {}", context, err);
    }
}

/// Attach derived metrics to HRV samples by position
///
/// Only sensor-recorded samples take part: the i-th sample that was not entered
/// manually receives `derived[i]`, or nothing once the results run out. Manually
/// entered samples are left without derived metrics.
pub fn correlate_derived_hrv(hrv: &mut [Sample], derived: &[Option<HrvDerivedMetrics>]) {
    let mut results = derived.iter();
    for sample in hrv.iter_mut().filter(|s| !s.was_user_entered) {
        sample.attach_derived_hrv(results.next().copied().flatten());
    }
}

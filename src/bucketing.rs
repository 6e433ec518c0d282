//! Calendar-day bucketing of fetched sample collections
//!
//! Samples are assigned to the local calendar day containing their display time.
//! Grouping runs once per category on the rayon pool; the per-category results are
//! joined before any [`DailyRecord`] is assembled.

use crate::daily::DailyRecord;
use crate::models::{Sample, SampleCategory};
use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, Offset, Utc};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::debug;

/// Local day boundaries for a fixed UTC offset
///
/// The offset is captured once; a request spanning a daylight-saving change keeps
/// the offset it started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCalendar {
    offset: FixedOffset,
}

impl Default for DayCalendar {
    fn default() -> Self {
        Self::local()
    }
}

impl DayCalendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Calendar of the machine's current local offset
    pub fn local() -> Self {
        Self::new(Local::now().offset().fix())
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Calendar for an offset east of UTC in minutes, `None` when out of range
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Local calendar day of an instant
    pub fn day_key(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Local midnight of a calendar day
    pub fn day_start(&self, day: NaiveDate) -> DateTime<FixedOffset> {
        let utc = day.and_time(NaiveTime::MIN)
            - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        DateTime::from_naive_utc_and_offset(utc, self.offset)
    }

    /// Last representable instant of a calendar day
    pub fn day_end(&self, day: NaiveDate) -> DateTime<FixedOffset> {
        self.day_start(day) + Duration::days(1) - Duration::nanoseconds(1)
    }

    pub fn start_of_day(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        self.day_start(self.day_key(at))
    }

    pub fn end_of_day(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        self.day_end(self.day_key(at))
    }

    /// Signed number of calendar days from `start` to `end`
    pub fn days_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        (self.day_key(end) - self.day_key(start)).num_days()
    }
}

type DayBuckets = HashMap<NaiveDate, Vec<Sample>>;

/// Builds one [`DailyRecord`] per calendar day of a range
#[derive(Debug, Clone, Copy, Default)]
pub struct DayBucketer {
    calendar: DayCalendar,
}

impl DayBucketer {
    pub fn new(calendar: DayCalendar) -> Self {
        Self { calendar }
    }

    pub fn calendar(&self) -> &DayCalendar {
        &self.calendar
    }

    /// Split the collections into daily records covering `[start, end]`
    ///
    /// Every day of the range gets a record, with an empty collection for each
    /// category that has no sample that day. Records are ordered by day, ascending
    /// or descending. Samples outside the range are dropped.
    pub fn bucket(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        collections: &BTreeMap<SampleCategory, Vec<Sample>>,
        ascending: bool,
    ) -> Vec<DailyRecord> {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let first_day = self.calendar.day_key(start);
        let last_day = self.calendar.day_key(end);
        let day_count = self.calendar.days_between(start, end).abs();

        let mut grouped: Vec<(SampleCategory, DayBuckets)> = collections
            .par_iter()
            .map(|(&category, samples)| (category, self.group_by_day(samples)))
            .collect();

        let mut records = VecDeque::with_capacity(day_count as usize + 1);
        for offset in 0..=day_count {
            let day = last_day - Duration::days(offset);
            let mut record = DailyRecord::new(self.calendar.day_start(day), self.calendar.day_end(day));

            for (category, buckets) in grouped.iter_mut() {
                record.add(*category, buckets.remove(&day).unwrap_or_default());
            }

            if ascending {
                records.push_front(record);
            } else {
                records.push_back(record);
            }
        }

        debug!(
            "Bucketed {} categories into {} days ({} to {})",
            collections.len(),
            records.len(),
            first_day,
            last_day
        );

        records.into()
    }

    fn group_by_day(&self, samples: &[Sample]) -> DayBuckets {
        let mut buckets = DayBuckets::new();
        for sample in samples {
            buckets
                .entry(self.calendar.day_key(sample.display_time()))
                .or_default()
                .push(sample.clone());
        }
        buckets
    }
}

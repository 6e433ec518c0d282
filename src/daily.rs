use crate::aggregation::{SampleAggregator, ValueRange};
use crate::models::{HrvDerivedMetrics, Sample, SampleCategory};
use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Samples of one local calendar day, grouped by category
///
/// Records are created empty with their day boundaries and then populated once per
/// category. Collections are stored unsorted; use
/// [`crate::models::sort_by_display_time`] when chronological order matters.
/// Two records are equal only if they share the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRecord {
    id: Uuid,

    /// Local midnight
    pub start_date: DateTime<FixedOffset>,

    /// Last instant of the local day
    pub end_date: DateTime<FixedOffset>,

    samples: BTreeMap<SampleCategory, Vec<Sample>>,

    /// Trailing history of preceding days, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub past_records: Vec<DailyRecord>,
}

impl PartialEq for DailyRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DailyRecord {}

impl DailyRecord {
    /// Create an empty record; every category starts with an empty collection
    pub fn new(start_date: DateTime<FixedOffset>, end_date: DateTime<FixedOffset>) -> Self {
        let samples = SampleCategory::ALL
            .iter()
            .map(|&category| (category, Vec::new()))
            .collect();

        DailyRecord {
            id: Uuid::new_v4(),
            start_date,
            end_date,
            samples,
            past_records: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Canonical timestamp of the record (end of day)
    pub fn display_date(&self) -> DateTime<FixedOffset> {
        self.end_date
    }

    /// Local calendar day covered by this record
    pub fn day(&self) -> NaiveDate {
        self.start_date.date_naive()
    }

    /// Set the samples of one category, replacing any earlier collection
    pub fn add(&mut self, category: SampleCategory, samples: Vec<Sample>) {
        self.samples.insert(category, samples);
    }

    /// Samples of one category (empty when none were recorded that day)
    pub fn samples(&self, category: SampleCategory) -> &[Sample] {
        self.samples
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether any category holds at least one sample
    pub fn has_data(&self) -> bool {
        self.samples.values().any(|s| !s.is_empty())
    }

    pub fn average(&self, category: SampleCategory) -> Option<Decimal> {
        SampleAggregator::average(category, self.samples(category))
    }

    pub fn range(&self, category: SampleCategory) -> Option<ValueRange> {
        SampleAggregator::range(category, self.samples(category))
    }

    pub fn sum(&self, category: SampleCategory) -> Option<Decimal> {
        SampleAggregator::sum(category, self.samples(category))
    }

    pub fn step_count(&self) -> Decimal {
        SampleAggregator::step_count(self.samples(SampleCategory::StepCount))
    }

    pub fn avg_hrv(&self) -> Option<Decimal> {
        self.average(SampleCategory::HrvSdnn)
    }

    pub fn hrv_range(&self) -> Option<ValueRange> {
        self.range(SampleCategory::HrvSdnn)
    }

    pub fn avg_hr(&self) -> Option<Decimal> {
        self.average(SampleCategory::HeartRate)
    }

    pub fn hr_range(&self) -> Option<ValueRange> {
        self.range(SampleCategory::HeartRate)
    }

    pub fn avg_rhr(&self) -> Option<Decimal> {
        self.average(SampleCategory::RestingHeartRate)
    }

    pub fn rhr_range(&self) -> Option<ValueRange> {
        self.range(SampleCategory::RestingHeartRate)
    }

    /// Field-wise mean of the derived HRV data attached to this day's HRV samples
    pub fn avg_derived_hrv(&self) -> Option<HrvDerivedMetrics> {
        HrvDerivedMetrics::average(
            self.samples(SampleCategory::HrvSdnn)
                .iter()
                .filter_map(Sample::derived_hrv),
        )
    }
}

/// Aggregation across several days
///
/// Averages are two-level: each day with data is reduced to its own average first,
/// then those daily averages are averaged, so a day with many samples weighs the
/// same as a day with few. Ranges, totals and derived HRV flatten the raw samples
/// of all days.
pub trait DailySeries {
    fn average(&self, category: SampleCategory) -> Option<Decimal>;
    fn range(&self, category: SampleCategory) -> Option<ValueRange>;
    fn sum(&self, category: SampleCategory) -> Option<Decimal>;
    fn step_count(&self) -> Decimal;
    fn avg_derived_hrv(&self) -> Option<HrvDerivedMetrics>;
}

impl DailySeries for [DailyRecord] {
    fn average(&self, category: SampleCategory) -> Option<Decimal> {
        let daily: Vec<Decimal> = self
            .iter()
            .filter_map(|record| record.average(category))
            .collect();
        SampleAggregator::mean_of(category, &daily)
    }

    fn range(&self, category: SampleCategory) -> Option<ValueRange> {
        SampleAggregator::range(category, &flatten(self, category))
    }

    fn sum(&self, category: SampleCategory) -> Option<Decimal> {
        SampleAggregator::sum(category, &flatten(self, category))
    }

    fn step_count(&self) -> Decimal {
        SampleAggregator::step_count(&flatten(self, SampleCategory::StepCount))
    }

    fn avg_derived_hrv(&self) -> Option<HrvDerivedMetrics> {
        HrvDerivedMetrics::average(
            self.iter()
                .flat_map(|record| record.samples(SampleCategory::HrvSdnn))
                .filter_map(Sample::derived_hrv),
        )
    }
}

fn flatten(records: &[DailyRecord], category: SampleCategory) -> Vec<Sample> {
    records
        .iter()
        .flat_map(|record| record.samples(category).iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn day_record(day: u32) -> DailyRecord {
        let offset = FixedOffset::east_opt(0).unwrap();
        let start = offset.with_ymd_and_hms(2025, 3, day, 0, 0, 0).unwrap();
        let end = start + Duration::days(1) - Duration::nanoseconds(1);
        DailyRecord::new(start, end)
    }

    fn hr_samples(day: u32, values: &[f64]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let at = Utc.with_ymd_and_hms(2025, 3, day, 8, i as u32, 0).unwrap();
                Sample::instant(SampleCategory::HeartRate, v, at)
            })
            .collect()
    }

    #[test]
    fn test_new_record_has_every_category_empty() {
        let record = day_record(1);
        for category in SampleCategory::ALL {
            assert!(record.samples(category).is_empty());
        }
        assert!(!record.has_data());
        assert_eq!(record.step_count(), Decimal::ZERO);
        assert_eq!(record.avg_hr(), None);
    }

    #[test]
    fn test_add_replaces_collection() {
        let mut record = day_record(1);
        record.add(SampleCategory::HeartRate, hr_samples(1, &[60.0, 62.0]));
        record.add(SampleCategory::HeartRate, hr_samples(1, &[80.0]));

        assert_eq!(record.samples(SampleCategory::HeartRate).len(), 1);
        assert_eq!(record.avg_hr(), Some(dec!(80)));
    }

    #[test]
    fn test_identity_equality() {
        let a = day_record(1);
        let b = day_record(1);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_two_level_average_is_not_sample_weighted() {
        let mut day_a = day_record(1);
        day_a.add(SampleCategory::HeartRate, hr_samples(1, &[60.0; 10]));
        let mut day_b = day_record(2);
        day_b.add(SampleCategory::HeartRate, hr_samples(2, &[80.0, 80.0]));
        let empty_day = day_record(3);

        let records = vec![day_a, day_b, empty_day];
        // (60 + 80) / 2, not (600 + 160) / 12
        assert_eq!(records.average(SampleCategory::HeartRate), Some(dec!(70)));
        assert_eq!(
            records.range(SampleCategory::HeartRate),
            Some(ValueRange { min: dec!(60), max: dec!(80) })
        );
    }

    #[test]
    fn test_cross_day_step_total_flattens() {
        let step = |day: u32, v: f64| {
            Sample::instant(
                SampleCategory::StepCount,
                v,
                Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap(),
            )
        };
        let mut day_a = day_record(1);
        day_a.add(SampleCategory::StepCount, vec![step(1, 1000.0), step(1, 500.0)]);
        let mut day_b = day_record(2);
        day_b.add(SampleCategory::StepCount, vec![step(2, 250.0)]);

        let records = vec![day_a, day_b];
        assert_eq!(records.step_count(), dec!(1750));
        assert_eq!(Vec::<DailyRecord>::new().step_count(), Decimal::ZERO);
    }

    #[test]
    fn test_avg_derived_hrv() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 7, 0, 0).unwrap();
        let mut record = day_record(1);
        record.add(
            SampleCategory::HrvSdnn,
            vec![
                Sample::instant(SampleCategory::HrvSdnn, 40.0, at).with_derived_hrv(
                    HrvDerivedMetrics { rmssd: Some(30), ..HrvDerivedMetrics::default() },
                ),
                Sample::instant(SampleCategory::HrvSdnn, 50.0, at).with_derived_hrv(
                    HrvDerivedMetrics { rmssd: Some(50), ..HrvDerivedMetrics::default() },
                ),
                Sample::instant(SampleCategory::HrvSdnn, 45.0, at),
            ],
        );

        let avg = record.avg_derived_hrv().unwrap();
        assert_eq!(avg.rmssd, Some(40));
        assert!(day_record(2).avg_derived_hrv().is_none());
    }
}

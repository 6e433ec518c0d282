use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Physiological sample categories understood by the aggregation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleCategory {
    HrvSdnn,
    HeartRate,
    RestingHeartRate,
    StepCount,
    BloodPressureSystolic,
    BloodPressureDiastolic,
    BodyMass,
    Height,
    Insulin,
    BloodGlucose,
    SoundExposure,
    RespiratoryRate,
    Distance,
    FlightsClimbed,
    ActiveEnergy,
    SleepAnalysis,
    MindfulSession,
}

impl SampleCategory {
    /// Every category, in declaration order
    pub const ALL: [SampleCategory; 17] = [
        SampleCategory::HrvSdnn,
        SampleCategory::HeartRate,
        SampleCategory::RestingHeartRate,
        SampleCategory::StepCount,
        SampleCategory::BloodPressureSystolic,
        SampleCategory::BloodPressureDiastolic,
        SampleCategory::BodyMass,
        SampleCategory::Height,
        SampleCategory::Insulin,
        SampleCategory::BloodGlucose,
        SampleCategory::SoundExposure,
        SampleCategory::RespiratoryRate,
        SampleCategory::Distance,
        SampleCategory::FlightsClimbed,
        SampleCategory::ActiveEnergy,
        SampleCategory::SleepAnalysis,
        SampleCategory::MindfulSession,
    ];

    /// Unit of the semantic value carried by samples of this category
    pub fn unit(&self) -> &'static str {
        match self {
            SampleCategory::HrvSdnn => "ms",
            SampleCategory::HeartRate
            | SampleCategory::RestingHeartRate
            | SampleCategory::RespiratoryRate => "count/min",
            SampleCategory::StepCount | SampleCategory::FlightsClimbed => "count",
            SampleCategory::BloodPressureSystolic | SampleCategory::BloodPressureDiastolic => {
                "mmHg"
            }
            SampleCategory::BodyMass => "kg",
            SampleCategory::Height => "cm",
            SampleCategory::Insulin => "IU",
            SampleCategory::BloodGlucose => "mmol/L",
            SampleCategory::SoundExposure => "dBASPL",
            SampleCategory::Distance => "m",
            SampleCategory::ActiveEnergy => "kcal",
            SampleCategory::SleepAnalysis | SampleCategory::MindfulSession => "min",
        }
    }

    /// Number of decimal places kept when averaging or displaying values
    pub fn scale(&self) -> u32 {
        match self {
            SampleCategory::BodyMass
            | SampleCategory::Height
            | SampleCategory::Insulin
            | SampleCategory::BloodGlucose
            | SampleCategory::RespiratoryRate
            | SampleCategory::Distance => 1,
            SampleCategory::ActiveEnergy => 2,
            _ => 0,
        }
    }

    /// Whether daily totals are meaningful for this category
    pub fn is_cumulative(&self) -> bool {
        matches!(
            self,
            SampleCategory::StepCount
                | SampleCategory::Insulin
                | SampleCategory::Distance
                | SampleCategory::FlightsClimbed
                | SampleCategory::ActiveEnergy
                | SampleCategory::SleepAnalysis
                | SampleCategory::MindfulSession
        )
    }

    /// Interval categories are measured by their duration, not their value
    pub fn is_duration_based(&self) -> bool {
        matches!(
            self,
            SampleCategory::SleepAnalysis | SampleCategory::MindfulSession
        )
    }
}

impl fmt::Display for SampleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleCategory::HrvSdnn => "HRV (SDNN)",
            SampleCategory::HeartRate => "Heart Rate",
            SampleCategory::RestingHeartRate => "Resting Heart Rate",
            SampleCategory::StepCount => "Step Count",
            SampleCategory::BloodPressureSystolic => "Blood Pressure Systolic",
            SampleCategory::BloodPressureDiastolic => "Blood Pressure Diastolic",
            SampleCategory::BodyMass => "Body Mass",
            SampleCategory::Height => "Height",
            SampleCategory::Insulin => "Insulin",
            SampleCategory::BloodGlucose => "Blood Glucose",
            SampleCategory::SoundExposure => "Sound Exposure",
            SampleCategory::RespiratoryRate => "Respiratory Rate",
            SampleCategory::Distance => "Distance",
            SampleCategory::FlightsClimbed => "Flights Climbed",
            SampleCategory::ActiveEnergy => "Active Energy",
            SampleCategory::SleepAnalysis => "Sleep Analysis",
            SampleCategory::MindfulSession => "Mindful Session",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for SampleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "hrv" | "hrv_sdnn" | "sdnn" => Ok(SampleCategory::HrvSdnn),
            "hr" | "heart_rate" => Ok(SampleCategory::HeartRate),
            "rhr" | "resting_heart_rate" => Ok(SampleCategory::RestingHeartRate),
            "steps" | "step_count" => Ok(SampleCategory::StepCount),
            "systolic" | "blood_pressure_systolic" => Ok(SampleCategory::BloodPressureSystolic),
            "diastolic" | "blood_pressure_diastolic" => {
                Ok(SampleCategory::BloodPressureDiastolic)
            }
            "weight" | "body_mass" => Ok(SampleCategory::BodyMass),
            "height" => Ok(SampleCategory::Height),
            "insulin" => Ok(SampleCategory::Insulin),
            "glucose" | "blood_glucose" => Ok(SampleCategory::BloodGlucose),
            "sound" | "sound_exposure" => Ok(SampleCategory::SoundExposure),
            "respiratory_rate" => Ok(SampleCategory::RespiratoryRate),
            "distance" => Ok(SampleCategory::Distance),
            "flights" | "flights_climbed" => Ok(SampleCategory::FlightsClimbed),
            "energy" | "active_energy" => Ok(SampleCategory::ActiveEnergy),
            "sleep" | "sleep_analysis" => Ok(SampleCategory::SleepAnalysis),
            "mindful" | "mindful_session" => Ok(SampleCategory::MindfulSession),
            _ => Err(format!("Unknown sample category: {}", s)),
        }
    }
}

/// HRV indices derived from one beat-to-beat series
///
/// Every field is independently optional: a field is `None` when the series did not
/// hold enough intervals for that index. Serializes with the canonical keys
/// `RMSSD, NN50, pNN50, MeanRR, MxDMn, CV`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HrvDerivedMetrics {
    /// Root mean square of successive differences (ms)
    #[serde(rename = "RMSSD")]
    pub rmssd: Option<i64>,

    /// Successive differences of at least 50 ms
    #[serde(rename = "NN50")]
    pub nn50: Option<i64>,

    /// NN50 as a fraction of all successive differences (not a percentage)
    #[serde(rename = "pNN50")]
    pub pnn50: Option<f64>,

    /// Mean beat-to-beat interval (ms)
    #[serde(rename = "MeanRR")]
    pub mean_rr: Option<i64>,

    /// Longest minus shortest interval (ms)
    #[serde(rename = "MxDMn")]
    pub mxdmn: Option<i64>,

    /// Coefficient of variation x100
    #[serde(rename = "CV")]
    pub cv: Option<i64>,
}

impl HrvDerivedMetrics {
    /// Field-wise mean over several derived results
    ///
    /// Each field averages only the results where it is present; integer fields are
    /// rounded half away from zero, pNN50 is kept as is. Returns `None` when the
    /// iterator is empty.
    pub fn average<'a, I>(metrics: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a HrvDerivedMetrics>,
    {
        let metrics: Vec<&HrvDerivedMetrics> = metrics.into_iter().collect();
        if metrics.is_empty() {
            return None;
        }

        fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
            let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            (count > 0).then(|| sum / count as f64)
        }

        let int_mean = |field: fn(&HrvDerivedMetrics) -> Option<i64>| {
            mean(metrics.iter().filter_map(|m| field(m)).map(|v| v as f64))
                .map(|avg| avg.round() as i64)
        };

        Some(HrvDerivedMetrics {
            rmssd: int_mean(|m| m.rmssd),
            nn50: int_mean(|m| m.nn50),
            pnn50: mean(metrics.iter().filter_map(|m| m.pnn50)),
            mean_rr: int_mean(|m| m.mean_rr),
            mxdmn: int_mean(|m| m.mxdmn),
            cv: int_mean(|m| m.cv),
        })
    }

    /// Canonical JSON representation
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl fmt::Display for HrvDerivedMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// A single time-stamped physiological data point
///
/// `value` is already converted to the category's semantic unit (see
/// [`SampleCategory::unit`]). The display time used for bucketing and sorting is
/// the end of the sample window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub category: SampleCategory,
    pub value: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    /// Logged manually rather than recorded by a sensor
    #[serde(default)]
    pub was_user_entered: bool,

    /// Set during correlation, never read from a source
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    derived_hrv: Option<HrvDerivedMetrics>,
}

impl Sample {
    /// Create a sample over `[start_time, end_time]`, swapping reversed bounds
    pub fn new(
        category: SampleCategory,
        value: f64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let (start_time, end_time) = if start_time <= end_time {
            (start_time, end_time)
        } else {
            (end_time, start_time)
        };

        Sample {
            category,
            value,
            start_time,
            end_time,
            was_user_entered: false,
            derived_hrv: None,
        }
    }

    /// Create a point-in-time sample
    pub fn instant(category: SampleCategory, value: f64, at: DateTime<Utc>) -> Self {
        Self::new(category, value, at, at)
    }

    /// Mark the sample as manually entered
    pub fn user_entered(mut self) -> Self {
        self.was_user_entered = true;
        self
    }

    /// Builder form of attaching derived HRV data
    pub fn with_derived_hrv(mut self, metrics: HrvDerivedMetrics) -> Self {
        self.derived_hrv = Some(metrics);
        self
    }

    pub(crate) fn attach_derived_hrv(&mut self, metrics: Option<HrvDerivedMetrics>) {
        self.derived_hrv = metrics;
    }

    pub fn derived_hrv(&self) -> Option<&HrvDerivedMetrics> {
        self.derived_hrv.as_ref()
    }

    /// Canonical timestamp for bucketing and sorting
    pub fn display_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Length of the sample window in minutes
    pub fn duration_minutes(&self) -> f64 {
        (self.end_time - self.start_time).num_milliseconds() as f64 / 60_000.0
    }

    /// Value used for aggregation: the duration for interval categories,
    /// the converted quantity otherwise
    pub fn semantic_value(&self) -> f64 {
        if self.category.is_duration_based() {
            self.duration_minutes()
        } else {
            self.value
        }
    }

    /// Closest candidate by display time, if it lies within `window`
    ///
    /// Typically used to pair an HRV reading with the heart rate recorded around it.
    pub fn nearest_within<'a>(&self, candidates: &'a [Sample], window: Duration) -> Option<&'a Sample> {
        let target = self.display_time();
        candidates
            .iter()
            .min_by_key(|c| (c.display_time() - target).abs())
            .filter(|c| (c.display_time() - target).abs() <= window)
    }
}

/// Default window for [`Sample::nearest_within`]
pub fn default_nearest_window() -> Duration {
    Duration::minutes(5)
}

/// Stable sort by display time
///
/// Ties keep their relative order in both directions, so sorting ascending,
/// descending and ascending again reproduces the first ascending order.
pub fn sort_by_display_time(samples: &[Sample], ascending: bool) -> Vec<Sample> {
    let mut sorted = samples.to_vec();
    sort_in_place(&mut sorted, ascending);
    sorted
}

/// In-place variant of [`sort_by_display_time`]
pub fn sort_in_place(samples: &mut [Sample], ascending: bool) {
    if ascending {
        samples.sort_by(|a, b| a.display_time().cmp(&b.display_time()));
    } else {
        samples.sort_by(|a, b| b.display_time().cmp(&a.display_time()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 27, h, m, 0).unwrap()
    }

    #[test]
    fn test_sample_swaps_reversed_window() {
        let sample = Sample::new(SampleCategory::SleepAnalysis, 1.0, at(8, 0), at(0, 0));
        assert!(sample.start_time <= sample.end_time);
        assert_eq!(sample.display_time(), at(8, 0));
        assert_eq!(sample.semantic_value(), 480.0);
    }

    #[test]
    fn test_derived_metrics_json_keys() {
        let metrics = HrvDerivedMetrics {
            rmssd: Some(79),
            nn50: Some(1),
            pnn50: Some(0.5),
            mean_rr: Some(850),
            mxdmn: Some(100),
            cv: None,
        };

        let json: serde_json::Value = serde_json::from_str(&metrics.to_json()).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        for key in ["RMSSD", "NN50", "pNN50", "MeanRR", "MxDMn", "CV"] {
            assert!(keys.contains(&key), "missing key {}", key);
        }
        assert!(json["CV"].is_null());
        assert_eq!(json["RMSSD"], 79);
    }

    #[test]
    fn test_derived_metrics_average() {
        let a = HrvDerivedMetrics {
            rmssd: Some(40),
            pnn50: Some(0.2),
            ..HrvDerivedMetrics::default()
        };
        let b = HrvDerivedMetrics {
            rmssd: Some(45),
            pnn50: Some(0.3),
            cv: Some(5),
            ..HrvDerivedMetrics::default()
        };

        let avg = HrvDerivedMetrics::average([&a, &b]).unwrap();
        assert_eq!(avg.rmssd, Some(43)); // 42.5 rounds away from zero
        assert!((avg.pnn50.unwrap() - 0.25).abs() < 1e-9);
        assert_eq!(avg.cv, Some(5));
        assert_eq!(avg.nn50, None);

        assert!(HrvDerivedMetrics::average(std::iter::empty()).is_none());
    }

    #[test]
    fn test_derived_metrics_average_rounds_instead_of_truncating() {
        let metrics = |rmssd, mean_rr, cv| HrvDerivedMetrics {
            rmssd: Some(rmssd),
            mean_rr: Some(mean_rr),
            cv: Some(cv),
            ..HrvDerivedMetrics::default()
        };
        let day = [metrics(42, 850, 10), metrics(43, 851, 11), metrics(42, 851, 11)];

        let avg = HrvDerivedMetrics::average(day.iter().take(2)).unwrap();
        // truncation would give 42 and 850
        assert_eq!(avg.rmssd, Some(43));
        assert_eq!(avg.mean_rr, Some(851));

        let avg = HrvDerivedMetrics::average(day.iter()).unwrap();
        // 42.33 and 10.67
        assert_eq!(avg.rmssd, Some(42));
        assert_eq!(avg.cv, Some(11));
    }

    #[test]
    fn test_sort_stability_round_trip() {
        let samples = vec![
            Sample::instant(SampleCategory::HeartRate, 60.0, at(9, 0)),
            Sample::instant(SampleCategory::HeartRate, 61.0, at(9, 0)),
            Sample::instant(SampleCategory::HeartRate, 70.0, at(10, 0)),
            Sample::instant(SampleCategory::HeartRate, 55.0, at(8, 0)),
        ];

        let ascending = sort_by_display_time(&samples, true);
        let descending = sort_by_display_time(&ascending, false);
        let again = sort_by_display_time(&descending, true);

        assert_eq!(ascending, again);
        assert_eq!(descending[0].value, 70.0);
        assert_eq!(ascending[0].value, 55.0);
    }

    #[test]
    fn test_nearest_within_window() {
        let hrv = Sample::instant(SampleCategory::HrvSdnn, 42.0, at(9, 0));
        let heart_rates = vec![
            Sample::instant(SampleCategory::HeartRate, 60.0, at(8, 50)),
            Sample::instant(SampleCategory::HeartRate, 64.0, at(9, 3)),
        ];

        let nearest = hrv.nearest_within(&heart_rates, default_nearest_window()).unwrap();
        assert_eq!(nearest.value, 64.0);

        let far = vec![Sample::instant(SampleCategory::HeartRate, 60.0, at(9, 30))];
        assert!(hrv.nearest_within(&far, default_nearest_window()).is_none());
        assert!(hrv.nearest_within(&[], default_nearest_window()).is_none());
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("hrv".parse::<SampleCategory>().unwrap(), SampleCategory::HrvSdnn);
        assert_eq!(
            "blood-glucose".parse::<SampleCategory>().unwrap(),
            SampleCategory::BloodGlucose
        );
        assert!("unknown".parse::<SampleCategory>().is_err());
    }
}

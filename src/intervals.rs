//! Beat-to-beat interval analysis
//!
//! Turns the raw heartbeat timestamps underlying one HRV reading into time-domain
//! HRV indices.
//!
//! # Background
//!
//! A heartbeat series is a list of beat times in milliseconds since the series
//! started. Consecutive differences give the RR (beat-to-beat) intervals:
//!
//! - **RMSSD**: root mean square of successive interval differences
//! - **NN50 / pNN50**: successive differences of at least 50 ms, as a count and as a
//!   fraction of all differences
//! - **Mean RR**: mean interval
//! - **MxDMn**: longest minus shortest interval
//! - **CV**: sample standard deviation over the mean, x100
//!
//! Intervals longer than [`MAX_PLAUSIBLE_INTERVAL_MS`] usually come from a gap in the
//! recording and are dropped before every index except NN50/pNN50, which work on
//! the raw intervals.

use crate::models::HrvDerivedMetrics;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Upper bound for an interval to be kept by the filtered indices
pub const MAX_PLAUSIBLE_INTERVAL_MS: f64 = 1000.0;

/// Successive difference threshold for NN50
pub const NN50_THRESHOLD_MS: f64 = 50.0;

/// Derive HRV indices from a heartbeat series
///
/// # Arguments
///
/// * `timestamps` - Beat times in milliseconds since the series started
///
/// # Returns
///
/// `None` when fewer than two beats are available (no interval can be formed),
/// otherwise a result whose individual fields may still be `None`.
///
/// ```rust
/// use quickhealth::intervals::analyze;
///
/// let metrics = analyze(&[0.0, 800.0, 1700.0, 2550.0]).unwrap();
/// assert_eq!(metrics.rmssd, Some(79));
/// ```
pub fn analyze(timestamps: &[f64]) -> Option<HrvDerivedMetrics> {
    if timestamps.len() <= 1 {
        return None;
    }

    let intervals = rr_intervals(timestamps);
    let nn = nn50(&intervals);

    Some(HrvDerivedMetrics {
        rmssd: rmssd(&intervals),
        nn50: nn.map(|(count, _)| count),
        pnn50: nn.map(|(_, fraction)| fraction),
        mean_rr: mean_rr(&intervals),
        mxdmn: mxdmn(&intervals),
        cv: cv(&intervals),
    })
}

/// Beat-to-beat intervals (N timestamps give N-1 intervals)
pub fn rr_intervals(timestamps: &[f64]) -> Vec<f64> {
    timestamps.windows(2).map(|w| w[1] - w[0]).collect()
}

fn plausible(intervals: &[f64]) -> Vec<f64> {
    intervals
        .iter()
        .copied()
        .filter(|&i| i <= MAX_PLAUSIBLE_INTERVAL_MS)
        .collect()
}

fn successive_differences(intervals: &[f64]) -> Vec<f64> {
    intervals.windows(2).map(|w| w[1] - w[0]).collect()
}

/// RMSSD over plausible intervals, rounded to whole milliseconds
pub fn rmssd(intervals: &[f64]) -> Option<i64> {
    let intervals = plausible(intervals);
    if intervals.len() < 2 {
        return None;
    }

    let differences = successive_differences(&intervals);
    let mean_square =
        differences.iter().map(|d| d * d).sum::<f64>() / differences.len() as f64;

    Some(mean_square.sqrt().round() as i64)
}

/// NN50 count and pNN50 fraction over the unfiltered intervals
///
/// Differences are signed: only a lengthening of at least 50 ms between adjacent
/// intervals counts.
pub fn nn50(intervals: &[f64]) -> Option<(i64, f64)> {
    if intervals.len() < 2 {
        return None;
    }

    let differences = successive_differences(intervals);
    let count = differences
        .iter()
        .filter(|&&d| d >= NN50_THRESHOLD_MS)
        .count();

    Some((count as i64, count as f64 / differences.len() as f64))
}

/// Mean of plausible intervals, rounded
pub fn mean_rr(intervals: &[f64]) -> Option<i64> {
    let intervals = plausible(intervals);
    if intervals.is_empty() {
        return None;
    }

    Some(intervals.mean().round() as i64)
}

/// Range of plausible intervals, rounded
pub fn mxdmn(intervals: &[f64]) -> Option<i64> {
    let intervals = plausible(intervals);
    if intervals.is_empty() {
        return None;
    }

    let max = intervals.iter().copied().fold(f64::MIN, f64::max);
    let min = intervals.iter().copied().fold(f64::MAX, f64::min);
    Some((max - min).round() as i64)
}

/// Coefficient of variation (sample standard deviation / mean) x100, rounded
pub fn cv(intervals: &[f64]) -> Option<i64> {
    let intervals = plausible(intervals);
    if intervals.len() < 2 {
        return None;
    }

    let mean = intervals.iter().mean();
    let std_dev = intervals.iter().std_dev();
    Some((std_dev / mean * 100.0).round() as i64)
}

/// One beat as reported by a heartbeat-series query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    /// Seconds since the start of the series
    pub time_since_series_start: f64,
    /// The beat follows a gap in the recording
    #[serde(default)]
    pub preceded_by_gap: bool,
    /// Last beat of the series
    #[serde(default)]
    pub done: bool,
}

/// Convert a heartbeat-series stream into millisecond timestamps
///
/// Beats that follow a gap are skipped, except the terminal beat which is always
/// kept. Events after the terminal beat are ignored.
pub fn collect_beat_timestamps(events: &[BeatEvent]) -> Vec<f64> {
    let mut timestamps = Vec::with_capacity(events.len());

    for event in events {
        if event.done {
            timestamps.push(event.time_since_series_start * 1000.0);
            break;
        }
        if !event.preceded_by_gap {
            timestamps.push(event.time_since_series_start * 1000.0);
        }
    }

    timestamps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rmssd_reference_series() {
        // intervals [800, 900, 850] -> differences [100, -50] -> sqrt(6250) = 79.06
        let metrics = analyze(&[0.0, 800.0, 1700.0, 2550.0]).unwrap();
        assert_eq!(metrics.rmssd, Some(79));
        assert_eq!(metrics.mean_rr, Some(850));
        assert_eq!(metrics.mxdmn, Some(100));
        assert_eq!(metrics.cv, Some(6)); // sd 50 / mean 850 = 5.88%
        assert_eq!(metrics.nn50, Some(1));
        assert_eq!(metrics.pnn50, Some(0.5));
    }

    #[test]
    fn test_insufficient_beats() {
        assert!(analyze(&[]).is_none());
        assert!(analyze(&[0.0]).is_none());
    }

    #[test]
    fn test_two_beats_only_single_interval() {
        let metrics = analyze(&[0.0, 900.0]).unwrap();
        assert_eq!(metrics.rmssd, None);
        assert_eq!(metrics.nn50, None);
        assert_eq!(metrics.pnn50, None);
        assert_eq!(metrics.mean_rr, Some(900));
        assert_eq!(metrics.mxdmn, Some(0));
        assert_eq!(metrics.cv, None);
    }

    #[test]
    fn test_outlier_filtered_only_for_non_nn50_indices() {
        // intervals [800, 1500, 820]: 1500 is dropped for RMSSD but not for NN50
        let intervals = rr_intervals(&[0.0, 800.0, 2300.0, 3120.0]);
        assert_eq!(intervals, vec![800.0, 1500.0, 820.0]);

        // Filtered: [800, 820] -> one difference of 20
        assert_eq!(rmssd(&intervals), Some(20));
        assert_eq!(mean_rr(&intervals), Some(810));
        assert_eq!(mxdmn(&intervals), Some(20));

        // Unfiltered: differences [700, -680] -> one counted, two considered
        let (count, fraction) = nn50(&intervals).unwrap();
        assert_eq!(count, 1);
        assert_eq!(fraction, 0.5);
    }

    #[test]
    fn test_nn50_uses_signed_differences() {
        // differences [-100, -100]: large but decreasing, so none count
        let intervals = [900.0, 800.0, 700.0];
        assert_eq!(nn50(&intervals), Some((0, 0.0)));
    }

    #[test]
    fn test_all_intervals_implausible() {
        let metrics = analyze(&[0.0, 1500.0, 3000.0, 4600.0]).unwrap();
        assert_eq!(metrics.rmssd, None);
        assert_eq!(metrics.mean_rr, None);
        assert_eq!(metrics.mxdmn, None);
        assert_eq!(metrics.cv, None);
        // NN50 still sees the raw intervals [1500, 1500, 1600]
        assert_eq!(metrics.nn50, Some(1));
    }

    #[test]
    fn test_collect_beat_timestamps_skips_gaps() {
        let events = vec![
            BeatEvent { time_since_series_start: 0.0, preceded_by_gap: false, done: false },
            BeatEvent { time_since_series_start: 0.8, preceded_by_gap: false, done: false },
            BeatEvent { time_since_series_start: 5.0, preceded_by_gap: true, done: false },
            BeatEvent { time_since_series_start: 5.9, preceded_by_gap: false, done: false },
            BeatEvent { time_since_series_start: 6.7, preceded_by_gap: true, done: true },
        ];

        let timestamps = collect_beat_timestamps(&events);
        assert_eq!(timestamps.len(), 4);
        assert_eq!(timestamps[0], 0.0);
        assert!((timestamps[1] - 800.0).abs() < 1e-9);
        assert!((timestamps[3] - 6700.0).abs() < 1e-9);
    }
}

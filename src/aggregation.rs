//! Statistical reducers over homogeneous sample collections
//!
//! All results are `rust_decimal::Decimal` values rounded half away from zero at
//! the category's scale (see [`SampleCategory::scale`]). An empty collection never
//! produces a zero average or range: "no data" is `None`.

use crate::models::{Sample, SampleCategory};
use rust_decimal::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Inclusive min/max of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: Decimal,
    pub max: Decimal,
}

/// Round a raw value at the given number of decimal places
///
/// Non-finite inputs have no decimal representation and yield `None`.
pub fn round_at(value: f64, scale: u32) -> Option<Decimal> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero))
}

/// Reducers for one category's samples
pub struct SampleAggregator;

impl SampleAggregator {
    /// Semantic value of one sample, rounded at the category scale
    pub fn value_of(category: SampleCategory, sample: &Sample) -> Option<Decimal> {
        round_at(sample.semantic_value(), category.scale())
    }

    fn values(category: SampleCategory, samples: &[Sample]) -> Vec<Decimal> {
        samples
            .iter()
            .filter_map(|s| Self::value_of(category, s))
            .collect()
    }

    /// Mean of per-sample values, rounded at the category scale
    pub fn average(category: SampleCategory, samples: &[Sample]) -> Option<Decimal> {
        let values = Self::values(category, samples);
        Self::mean_of(category, &values)
    }

    /// Mean of already-reduced values (used by the cross-day aggregation)
    pub fn mean_of(category: SampleCategory, values: &[Decimal]) -> Option<Decimal> {
        if values.is_empty() {
            return None;
        }

        let total: Decimal = values.iter().sum();
        let mean = total / Decimal::from(values.len());
        Some(mean.round_dp_with_strategy(category.scale(), RoundingStrategy::MidpointAwayFromZero))
    }

    /// Smallest and largest per-sample value
    pub fn range(category: SampleCategory, samples: &[Sample]) -> Option<ValueRange> {
        let values = Self::values(category, samples);
        let min = values.iter().min()?;
        let max = values.iter().max()?;
        Some(ValueRange {
            min: *min,
            max: *max,
        })
    }

    /// Total of per-sample values for cumulative categories
    ///
    /// Non-cumulative categories always return `None`. An empty step collection is
    /// defined as zero steps; every other empty collection has no total.
    pub fn sum(category: SampleCategory, samples: &[Sample]) -> Option<Decimal> {
        if !category.is_cumulative() {
            return None;
        }
        if samples.is_empty() {
            return (category == SampleCategory::StepCount).then_some(Decimal::ZERO);
        }

        Some(Self::values(category, samples).iter().sum())
    }

    /// Total step count (zero when there are no samples)
    pub fn step_count(samples: &[Sample]) -> Decimal {
        Self::sum(SampleCategory::StepCount, samples).unwrap_or(Decimal::ZERO)
    }
}

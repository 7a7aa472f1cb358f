//! Reduction of normalized readings into caller-requested granularities
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        NormalizedPoint stream       │
//! │   events, or counter deltas         │
//! └─────────────────────────────────────┘
//!                  ↓
//! ┌─────────────────────────────────────┐
//! │            LocalClock               │
//! │   point / hour / day bucket keys    │
//! └─────────────────────────────────────┘
//!                  ↓
//! ┌─────────────────────────────────────┐
//! │          AggregateState             │
//! │   sum, max, avg, min-max per bucket │
//! └─────────────────────────────────────┘
//!                  ↓
//! ┌─────────────────────────────────────┐
//! │        AggregatedPoint series       │
//! │   ascending by bucket               │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use hydromet_telemetry::aggregation::{Aggregator, AggregateValue, LocalClock, ProcessingMode};
//! use hydromet_telemetry::types::NormalizedPoint;
//! use chrono::{TimeZone, Utc};
//!
//! let aggregator = Aggregator::new(LocalClock::utc());
//! let points: Vec<NormalizedPoint> = [1.2, 1.5, 0.9]
//!     .iter()
//!     .enumerate()
//!     .map(|(i, v)| {
//!         NormalizedPoint::new("4", Utc.with_ymd_and_hms(2024, 3, 1, i as u32, 0, 0).unwrap(), *v)
//!     })
//!     .collect();
//!
//! let reduced = aggregator.reduce(&points, ProcessingMode::DailyMinMax);
//! assert_eq!(reduced[0].value, AggregateValue::MinMax { min: 0.9, max: 1.5 });
//! ```

pub mod bucket;
pub mod mode;
pub mod state;

pub use bucket::{BucketKey, Granularity, LocalClock};
pub use mode::{ProcessingMode, Reduction, SumStrategy};
pub use state::AggregateState;

use crate::types::NormalizedPoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Output types
// ============================================================================

/// Value of one reduced bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateValue {
    /// A single number
    Single(f64),
    /// Smallest and largest value of the bucket
    MinMax {
        /// Smallest value
        min: f64,
        /// Largest value
        max: f64,
    },
}

impl AggregateValue {
    /// The number, for single values
    pub fn single(&self) -> Option<f64> {
        match self {
            AggregateValue::Single(v) => Some(*v),
            AggregateValue::MinMax { .. } => None,
        }
    }

    /// Smallest value (the value itself for single values)
    pub fn min(&self) -> f64 {
        match self {
            AggregateValue::Single(v) => *v,
            AggregateValue::MinMax { min, .. } => *min,
        }
    }

    /// Largest value (the value itself for single values)
    pub fn max(&self) -> f64 {
        match self {
            AggregateValue::Single(v) => *v,
            AggregateValue::MinMax { max, .. } => *max,
        }
    }

    fn rounded(self, places: u32) -> Self {
        match self {
            AggregateValue::Single(v) => AggregateValue::Single(round_to(v, places)),
            AggregateValue::MinMax { min, max } => AggregateValue::MinMax {
                min: round_to(min, places),
                max: round_to(max, places),
            },
        }
    }
}

fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// One reduced bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPoint {
    /// Bucket the value covers
    pub bucket: BucketKey,
    /// Reduced value
    pub value: AggregateValue,
    /// Number of readings that went into the bucket
    pub count: u64,
}

// ============================================================================
// Aggregator
// ============================================================================

/// Reduces normalized points per processing mode
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    clock: LocalClock,
}

impl Aggregator {
    /// Create an aggregator truncating on `clock`
    pub fn new(clock: LocalClock) -> Self {
        Self { clock }
    }

    /// Clock used for bucket truncation
    pub fn clock(&self) -> &LocalClock {
        &self.clock
    }

    /// Reduce with plain sums
    pub fn reduce(&self, points: &[NormalizedPoint], mode: ProcessingMode) -> Vec<AggregatedPoint> {
        self.reduce_with(points, mode, SumStrategy::Sum)
    }

    /// Reduce under an explicit sum strategy
    ///
    /// Output is ascending by bucket. `Raw` keeps one output per reading,
    /// duplicates included. Non-finite values are ignored.
    pub fn reduce_with(
        &self,
        points: &[NormalizedPoint],
        mode: ProcessingMode,
        strategy: SumStrategy,
    ) -> Vec<AggregatedPoint> {
        let granularity = mode.granularity();
        let reduction = mode.reduction(strategy);
        let finite = points.iter().filter(|p| p.value.is_finite());

        let mut out: Vec<AggregatedPoint> = if reduction == Reduction::Identity {
            let mut raw: Vec<AggregatedPoint> = finite
                .map(|p| AggregatedPoint {
                    bucket: self.clock.bucket(p.timestamp, granularity),
                    value: AggregateValue::Single(p.value),
                    count: 1,
                })
                .collect();
            raw.sort_by_key(|p| p.bucket);
            raw
        } else {
            let mut buckets: BTreeMap<BucketKey, AggregateState> = BTreeMap::new();
            for point in finite {
                buckets
                    .entry(self.clock.bucket(point.timestamp, granularity))
                    .or_default()
                    .add(point.value);
            }
            buckets
                .into_iter()
                .filter_map(|(bucket, state)| {
                    state.finalize(reduction).map(|value| AggregatedPoint {
                        bucket,
                        value,
                        count: state.count(),
                    })
                })
                .collect()
        };

        if let Some(places) = mode.rounding() {
            for point in &mut out {
                point.value = point.value.rounded(places);
            }
        }
        out
    }
}

/// Split a min-max series into a minimum and a maximum series
///
/// Both outputs share the input's bucket keys.
pub fn split_min_max(points: &[AggregatedPoint]) -> (Vec<AggregatedPoint>, Vec<AggregatedPoint>) {
    let project = |f: fn(&AggregateValue) -> f64| {
        points
            .iter()
            .map(|p| AggregatedPoint {
                bucket: p.bucket,
                value: AggregateValue::Single(f(&p.value)),
                count: p.count,
            })
            .collect::<Vec<_>>()
    };
    (project(AggregateValue::min), project(AggregateValue::max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, minute, 0).unwrap()
    }

    fn point(day: u32, hour: u32, minute: u32, value: f64) -> NormalizedPoint {
        NormalizedPoint::new("1", ts(day, hour, minute), value)
    }

    fn utc() -> Aggregator {
        Aggregator::new(LocalClock::utc())
    }

    #[test]
    fn test_empty_in_empty_out() {
        for mode in ProcessingMode::ALL {
            assert!(utc().reduce(&[], mode).is_empty());
        }
    }

    #[test]
    fn test_daily_sum() {
        let points = vec![
            point(1, 1, 0, 0.0),
            point(1, 5, 0, 5.0),
            point(1, 9, 0, 3.0),
            point(2, 1, 0, 5.0),
        ];
        let reduced = utc().reduce(&points, ProcessingMode::DailySum);

        assert_eq!(reduced.len(), 2);
        assert_eq!(reduced[0].bucket.label(), "2024-03-01");
        assert_eq!(reduced[0].value, AggregateValue::Single(8.0));
        assert_eq!(reduced[0].count, 3);
        assert_eq!(reduced[1].value, AggregateValue::Single(5.0));
    }

    #[test]
    fn test_max_of_period_for_daily_accumulated() {
        let points = vec![point(1, 1, 0, 2.0), point(1, 5, 0, 6.5), point(1, 9, 0, 4.0)];
        let reduced =
            utc().reduce_with(&points, ProcessingMode::DailySum, SumStrategy::MaxOfPeriod);
        assert_eq!(reduced[0].value, AggregateValue::Single(6.5));
    }

    #[test]
    fn test_hourly_avg_rounds_to_three_places() {
        let points = vec![point(1, 10, 0, 1.0), point(1, 10, 20, 1.0), point(1, 10, 40, 1.001)];
        let reduced = utc().reduce(&points, ProcessingMode::HourlyAvg);

        assert_eq!(reduced.len(), 1);
        assert_eq!(reduced[0].bucket.label(), "2024-03-01 10:00");
        assert_eq!(reduced[0].value, AggregateValue::Single(1.0));
    }

    #[test]
    fn test_raw_keeps_duplicates_in_order() {
        let points = vec![point(1, 10, 0, 1.0), point(1, 9, 0, 0.5), point(1, 10, 0, 2.0)];
        let reduced = utc().reduce(&points, ProcessingMode::Raw);

        let values: Vec<f64> = reduced.iter().map(|p| p.value.max()).collect();
        assert_eq!(values, vec![0.5, 1.0, 2.0]);
        assert_eq!(reduced[1].bucket, reduced[2].bucket);
    }

    #[test]
    fn test_buckets_follow_local_clock() {
        let aggregator = Aggregator::new(LocalClock::from_minutes(-180).unwrap());
        // 02:00 UTC on the 2nd is still the 1st locally
        let points = vec![point(1, 12, 0, 1.0), point(2, 2, 0, 4.0)];
        let reduced = aggregator.reduce(&points, ProcessingMode::DailyMax);

        assert_eq!(reduced.len(), 1);
        assert_eq!(reduced[0].value, AggregateValue::Single(4.0));
    }

    #[test]
    fn test_non_finite_ignored() {
        let points = vec![point(1, 1, 0, f64::NAN), point(1, 2, 0, 3.0)];
        let reduced = utc().reduce(&points, ProcessingMode::DailyAvg);
        assert_eq!(reduced[0].value, AggregateValue::Single(3.0));
        assert_eq!(reduced[0].count, 1);
    }

    #[test]
    fn test_split_min_max_shares_keys() {
        let points = vec![point(1, 1, 0, 1.2), point(1, 2, 0, 1.5), point(1, 3, 0, 0.9)];
        let reduced = utc().reduce(&points, ProcessingMode::DailyMinMax);
        let (min, max) = split_min_max(&reduced);

        assert_eq!(min[0].bucket, max[0].bucket);
        assert_eq!(min[0].value, AggregateValue::Single(0.9));
        assert_eq!(max[0].value, AggregateValue::Single(1.5));
    }
}

//! Incremental values from cumulative counters
//!
//! Counter-store rain gauges report a running total. The amount that fell
//! between two rows is their difference; a drop means the counter was reset
//! and the new value is taken as the amount since the reset.
//!
//! Resets to a non-zero baseline under-count: the rule cannot tell how far
//! the counter fell before climbing again.
//!
//! Differencing is done per station, so a wildcard fetch that interleaves
//! stations never diffs one station's row against another's.

use crate::aggregation::SumStrategy;
use crate::config::CounterOverrides;
use crate::types::{NormalizedPoint, Reading, SensorDescriptor, StationId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Differences counter readings into per-interval amounts
///
/// `readings` must be ascending by timestamp. The first reading of each
/// station yields 0. Points strictly before `window_start` are computed (so
/// they can serve as predecessors) and then dropped. Non-finite readings are
/// skipped and do not become predecessors.
pub fn reconstruct_deltas(
    readings: &[Reading],
    window_start: DateTime<Utc>,
) -> Vec<NormalizedPoint> {
    let mut previous: HashMap<&StationId, f64> = HashMap::new();
    let mut out = Vec::with_capacity(readings.len());

    for reading in readings {
        if !reading.value.is_finite() {
            continue;
        }
        let delta = match previous.insert(&reading.station_id, reading.value) {
            None => 0.0,
            Some(prev) if reading.value < prev => reading.value.max(0.0),
            Some(prev) => reading.value - prev,
        };
        if reading.timestamp >= window_start {
            out.push(NormalizedPoint::new(
                reading.station_id.clone(),
                reading.timestamp,
                delta,
            ));
        }
    }
    out
}

/// Pass readings through unchanged, trimmed to the window
pub fn pass_through(readings: &[Reading], window_start: DateTime<Utc>) -> Vec<NormalizedPoint> {
    readings
        .iter()
        .filter(|r| r.value.is_finite() && r.timestamp >= window_start)
        .cloned()
        .map(NormalizedPoint::from)
        .collect()
}

/// Normalized readings of one series plus how sum modes must treat them
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSeries {
    /// Points ascending by timestamp
    pub points: Vec<NormalizedPoint>,
    /// Sum strategy for reduction
    pub strategy: SumStrategy,
}

/// Routes each series through the right normalization
#[derive(Debug, Clone, Default)]
pub struct DeltaReconstructor {
    overrides: CounterOverrides,
}

impl DeltaReconstructor {
    /// Create a reconstructor honouring the override table
    pub fn new(overrides: CounterOverrides) -> Self {
        Self { overrides }
    }

    /// Normalize the readings of one station for one sensor
    ///
    /// Counter sensors are differenced unless the station reports a daily
    /// accumulated value, in which case values pass through and sums become
    /// max-of-period. Event sensors pass through.
    pub fn normalize(
        &self,
        sensor: &SensorDescriptor,
        station: &StationId,
        readings: &[Reading],
        window_start: DateTime<Utc>,
    ) -> NormalizedSeries {
        if !sensor.is_counter() {
            return NormalizedSeries {
                points: pass_through(readings, window_start),
                strategy: SumStrategy::Sum,
            };
        }

        if self.overrides.is_daily_accumulated(station) {
            NormalizedSeries {
                points: pass_through(readings, window_start),
                strategy: SumStrategy::MaxOfPeriod,
            }
        } else {
            NormalizedSeries {
                points: reconstruct_deltas(readings, window_start),
                strategy: SumStrategy::Sum,
            }
        }
    }
}

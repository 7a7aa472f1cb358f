//! Incremental per-bucket accumulator

use super::mode::Reduction;
use super::AggregateValue;

/// State for incremental aggregation of one bucket
#[derive(Debug, Clone)]
pub struct AggregateState {
    /// Sum of values (for sum, avg)
    sum: f64,

    /// Count of values
    count: u64,

    /// Minimum value
    min: f64,

    /// Maximum value
    max: f64,
}

impl AggregateState {
    /// Create new empty state
    pub fn new() -> Self {
        Self {
            sum: 0.0,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Add a value
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;

        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    /// Number of values added
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Final value under a reduction, `None` when empty
    pub fn finalize(&self, reduction: Reduction) -> Option<AggregateValue> {
        if self.count == 0 {
            return None;
        }

        Some(match reduction {
            Reduction::Sum => AggregateValue::Single(self.sum),
            Reduction::Max => AggregateValue::Single(self.max),
            Reduction::Avg => AggregateValue::Single(self.sum / self.count as f64),
            Reduction::MinMax => AggregateValue::MinMax {
                min: self.min,
                max: self.max,
            },
            // A single-point bucket: its value is the sum of one element
            Reduction::Identity => AggregateValue::Single(self.sum),
        })
    }
}

impl Default for AggregateState {
    fn default() -> Self {
        Self::new()
    }
}

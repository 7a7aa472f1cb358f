//! Processing modes
//!
//! A mode pairs a bucket width with a reduction. Mode names are parsed once
//! at the request boundary; legacy names from older report links are
//! accepted as aliases.

use super::bucket::Granularity;
use crate::error::{Error, Result};
use crate::types::MetricKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How readings are reduced before they are returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Every reading, unreduced
    Raw,
    /// Total per local day
    DailySum,
    /// Maximum per local day
    DailyMax,
    /// Minimum and maximum per local day
    DailyMinMax,
    /// Mean per local day
    DailyAvg,
    /// Mean per local hour, rounded to 3 decimals
    HourlyAvg,
    /// Total per local hour
    HourlySum,
    /// Maximum per local hour
    HourlyMax,
}

/// Reduction applied within one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// No reduction, one output per reading
    Identity,
    /// Sum of values
    Sum,
    /// Largest value
    Max,
    /// Arithmetic mean
    Avg,
    /// Smallest and largest value
    MinMax,
}

/// How sum modes treat a series
///
/// Stations whose counter store already reports a daily accumulated value
/// must not be summed again; their period total is the largest value seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SumStrategy {
    /// Add up the values of the bucket
    #[default]
    Sum,
    /// Take the largest value of the bucket
    MaxOfPeriod,
}

impl ProcessingMode {
    /// Every mode, in menu order
    pub const ALL: [ProcessingMode; 8] = [
        ProcessingMode::Raw,
        ProcessingMode::DailySum,
        ProcessingMode::DailyMax,
        ProcessingMode::DailyMinMax,
        ProcessingMode::DailyAvg,
        ProcessingMode::HourlyAvg,
        ProcessingMode::HourlySum,
        ProcessingMode::HourlyMax,
    ];

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::Raw => "raw",
            ProcessingMode::DailySum => "daily_sum",
            ProcessingMode::DailyMax => "daily_max",
            ProcessingMode::DailyMinMax => "daily_min_max",
            ProcessingMode::DailyAvg => "daily_avg",
            ProcessingMode::HourlyAvg => "hourly_avg",
            ProcessingMode::HourlySum => "hourly_sum",
            ProcessingMode::HourlyMax => "hourly_max",
        }
    }

    /// Human label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            ProcessingMode::Raw => "Raw readings",
            ProcessingMode::DailySum => "Daily total",
            ProcessingMode::DailyMax => "Daily maximum",
            ProcessingMode::DailyMinMax => "Daily minimum / maximum",
            ProcessingMode::DailyAvg => "Daily average",
            ProcessingMode::HourlyAvg => "Hourly average",
            ProcessingMode::HourlySum => "Hourly total",
            ProcessingMode::HourlyMax => "Hourly maximum",
        }
    }

    /// Bucket width
    pub fn granularity(&self) -> Granularity {
        match self {
            ProcessingMode::Raw => Granularity::Point,
            ProcessingMode::HourlyAvg | ProcessingMode::HourlySum | ProcessingMode::HourlyMax => {
                Granularity::Hour
            },
            ProcessingMode::DailySum
            | ProcessingMode::DailyMax
            | ProcessingMode::DailyMinMax
            | ProcessingMode::DailyAvg => Granularity::Day,
        }
    }

    /// Reduction applied inside each bucket under a sum strategy
    pub fn reduction(&self, strategy: SumStrategy) -> Reduction {
        match (self, strategy) {
            (ProcessingMode::Raw, _) => Reduction::Identity,
            (ProcessingMode::DailySum | ProcessingMode::HourlySum, SumStrategy::Sum) => {
                Reduction::Sum
            },
            (ProcessingMode::DailySum | ProcessingMode::HourlySum, SumStrategy::MaxOfPeriod) => {
                Reduction::Max
            },
            (ProcessingMode::DailyMax | ProcessingMode::HourlyMax, _) => Reduction::Max,
            (ProcessingMode::DailyAvg | ProcessingMode::HourlyAvg, _) => Reduction::Avg,
            (ProcessingMode::DailyMinMax, _) => Reduction::MinMax,
        }
    }

    /// Decimal places results are rounded to, if any
    pub fn rounding(&self) -> Option<u32> {
        match self {
            ProcessingMode::HourlyAvg => Some(3),
            _ => None,
        }
    }

    /// Mode used when the caller does not ask for one
    pub fn default_for(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Rainfall => ProcessingMode::DailySum,
            MetricKind::WaterLevel | MetricKind::Groundwater => ProcessingMode::DailyMinMax,
            MetricKind::Battery => ProcessingMode::DailyAvg,
            _ => ProcessingMode::DailyMax,
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mode = match s.trim().to_ascii_lowercase().as_str() {
            "raw" => ProcessingMode::Raw,
            "daily_sum" | "pluvio_sum" => ProcessingMode::DailySum,
            "daily_max" | "nivel_max" => ProcessingMode::DailyMax,
            "daily_min_max" => ProcessingMode::DailyMinMax,
            "daily_avg" => ProcessingMode::DailyAvg,
            "hourly_avg" | "avg_hourly" => ProcessingMode::HourlyAvg,
            "hourly_sum" | "sum_hourly" => ProcessingMode::HourlySum,
            "hourly_max" | "max_hourly" => ProcessingMode::HourlyMax,
            other => return Err(Error::UnknownMode(other.to_string())),
        };
        Ok(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_and_legacy() {
        for mode in ProcessingMode::ALL {
            assert_eq!(mode.as_str().parse::<ProcessingMode>().unwrap(), mode);
        }
        assert_eq!("pluvio_sum".parse::<ProcessingMode>().unwrap(), ProcessingMode::DailySum);
        assert_eq!("nivel_max".parse::<ProcessingMode>().unwrap(), ProcessingMode::DailyMax);
        assert_eq!(" AVG_HOURLY ".parse::<ProcessingMode>().unwrap(), ProcessingMode::HourlyAvg);
    }

    #[test]
    fn test_unknown_mode() {
        assert!(matches!(
            "weekly_sum".parse::<ProcessingMode>(),
            Err(Error::UnknownMode(m)) if m == "weekly_sum"
        ));
    }

    #[test]
    fn test_max_of_period_only_affects_sums() {
        let max = SumStrategy::MaxOfPeriod;
        assert_eq!(ProcessingMode::DailySum.reduction(max), Reduction::Max);
        assert_eq!(ProcessingMode::HourlySum.reduction(max), Reduction::Max);
        assert_eq!(ProcessingMode::DailyAvg.reduction(max), Reduction::Avg);
        assert_eq!(ProcessingMode::DailySum.reduction(SumStrategy::Sum), Reduction::Sum);
    }

    #[test]
    fn test_default_modes() {
        assert_eq!(ProcessingMode::default_for(MetricKind::Rainfall), ProcessingMode::DailySum);
        assert_eq!(
            ProcessingMode::default_for(MetricKind::Groundwater),
            ProcessingMode::DailyMinMax
        );
        assert_eq!(ProcessingMode::default_for(MetricKind::Battery), ProcessingMode::DailyAvg);
        assert_eq!(ProcessingMode::default_for(MetricKind::WindSpeed), ProcessingMode::DailyMax);
    }
}

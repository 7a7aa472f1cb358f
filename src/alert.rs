//! Threshold alerts on the latest water level of a station
//!
//! A rule table keyed by station id assigns yellow/orange/red thresholds.
//! Levels are inclusive lower bounds and the highest matching level wins.

use crate::types::{Reading, StationId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inclusive lower bounds for each alert level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Yellow from this value upwards
    pub yellow: f64,
    /// Orange from this value upwards
    pub orange: f64,
    /// Red from this value upwards
    pub red: f64,
}

impl AlertThresholds {
    /// Check thresholds are finite and ordered yellow <= orange <= red
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.yellow.is_finite() && self.orange.is_finite() && self.red.is_finite()) {
            return Err("thresholds must be finite".to_string());
        }
        if self.yellow > self.orange || self.orange > self.red {
            return Err(format!(
                "thresholds must be ordered yellow <= orange <= red, got {} / {} / {}",
                self.yellow, self.orange, self.red
            ));
        }
        Ok(())
    }

    /// Level reached by `value`
    pub fn level_for(&self, value: f64) -> AlertLevel {
        if value >= self.red {
            AlertLevel::Red
        } else if value >= self.orange {
            AlertLevel::Orange
        } else if value >= self.yellow {
            AlertLevel::Yellow
        } else {
            AlertLevel::Normal
        }
    }
}

/// Alert state of a station
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    /// No rule configured for the station
    NoRule,
    /// A rule exists but there is no reading to check
    NoData,
    /// Below every threshold
    Normal,
    /// At or above the yellow threshold
    Yellow,
    /// At or above the orange threshold
    Orange,
    /// At or above the red threshold
    Red,
}

/// Result of evaluating one station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertStatus {
    /// Station evaluated
    pub station_id: StationId,
    /// Level reached
    pub level: AlertLevel,
    /// Value the level was computed from
    pub value: Option<f64>,
}

/// Rule-table driven threshold check
#[derive(Debug, Clone, Default)]
pub struct AlertEvaluator {
    rules: BTreeMap<StationId, AlertThresholds>,
}

impl AlertEvaluator {
    /// Create an evaluator from a rule table
    pub fn new(rules: BTreeMap<StationId, AlertThresholds>) -> Self {
        Self { rules }
    }

    /// Build from the config table (keys are station ids)
    pub fn from_config(table: &BTreeMap<String, AlertThresholds>) -> Self {
        Self::new(
            table
                .iter()
                .map(|(station, thresholds)| (StationId::new(station.as_str()), *thresholds))
                .collect(),
        )
    }

    /// Evaluate the latest reading of a station
    pub fn evaluate(&self, station: &StationId, latest: Option<&Reading>) -> AlertStatus {
        let value = latest.map(|r| r.value).filter(|v| v.is_finite());
        let level = match (self.rules.get(station), value) {
            (None, _) => AlertLevel::NoRule,
            (Some(_), None) => AlertLevel::NoData,
            (Some(thresholds), Some(v)) => thresholds.level_for(v),
        };

        AlertStatus {
            station_id: station.clone(),
            level,
            value,
        }
    }
}

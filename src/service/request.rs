//! Request and response types of the service façade

use crate::aggregation::{AggregateValue, AggregatedPoint, ProcessingMode};
use crate::alert::AlertStatus;
use crate::error::Result;
use crate::types::{
    BackendKind, DateRange, Location, MetricKind, SensorDescriptor, StationId, StationSelector,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A series request
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRequest {
    /// Store to read
    pub backend: BackendKind,
    /// Stations covered
    pub station: StationSelector,
    /// Sensors to read
    pub sensors: Vec<SensorDescriptor>,
    /// Calendar days requested, both ends inclusive
    pub range: DateRange,
    /// Mode applied to every sensor; `None` picks the default per sensor kind
    pub mode: Option<ProcessingMode>,
}

impl SeriesRequest {
    /// Create a request with the default mode per sensor
    pub fn new(
        backend: BackendKind,
        station: StationSelector,
        sensors: Vec<SensorDescriptor>,
        range: DateRange,
    ) -> Self {
        Self {
            backend,
            station,
            sensors,
            range,
            mode: None,
        }
    }

    /// Force one mode for every sensor
    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Build a request from caller-supplied strings
    ///
    /// Dates are ISO `YYYY-MM-DD`. An empty or missing mode means "default
    /// per sensor". Malformed input is rejected here, before any store call.
    pub fn parse(
        backend: &str,
        station: &str,
        sensors: Vec<SensorDescriptor>,
        start: &str,
        end: &str,
        mode: Option<&str>,
    ) -> Result<Self> {
        let mode = match mode.map(str::trim).filter(|m| !m.is_empty()) {
            Some(m) => Some(m.parse::<ProcessingMode>()?),
            None => None,
        };
        Ok(Self {
            backend: backend.parse()?,
            station: StationSelector::parse(station),
            sensors,
            range: DateRange::parse(start, end)?,
            mode,
        })
    }

    /// Mode used for one sensor
    pub fn mode_for(&self, sensor: &SensorDescriptor) -> ProcessingMode {
        self.mode
            .unwrap_or_else(|| ProcessingMode::default_for(sensor.kind))
    }
}

/// Reduced series of one (station, sensor) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSeries {
    /// Station the series belongs to
    pub station_id: StationId,
    /// Sensor read
    pub sensor: SensorDescriptor,
    /// Mode applied
    pub mode: ProcessingMode,
    /// Reduced points, ascending by bucket
    pub points: Vec<AggregatedPoint>,
}

/// Chart arrangement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartLayout {
    /// All sensors on one shared axis
    #[default]
    Combined,
    /// One chart per sensor
    Separate,
}

/// One flat row for a spreadsheet writer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    /// Station id
    pub station_id: StationId,
    /// Station name
    pub station_name: String,
    /// Municipality, when known
    pub municipality: Option<String>,
    /// Sensor name
    pub sensor: String,
    /// Bucket label
    pub bucket: String,
    /// Single value
    pub value: Option<f64>,
    /// Bucket minimum, for min-max modes
    pub min: Option<f64>,
    /// Bucket maximum, for min-max modes
    pub max: Option<f64>,
    /// Unit of the values
    pub unit: String,
    /// Mode label
    pub mode: String,
}

impl ReportRow {
    pub(crate) fn split_value(value: &AggregateValue) -> (Option<f64>, Option<f64>, Option<f64>) {
        match value {
            AggregateValue::Single(v) => (Some(*v), None, None),
            AggregateValue::MinMax { min, max } => (None, Some(*min), Some(*max)),
        }
    }
}

/// Station shown on a map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationLocation {
    /// Storage key of the station
    pub station_id: StationId,
    /// Display label
    pub label: String,
    /// Position
    pub location: Location,
}

/// Latest value of one sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestValue {
    /// Sensor name
    pub sensor: String,
    /// Metric classification
    pub kind: MetricKind,
    /// Value
    pub value: f64,
    /// Display unit
    pub unit: String,
    /// Time of the reading
    pub timestamp: DateTime<Utc>,
}

/// Live summary of a station for the current local day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSnapshot {
    /// Station summarised
    pub station_id: StationId,
    /// Local day covered
    pub day: NaiveDate,
    /// Rain so far today
    pub rain_today: Option<f64>,
    /// Highest water level today
    pub level_max_today: Option<f64>,
    /// Latest value of every other sensor today
    pub latest: Vec<LatestValue>,
    /// Alert status from the latest level reading
    pub alert: AlertStatus,
}

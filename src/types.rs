//! Core data types used throughout the telemetry engine
//!
//! # Key Types
//!
//! - **`StationId` / `SensorId`**: identifiers as the stores know them
//! - **`StationRecord`**: read-only station metadata snapshot
//! - **`SensorDescriptor`**: typed sensor identity with its classification
//! - **`Reading`**: a raw `(timestamp, value)` row from a store
//! - **`NormalizedPoint`**: a reading after counter reconstruction
//! - **`DateRange` / `TimeWindow`**: caller date range and the UTC window it covers
//!
//! # Example
//!
//! ```rust
//! use hydromet_telemetry::types::{DateRange, StationRecord};
//! use chrono::FixedOffset;
//!
//! let range = DateRange::parse("2024-03-01", "2024-03-02").unwrap();
//! let window = range.to_window(FixedOffset::west_opt(3 * 3600).unwrap()).unwrap();
//! assert_eq!(window.duration().num_hours(), 48);
//!
//! let station = StationRecord::new("7", "Puente Norte").with_municipality("Tigre");
//! assert_eq!(station.display_label(), "Puente Norte (Tigre)");
//! ```

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a station as stored by a backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(pub String);

impl StationId {
    /// Create a station id from anything string-like
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a sensor as stored by a backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(pub String);

impl SensorId {
    /// Create a sensor id from anything string-like
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SensorId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SensorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// Backends and selectors
// =============================================================================

/// The two physical reading stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// One row per measurement, filed under a physical metric name
    Event,
    /// One ever-increasing counter per physical sensor
    Counter,
}

impl BackendKind {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Event => "event",
            BackendKind::Counter => "counter",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "event" => Ok(BackendKind::Event),
            "counter" => Ok(BackendKind::Counter),
            other => Err(Error::UnknownBackend(other.to_string())),
        }
    }
}

/// Which stations a request covers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationSelector {
    /// Every station known to the backend
    All,
    /// A single station
    Station(StationId),
}

impl StationSelector {
    /// Parse a caller-supplied selector; `all` and `*` select every station
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") || trimmed == "*" {
            StationSelector::All
        } else {
            StationSelector::Station(StationId::new(trimmed))
        }
    }

    /// The concrete station, if any
    pub fn station(&self) -> Option<&StationId> {
        match self {
            StationSelector::All => None,
            StationSelector::Station(id) => Some(id),
        }
    }
}

impl fmt::Display for StationSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationSelector::All => f.write_str("all"),
            StationSelector::Station(id) => write!(f, "{}", id),
        }
    }
}

// =============================================================================
// Sensors
// =============================================================================

/// Physical-metric classification of a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Rain gauge
    Rainfall,
    /// Surface water level gauge
    WaterLevel,
    /// Groundwater level (phreatimeter)
    Groundwater,
    /// Anemometer
    WindSpeed,
    /// Wind vane
    WindDirection,
    /// Air temperature
    AirTemperature,
    /// Relative humidity
    Humidity,
    /// Pyranometer
    SolarRadiation,
    /// Barometric pressure
    Pressure,
    /// Station battery voltage
    Battery,
    /// Water quality probes (conductivity, pH, turbidity, water temperature)
    WaterQuality,
    /// Anything not covered above
    Other,
}

impl MetricKind {
    /// Display unit for values of this kind
    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::Rainfall => "mm",
            MetricKind::WaterLevel | MetricKind::Groundwater => "m",
            MetricKind::WindSpeed => "km/h",
            MetricKind::WindDirection => "°",
            MetricKind::AirTemperature => "°C",
            MetricKind::Humidity => "%",
            MetricKind::SolarRadiation => "W/m²",
            MetricKind::Pressure => "hPa",
            MetricKind::Battery => "V",
            MetricKind::WaterQuality | MetricKind::Other => "",
        }
    }

    /// True for kinds whose values are water levels
    pub fn is_level(&self) -> bool {
        matches!(self, MetricKind::WaterLevel | MetricKind::Groundwater)
    }
}

/// How the rows of a sensor relate to the measured quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSemantics {
    /// Each row is the measured quantity
    Event,
    /// Each row is a running total that must be differenced
    Counter,
}

/// Typed sensor identity passed between layers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorDescriptor {
    /// Sensor identifier in its backend
    pub id: SensorId,
    /// Human readable name
    pub name: String,
    /// Physical metric label rows are filed under (event store)
    pub metric: String,
    /// Classification used for default modes and chart placement
    pub kind: MetricKind,
    /// Store holding the readings
    pub backend: BackendKind,
    /// Event or counter semantics, fixed per sensor
    pub semantics: ValueSemantics,
}

impl SensorDescriptor {
    /// Descriptor for an event-store sensor filed under `metric`
    pub fn event(
        id: impl Into<SensorId>,
        name: impl Into<String>,
        metric: impl Into<String>,
        kind: MetricKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            metric: metric.into(),
            kind,
            backend: BackendKind::Event,
            semantics: ValueSemantics::Event,
        }
    }

    /// Descriptor for a counter-store sensor
    ///
    /// Counter-store rain gauges report running totals; every other counter
    /// store channel reports the measured value directly.
    pub fn counter(id: impl Into<SensorId>, name: impl Into<String>, kind: MetricKind) -> Self {
        let name = name.into();
        let semantics = if kind == MetricKind::Rainfall {
            ValueSemantics::Counter
        } else {
            ValueSemantics::Event
        };
        Self {
            id: id.into(),
            metric: name.clone(),
            name,
            kind,
            backend: BackendKind::Counter,
            semantics,
        }
    }

    /// True when rows must go through delta reconstruction
    pub fn is_counter(&self) -> bool {
        self.semantics == ValueSemantics::Counter
    }
}

// =============================================================================
// Stations
// =============================================================================

/// Geographic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lon: f64,
}

impl Location {
    /// Build a location from degree/minute/second triples
    ///
    /// Hemispheres `S`, `W` and `O` are negative. A position that converts
    /// to zero on either axis means "not surveyed" and yields `None`.
    pub fn from_dms(
        lat: (f64, f64, f64),
        lat_hemisphere: char,
        lon: (f64, f64, f64),
        lon_hemisphere: char,
    ) -> Option<Self> {
        let lat = dms_to_decimal(lat, lat_hemisphere);
        let lon = dms_to_decimal(lon, lon_hemisphere);
        if lat == 0.0 || lon == 0.0 {
            return None;
        }
        Some(Self { lat, lon })
    }
}

fn dms_to_decimal((deg, min, sec): (f64, f64, f64), hemisphere: char) -> f64 {
    let value = deg.abs() + min.abs() / 60.0 + sec.abs() / 3600.0;
    match hemisphere.to_ascii_uppercase() {
        'S' | 'W' | 'O' => -value,
        _ => value,
    }
}

/// Sensor families a station is equipped with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorFamilies {
    /// Rain gauge
    pub rainfall: bool,
    /// Water level gauge
    pub level: bool,
    /// Wind instruments
    pub wind: bool,
    /// Temperature / humidity probe
    pub temperature_humidity: bool,
    /// Phreatimeter
    pub groundwater: bool,
    /// Pyranometer
    pub solar: bool,
}

/// Read-only station metadata snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    /// Storage-internal identifier
    pub id: StationId,
    /// Project identifier used by the event store, when it differs from `id`
    pub project_id: Option<StationId>,
    /// Display name
    pub name: String,
    /// Free-text site description
    pub description: Option<String>,
    /// Position, when surveyed
    pub location: Option<Location>,
    /// Administrative area
    pub municipality: Option<String>,
    /// Hydrographic basin
    pub basin: Option<String>,
    /// Installed sensor families
    pub families: SensorFamilies,
}

impl StationRecord {
    /// Minimal record with id and name
    pub fn new(id: impl Into<StationId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            project_id: None,
            name: name.into(),
            description: None,
            location: None,
            municipality: None,
            basin: None,
            families: SensorFamilies::default(),
        }
    }

    /// Set the event-store project id
    pub fn with_project_id(mut self, project_id: impl Into<StationId>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Set the municipality
    pub fn with_municipality(mut self, municipality: impl Into<String>) -> Self {
        self.municipality = Some(municipality.into());
        self
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Key the given backend files this station's readings under
    pub fn storage_key(&self, backend: BackendKind) -> &StationId {
        match (backend, &self.project_id) {
            (BackendKind::Event, Some(project)) => project,
            _ => &self.id,
        }
    }

    /// Name shown in station pickers
    pub fn display_label(&self) -> String {
        match &self.municipality {
            Some(m) => format!("{} ({})", self.name, m),
            None => self.name.clone(),
        }
    }
}

// =============================================================================
// Readings
// =============================================================================

/// A raw row as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Station the row belongs to
    pub station_id: StationId,
    /// Measurement time
    pub timestamp: DateTime<Utc>,
    /// Stored value
    pub value: f64,
}

impl Reading {
    /// Create a reading
    pub fn new(station_id: impl Into<StationId>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            station_id: station_id.into(),
            timestamp,
            value,
        }
    }
}

/// A reading after normalization
///
/// Identical to the stored reading for event sensors; carries the
/// incremental amount for counter sensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    /// Station the point belongs to
    pub station_id: StationId,
    /// Measurement time
    pub timestamp: DateTime<Utc>,
    /// Incremental or measured value
    pub value: f64,
}

impl NormalizedPoint {
    /// Create a normalized point
    pub fn new(station_id: impl Into<StationId>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            station_id: station_id.into(),
            timestamp,
            value,
        }
    }
}

impl From<Reading> for NormalizedPoint {
    fn from(r: Reading) -> Self {
        Self {
            station_id: r.station_id,
            timestamp: r.timestamp,
            value: r.value,
        }
    }
}

// =============================================================================
// Ranges
// =============================================================================

/// Inclusive calendar-date range supplied by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First day
    pub start: NaiveDate,
    /// Last day, covered in full
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `end < start`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(Error::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse ISO `YYYY-MM-DD` strings
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// A range covering a single day
    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// Half-open UTC window `[start 00:00, end+1 00:00)` in station-local time
    pub fn to_window(&self, offset: FixedOffset) -> Result<TimeWindow> {
        let after_end = self
            .end
            .succ_opt()
            .ok_or_else(|| Error::InvalidDate(format!("{} has no following day", self.end)))?;
        Ok(TimeWindow {
            start: local_midnight_utc(self.start, offset)?,
            end: local_midnight_utc(after_end, offset)?,
        })
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| Error::InvalidDate(format!("'{}': {}", s, e)))
}

fn local_midnight_utc(day: NaiveDate, offset: FixedOffset) -> Result<DateTime<Utc>> {
    let local = day.and_time(NaiveTime::MIN);
    local
        .checked_sub_signed(chrono::Duration::seconds(i64::from(offset.local_minus_utc())))
        .map(|utc| DateTime::<Utc>::from_naive_utc_and_offset(utc, Utc))
        .ok_or_else(|| Error::InvalidDate(format!("{} at {} is out of range", day, offset)))
}

/// Half-open UTC time window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive start
    pub start: DateTime<Utc>,
    /// Exclusive end
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Check if a timestamp falls inside the window
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    /// Window length
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }

    /// Same window with its start moved back by `lookback`
    ///
    /// Saturates at the earliest representable instant.
    pub fn extended_back(&self, lookback: chrono::Duration) -> Self {
        Self {
            start: self
                .start
                .checked_sub_signed(lookback)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            end: self.end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn offset() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        let err = DateRange::parse("2024-03-05", "2024-03-01").unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }));
    }

    #[test]
    fn test_window_at_calendar_edge() {
        let edge = DateRange::single_day(NaiveDate::MIN);
        let east = FixedOffset::east_opt(3 * 3600).unwrap();
        let west = FixedOffset::west_opt(3 * 3600).unwrap();

        assert!(matches!(edge.to_window(east), Err(Error::InvalidDate(_))));

        let window = edge.to_window(west).unwrap();
        let extended = window.extended_back(chrono::Duration::hours(24));
        assert_eq!(extended.start, DateTime::<Utc>::MIN_UTC);
        assert_eq!(extended.end, window.end);
        assert!(matches!(
            DateRange::single_day(NaiveDate::MAX).to_window(west),
            Err(Error::InvalidDate(_))
        ));
    }

    #[test]
    fn test_date_range_rejects_garbage() {
        assert!(matches!(
            DateRange::parse("yesterday", "2024-03-01"),
            Err(Error::InvalidDate(_))
        ));
    }

    #[test]
    fn test_window_covers_final_day() {
        let range = DateRange::parse("2024-03-01", "2024-03-01").unwrap();
        let window = range.to_window(offset()).unwrap();

        // Local midnight at UTC-3 is 03:00 UTC
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 3, 1, 3, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2024, 3, 2, 3, 0, 0).unwrap());
        assert!(window.contains(Utc.with_ymd_and_hms(2024, 3, 2, 2, 59, 59).unwrap()));
        assert!(!window.contains(window.end));
    }

    #[test]
    fn test_selector_parse() {
        assert_eq!(StationSelector::parse("all"), StationSelector::All);
        assert_eq!(StationSelector::parse("*"), StationSelector::All);
        assert_eq!(
            StationSelector::parse(" 12 "),
            StationSelector::Station(StationId::new("12"))
        );
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("Counter".parse::<BackendKind>().unwrap(), BackendKind::Counter);
        assert!("pyodbc".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_storage_key_uses_project_for_event_store() {
        let station = StationRecord::new("3", "Arroyo").with_project_id("P-03");
        assert_eq!(station.storage_key(BackendKind::Event).as_str(), "P-03");
        assert_eq!(station.storage_key(BackendKind::Counter).as_str(), "3");
    }

    #[test]
    fn test_location_from_dms() {
        let loc = Location::from_dms((34.0, 30.0, 0.0), 'S', (58.0, 45.0, 36.0), 'O').unwrap();
        assert!((loc.lat + 34.5).abs() < 1e-9);
        assert!((loc.lon + 58.76).abs() < 1e-9);

        assert!(Location::from_dms((0.0, 0.0, 0.0), 'S', (58.0, 0.0, 0.0), 'W').is_none());
    }

    #[test]
    fn test_counter_descriptor_semantics() {
        let rain = SensorDescriptor::counter("7", "Pluviometro", MetricKind::Rainfall);
        let battery = SensorDescriptor::counter("8", "Bateria", MetricKind::Battery);
        assert!(rain.is_counter());
        assert!(!battery.is_counter());
    }
}

//! Configuration management for the telemetry engine
//!
//! TOML file support with environment variable overrides and sensible
//! defaults. Every section is optional in the file.

use crate::alert::AlertThresholds;
use crate::error::{Error, Result, ValidationError};
use crate::types::{MetricKind, StationId};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Query pipeline settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Stations whose counters need special handling
    #[serde(default)]
    pub overrides: CounterOverrides,

    /// Alert thresholds keyed by station id
    #[serde(default)]
    pub alerts: BTreeMap<String, AlertThresholds>,

    /// Sensor classification keyword table
    #[serde(default)]
    pub classification: ClassificationConfig,
}

/// Query pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Station-local offset from UTC in minutes, used for hour/day buckets
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    /// Per-sensor fetch timeout in milliseconds
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// How far before the window the counter store is read to seed deltas
    #[serde(default = "default_counter_lookback_hours")]
    pub counter_lookback_hours: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

/// Per-station counter semantics overrides
///
/// Stations listed here report a value already accumulated for the day
/// instead of a raw incrementing counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CounterOverrides {
    /// Stations reporting daily-accumulated rainfall
    #[serde(default)]
    pub daily_accumulated: BTreeSet<StationId>,
}

impl CounterOverrides {
    /// Build from a list of station ids
    pub fn new<I, S>(stations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StationId>,
    {
        Self {
            daily_accumulated: stations.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if a station reports daily-accumulated values
    pub fn is_daily_accumulated(&self, station: &StationId) -> bool {
        self.daily_accumulated.contains(station)
    }
}

/// One row of the classification table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeywordRule {
    /// Kind assigned when the rule matches
    pub kind: MetricKind,
    /// Substrings matched against the lowercased sensor name/description
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Whole words matched against the lowercased sensor name/description
    #[serde(default)]
    pub tokens: Vec<String>,
}

impl KeywordRule {
    fn new(kind: MetricKind, keywords: &[&str], tokens: &[&str]) -> Self {
        Self {
            kind,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|k| text.contains(k.as_str()))
            || text
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| self.tokens.iter().any(|t| t == word))
    }
}

/// Ordered keyword table mapping sensor names to a `MetricKind`
///
/// The first matching rule wins, so more specific rules come first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClassificationConfig {
    /// Rules in priority order
    #[serde(default = "default_classification_rules")]
    pub rules: Vec<KeywordRule>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            rules: default_classification_rules(),
        }
    }
}

impl ClassificationConfig {
    /// Classify a sensor from its name and description
    pub fn classify(&self, text: &str) -> MetricKind {
        let text = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&text))
            .map(|rule| rule.kind)
            .unwrap_or(MetricKind::Other)
    }
}

// Default value functions
fn default_utc_offset_minutes() -> i32 { -180 }
fn default_fetch_timeout_ms() -> u64 { 10_000 }
fn default_counter_lookback_hours() -> u32 { 24 }
fn default_log_level() -> String { "info".to_string() }

fn default_classification_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new(MetricKind::Rainfall, &["pluvi", "rain", "lluvia"], &[]),
        KeywordRule::new(MetricKind::Groundwater, &["freati", "freáti", "groundwater"], &[]),
        KeywordRule::new(MetricKind::WaterLevel, &["limn", "level", "nivel"], &[]),
        KeywordRule::new(
            MetricKind::WindDirection,
            &["direcc", "veleta", "wind direction"],
            &[],
        ),
        KeywordRule::new(MetricKind::WindSpeed, &["anem", "viento", "wind"], &[]),
        KeywordRule::new(
            MetricKind::WaterQuality,
            &["temp agua", "temperatura del curso", "conduct", "turbi", "calidad", "quality"],
            &["ph"],
        ),
        KeywordRule::new(MetricKind::AirTemperature, &["temp"], &[]),
        KeywordRule::new(MetricKind::Humidity, &["humed", "humidity"], &[]),
        KeywordRule::new(MetricKind::SolarRadiation, &["pirano", "radiac", "solar"], &[]),
        KeywordRule::new(MetricKind::Pressure, &["presi", "baro", "pressure"], &[]),
        KeywordRule::new(MetricKind::Battery, &["bater", "battery"], &[]),
    ]
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            counter_lookback_hours: default_counter_lookback_hours(),
        }
    }
}

impl ServiceConfig {
    /// Station-local offset
    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            Error::Configuration(format!(
                "UTC offset of {} minutes is out of range",
                self.utc_offset_minutes
            ))
        })
    }

    /// Per-sensor fetch timeout
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Counter lookback period
    pub fn counter_lookback(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.counter_lookback_hours))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        contents.parse().map_err(|e: Error| {
            Error::Configuration(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(offset) = std::env::var("TELEMETRY_UTC_OFFSET_MINUTES") {
            if let Ok(v) = offset.parse() {
                self.service.utc_offset_minutes = v;
            }
        }
        if let Ok(timeout) = std::env::var("TELEMETRY_FETCH_TIMEOUT_MS") {
            if let Ok(v) = timeout.parse() {
                self.service.fetch_timeout_ms = v;
            }
        }
        if let Ok(lookback) = std::env::var("TELEMETRY_COUNTER_LOOKBACK_HOURS") {
            if let Ok(v) = lookback.parse() {
                self.service.counter_lookback_hours = v;
            }
        }

        // Logging
        if let Ok(level) = std::env::var("TELEMETRY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(json) = std::env::var("TELEMETRY_LOG_JSON") {
            self.logging.json = matches!(json.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.service.utc_offset_minutes.unsigned_abs() > 14 * 60 {
            return Err(ValidationError::OutOfRange {
                field: "service.utc_offset_minutes".to_string(),
                value: self.service.utc_offset_minutes.to_string(),
                min: "-840".to_string(),
                max: "840".to_string(),
            }
            .into());
        }

        if self.service.fetch_timeout_ms == 0 {
            return Err(Error::Configuration("Fetch timeout must be > 0".to_string()));
        }

        if self.service.counter_lookback_hours > 24 * 31 {
            return Err(ValidationError::OutOfRange {
                field: "service.counter_lookback_hours".to_string(),
                value: self.service.counter_lookback_hours.to_string(),
                min: "0".to_string(),
                max: "744".to_string(),
            }
            .into());
        }

        for (station, thresholds) in &self.alerts {
            thresholds.validate().map_err(|message| ValidationError::InvalidFormat {
                field: format!("alerts.{}", station),
                message,
            })?;
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

impl std::str::FromStr for TelemetryConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service.utc_offset_minutes, -180);
        assert_eq!(config.service.counter_lookback_hours, 24);
        assert!(config.validate().is_ok());
        assert_eq!(config.service.offset().unwrap().local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn test_parse_full_config() {
        let config: TelemetryConfig = r#"
            [service]
            utc_offset_minutes = 0
            fetch_timeout_ms = 2500

            [logging]
            level = "debug"
            json = true

            [overrides]
            daily_accumulated = ["12", "14"]

            [alerts.7]
            yellow = 0.71
            orange = 4.01
            red = 8.02
        "#
        .parse()
        .unwrap();

        assert_eq!(config.service.fetch_timeout(), Duration::from_millis(2500));
        assert_eq!(config.service.counter_lookback_hours, 24);
        assert!(config.logging.json);
        assert!(config.overrides.is_daily_accumulated(&StationId::new("12")));
        assert!(!config.overrides.is_daily_accumulated(&StationId::new("1")));
        assert_eq!(config.alerts["7"].red, 8.02);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_offset() {
        let mut config = TelemetryConfig::default();
        config.service.utc_offset_minutes = 15 * 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_extreme_offset_rejected() {
        let mut config = TelemetryConfig::default();
        config.service.utc_offset_minutes = i32::MIN;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_unordered_alert_thresholds_rejected() {
        let mut config = TelemetryConfig::default();
        config.alerts.insert(
            "7".to_string(),
            AlertThresholds {
                yellow: 5.0,
                orange: 4.0,
                red: 8.0,
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_classification_table() {
        let table = ClassificationConfig::default();
        assert_eq!(table.classify("Pluviómetro"), MetricKind::Rainfall);
        assert_eq!(table.classify("Nivel freático"), MetricKind::Groundwater);
        assert_eq!(table.classify("Limnímetro (Nivel)"), MetricKind::WaterLevel);
        assert_eq!(table.classify("Veleta (Dirección)"), MetricKind::WindDirection);
        assert_eq!(table.classify("Anemómetro"), MetricKind::WindSpeed);
        assert_eq!(table.classify("Calidad - pH"), MetricKind::WaterQuality);
        assert_eq!(table.classify("Temp Agua"), MetricKind::WaterQuality);
        assert_eq!(table.classify("Temperatura aire"), MetricKind::AirTemperature);
        assert_eq!(table.classify("Batería"), MetricKind::Battery);
        assert_eq!(table.classify("Barometrica"), MetricKind::Pressure);
        assert_eq!(table.classify("Graphite probe"), MetricKind::Other);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.toml");

        let mut config = TelemetryConfig::default();
        config.overrides = CounterOverrides::new(["9"]);
        config.save_to_file(&path).unwrap();

        let loaded = TelemetryConfig::from_file(&path).unwrap();
        assert!(loaded.overrides.is_daily_accumulated(&StationId::new("9")));
        assert_eq!(loaded.classification, ClassificationConfig::default());
    }
}

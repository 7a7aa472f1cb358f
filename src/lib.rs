//! Hydromet Telemetry - normalization and aggregation of station telemetry
//!
//! This library turns raw readings from a fleet of remote environmental
//! stations into series ready for charts and reports:
//! - Two structurally different stores behind one adapter contract
//! - Incremental values reconstructed from cumulative rain counters
//! - Raw, hourly and daily reductions on a station-local clock
//! - Heterogeneous series aligned on one shared axis for dual-axis charts
//! - Threshold alerts on water levels

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

/// Configuration management with TOML support
pub mod config;

/// Tracing subscriber setup
pub mod logging;

/// Adapters over the event and counter stores
pub mod backend;

/// Station and sensor metadata collaborator
pub mod directory;

/// Process-wide map of which sensors have reported per station
pub mod catalog;

/// Delta reconstruction for cumulative counters
pub mod delta;

/// Reduction into raw, hourly and daily buckets
pub mod aggregation;

/// Shared-axis chart composition
pub mod chart;

/// Water level threshold alerts
pub mod alert;

/// Public façade tying fetch, reconstruction, reduction and composition together
pub mod service;

// Re-export main types
pub use config::TelemetryConfig;
pub use error::{Error, Result};
pub use service::{TelemetryService, TelemetryServiceBuilder};
pub use types::{BackendKind, DateRange, Reading, SensorDescriptor, StationId, StationSelector};

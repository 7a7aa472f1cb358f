//! Sensor catalog cache
//!
//! Answers "which sensors have ever reported for this station" without a
//! backend round-trip. The catalog is built from one distinct-pair scan per
//! backend and replaced wholesale on every rebuild; readers work on an
//! `Arc` snapshot so a rebuild never blocks or tears a lookup.
//!
//! A sensor provisioned after the last rebuild stays invisible until the
//! next explicit [`SensorCatalogCache::rebuild`].
//!
//! # Example
//!
//! ```rust
//! use hydromet_telemetry::catalog::SensorCatalogCache;
//! use hydromet_telemetry::types::{BackendKind, StationSelector};
//!
//! let catalog = SensorCatalogCache::new();
//! // Unknown stations are simply empty
//! assert!(catalog.lookup(BackendKind::Counter, &StationSelector::parse("12")).is_empty());
//! ```

use crate::backend::{BackendAdapter, Backends};
use crate::types::{BackendKind, SensorId, StationId, StationSelector};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Station to sensor-set mapping for one backend
pub type StationSensors = BTreeMap<StationId, BTreeSet<SensorId>>;

/// Immutable catalog contents for every backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    entries: BTreeMap<BackendKind, StationSensors>,
}

impl CatalogSnapshot {
    /// Mapping for one backend, empty when the backend was unavailable
    pub fn backend(&self, backend: BackendKind) -> Option<&StationSensors> {
        self.entries.get(&backend)
    }
}

/// Process-wide sensor catalog
#[derive(Debug, Default)]
pub struct SensorCatalogCache {
    inner: RwLock<Arc<CatalogSnapshot>>,
}

impl SensorCatalogCache {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the mapping for one backend
    ///
    /// A failed scan yields an empty mapping and a warning.
    pub async fn build(adapter: &dyn BackendAdapter) -> StationSensors {
        match adapter.scan_sensor_pairs().await {
            Ok(pairs) => {
                let mut mapping = StationSensors::new();
                for (station, sensor) in pairs {
                    mapping.entry(station).or_default().insert(sensor);
                }
                mapping
            },
            Err(e) => {
                warn!(
                    backend = %adapter.kind(),
                    error = %e,
                    "Catalog unavailable, backend will report no sensors until next rebuild"
                );
                StationSensors::new()
            },
        }
    }

    /// Rebuild every backend and swap the result in atomically
    ///
    /// Always replaces, never merges.
    pub async fn rebuild(&self, backends: &Backends) {
        let (event, counter) = futures::join!(
            Self::build(backends.adapter(BackendKind::Event)),
            Self::build(backends.adapter(BackendKind::Counter)),
        );

        let mut entries = BTreeMap::new();
        entries.insert(BackendKind::Event, event);
        entries.insert(BackendKind::Counter, counter);
        let snapshot = Arc::new(CatalogSnapshot { entries });

        info!(
            event_stations = snapshot.backend(BackendKind::Event).map_or(0, |m| m.len()),
            counter_stations = snapshot.backend(BackendKind::Counter).map_or(0, |m| m.len()),
            "Sensor catalog rebuilt"
        );
        *self.inner.write() = snapshot;
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.inner.read().clone()
    }

    /// Sensors that have reported for the selected stations
    ///
    /// The wildcard selector returns the union across stations.
    pub fn lookup(&self, backend: BackendKind, selector: &StationSelector) -> BTreeSet<SensorId> {
        let snapshot = self.snapshot();
        let Some(mapping) = snapshot.backend(backend) else {
            return BTreeSet::new();
        };
        match selector {
            StationSelector::All => mapping.values().flatten().cloned().collect(),
            StationSelector::Station(id) => mapping.get(id).cloned().unwrap_or_default(),
        }
    }

    /// Stations with at least one reporting sensor
    pub fn stations(&self, backend: BackendKind) -> Vec<StationId> {
        self.snapshot()
            .backend(backend)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Check whether a sensor has reported for a station
    pub fn contains(&self, backend: BackendKind, station: &StationId, sensor: &SensorId) -> bool {
        self.snapshot()
            .backend(backend)
            .and_then(|m| m.get(station))
            .is_some_and(|sensors| sensors.contains(sensor))
    }
}

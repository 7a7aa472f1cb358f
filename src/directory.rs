//! Station and sensor metadata collaborator
//!
//! The [`StationDirectory`] trait is the read-only metadata source the
//! service consults for station records and sensor descriptors. Where the
//! metadata lives is up to the implementation; [`InMemoryDirectory`] keeps it
//! in memory for tests and development.
//!
//! Sensor classification happens once, when a descriptor is built with
//! [`describe_sensor`], never per reading.

use crate::config::ClassificationConfig;
use crate::error::BackendError;
use crate::types::{BackendKind, SensorDescriptor, SensorId, StationId, StationRecord};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Read-only station metadata source
#[async_trait]
pub trait StationDirectory: Send + Sync + 'static {
    /// Every station known to a backend
    async fn list_stations(&self, backend: BackendKind) -> Result<Vec<StationRecord>, BackendError>;

    /// A station by id or project id
    async fn station_by_id(
        &self,
        backend: BackendKind,
        id: &StationId,
    ) -> Result<Option<StationRecord>, BackendError>;

    /// Descriptors for the given sensor ids; unknown ids are skipped
    async fn describe_sensors(
        &self,
        backend: BackendKind,
        ids: &[SensorId],
    ) -> Result<Vec<SensorDescriptor>, BackendError>;
}

/// Build a classified descriptor from the raw metadata a store keeps
///
/// `text` is whatever describes the sensor (name, description or both).
pub fn describe_sensor(
    backend: BackendKind,
    id: impl Into<SensorId>,
    name: impl Into<String>,
    text: &str,
    classification: &ClassificationConfig,
) -> SensorDescriptor {
    let kind = classification.classify(text);
    let id = id.into();
    match backend {
        BackendKind::Event => {
            let metric = id.as_str().to_string();
            SensorDescriptor::event(id, name, metric, kind)
        },
        BackendKind::Counter => SensorDescriptor::counter(id, name, kind),
    }
}

// =============================================================================
// In-memory directory
// =============================================================================

/// In-memory [`StationDirectory`]
#[derive(Default)]
pub struct InMemoryDirectory {
    stations: RwLock<BTreeMap<BackendKind, Vec<StationRecord>>>,
    sensors: RwLock<BTreeMap<(BackendKind, SensorId), SensorDescriptor>>,
    failure: RwLock<Option<BackendError>>,
}

impl InMemoryDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a station with a backend
    pub fn add_station(&self, backend: BackendKind, station: StationRecord) {
        self.stations.write().entry(backend).or_default().push(station);
    }

    /// Register a sensor under the backend named in its descriptor
    pub fn add_sensor(&self, sensor: SensorDescriptor) {
        self.sensors
            .write()
            .insert((sensor.backend, sensor.id.clone()), sensor);
    }

    /// Make every call fail with `error`, or clear the failure with `None`
    pub fn fail_with(&self, error: Option<BackendError>) {
        *self.failure.write() = error;
    }

    fn check_failure(&self) -> Result<(), BackendError> {
        match self.failure.read().as_ref() {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StationDirectory for InMemoryDirectory {
    async fn list_stations(
        &self,
        backend: BackendKind,
    ) -> Result<Vec<StationRecord>, BackendError> {
        self.check_failure()?;
        Ok(self.stations.read().get(&backend).cloned().unwrap_or_default())
    }

    async fn station_by_id(
        &self,
        backend: BackendKind,
        id: &StationId,
    ) -> Result<Option<StationRecord>, BackendError> {
        self.check_failure()?;
        Ok(self.stations.read().get(&backend).and_then(|stations| {
            stations
                .iter()
                .find(|s| s.id == *id || s.project_id.as_ref() == Some(id))
                .cloned()
        }))
    }

    async fn describe_sensors(
        &self,
        backend: BackendKind,
        ids: &[SensorId],
    ) -> Result<Vec<SensorDescriptor>, BackendError> {
        self.check_failure()?;
        let sensors = self.sensors.read();
        Ok(ids
            .iter()
            .filter_map(|id| sensors.get(&(backend, id.clone())).cloned())
            .collect())
    }
}

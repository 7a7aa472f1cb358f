//! Backend adapters over the two physical reading stores
//!
//! Each store is reached through a [`ReadingSource`] query collaborator. The
//! adapters on top of it implement one capability contract,
//! [`BackendAdapter`], and differ only in how they phrase the query:
//!
//! - [`EventReadingStore`]: rows filed under a physical metric name
//! - [`CounterReadingStore`]: one running counter per sensor, optionally read
//!   from one lookback period before the window so the first delta has a
//!   true predecessor
//!
//! Adapters contain failures: a query error or timeout is logged and turns
//! into an empty reading sequence, so one failing sensor never aborts a
//! multi-sensor request.
//!
//! [`Backends`] holds exactly one adapter of each kind and dispatches on
//! [`BackendKind`].

pub mod counter;
pub mod event;
pub mod memory;

pub use counter::CounterReadingStore;
pub use event::EventReadingStore;
pub use memory::InMemorySource;

use crate::error::BackendError;
use crate::types::{
    BackendKind, Reading, SensorDescriptor, SensorId, StationId, StationSelector, TimeWindow,
};
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

// =============================================================================
// ReadingSource Trait
// =============================================================================

/// How a query selects the channel it reads
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceFilter {
    /// Rows filed under a physical metric name
    Metric(String),
    /// Rows of a specific sensor id
    Sensor(SensorId),
}

impl SourceFilter {
    /// Channel key the filter matches
    pub fn key(&self) -> &str {
        match self {
            SourceFilter::Metric(m) => m,
            SourceFilter::Sensor(s) => s.as_str(),
        }
    }
}

/// Query handed to a physical store
#[derive(Debug, Clone, PartialEq)]
pub struct SourceQuery {
    /// Station filter, `None` for every station
    pub station: Option<StationId>,
    /// Channel filter
    pub filter: SourceFilter,
    /// Half-open time window
    pub window: TimeWindow,
}

/// Physical store behind an adapter
///
/// Connection and authentication details live in the implementation.
#[async_trait]
pub trait ReadingSource: Send + Sync + 'static {
    /// Identifier used in logs
    fn source_id(&self) -> &str;

    /// Fetch rows matching the query, in any order
    async fn query(&self, query: &SourceQuery) -> Result<Vec<Reading>, BackendError>;

    /// Every distinct (station, sensor) pair that has ever reported
    async fn distinct_pairs(&self) -> Result<Vec<(StationId, SensorId)>, BackendError>;
}

// =============================================================================
// BackendAdapter Trait
// =============================================================================

/// One fetch for one sensor
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    /// Stations covered
    pub station: &'a StationSelector,
    /// Sensor to read
    pub sensor: &'a SensorDescriptor,
    /// Requested window
    pub window: TimeWindow,
    /// Read one extra period before the window (counter store only)
    pub lookback: bool,
}

/// Capability contract shared by both stores
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Which store this adapter reads
    fn kind(&self) -> BackendKind;

    /// Fetch raw readings sorted ascending by timestamp
    ///
    /// Never fails: errors and timeouts are logged and yield an empty vector.
    async fn fetch_raw(&self, request: &FetchRequest<'_>) -> Vec<Reading>;

    /// Distinct (station, sensor) scan used to build the sensor catalog
    async fn scan_sensor_pairs(&self) -> Result<Vec<(StationId, SensorId)>, BackendError>;

    /// Fetch counters
    fn stats(&self) -> FetchStatsSnapshot;
}

/// Counters kept by each adapter
#[derive(Debug, Default)]
pub struct FetchStats {
    /// Fetches issued
    pub fetches: AtomicU64,
    /// Fetches that failed with a store error
    pub failures: AtomicU64,
    /// Fetches that timed out
    pub timeouts: AtomicU64,
    /// Rows returned
    pub rows: AtomicU64,
}

impl FetchStats {
    /// Get a snapshot of current statistics
    pub fn snapshot(&self) -> FetchStatsSnapshot {
        FetchStatsSnapshot {
            fetches: self.fetches.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            rows: self.rows.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of adapter statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStatsSnapshot {
    /// Fetches issued
    pub fetches: u64,
    /// Fetches that failed with a store error
    pub failures: u64,
    /// Fetches that timed out
    pub timeouts: u64,
    /// Rows returned
    pub rows: u64,
}

/// Run a store call under a timeout
pub(crate) async fn with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(timeout)),
    }
}

/// Turn a store result into the adapter's never-failing output
///
/// Logs failures, records stats and sorts rows ascending by timestamp.
/// The sort is stable so duplicate timestamps keep store order.
pub(crate) fn settle(
    kind: BackendKind,
    request: &FetchRequest<'_>,
    result: Result<Vec<Reading>, BackendError>,
    stats: &FetchStats,
) -> Vec<Reading> {
    stats.fetches.fetch_add(1, Ordering::Relaxed);
    match result {
        Ok(mut rows) => {
            rows.sort_by_key(|r| r.timestamp);
            stats.rows.fetch_add(rows.len() as u64, Ordering::Relaxed);
            debug!(
                backend = %kind,
                station = %request.station,
                sensor = %request.sensor.id,
                rows = rows.len(),
                "Fetched raw readings"
            );
            rows
        },
        Err(e) => {
            if matches!(e, BackendError::Timeout(_)) {
                stats.timeouts.fetch_add(1, Ordering::Relaxed);
            } else {
                stats.failures.fetch_add(1, Ordering::Relaxed);
            }
            warn!(
                backend = %kind,
                station = %request.station,
                sensor = %request.sensor.id,
                error = %e,
                "Fetch failed, continuing with an empty series for this sensor"
            );
            Vec::new()
        },
    }
}

// =============================================================================
// Backends
// =============================================================================

/// The two adapters, selected by [`BackendKind`]
pub struct Backends {
    /// Event store adapter
    pub event: EventReadingStore,
    /// Counter store adapter
    pub counter: CounterReadingStore,
}

impl Backends {
    /// Bundle both adapters
    pub fn new(event: EventReadingStore, counter: CounterReadingStore) -> Self {
        Self { event, counter }
    }

    /// Adapter for a backend
    pub fn adapter(&self, kind: BackendKind) -> &dyn BackendAdapter {
        match kind {
            BackendKind::Event => &self.event,
            BackendKind::Counter => &self.counter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_maps_elapsed() {
        let result: Result<(), BackendError> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;

        assert_eq!(result, Err(BackendError::Timeout(Duration::from_millis(10))));
    }

    #[test]
    fn test_filter_key() {
        assert_eq!(SourceFilter::Metric("Bateria".into()).key(), "Bateria");
        assert_eq!(SourceFilter::Sensor(SensorId::new("7")).key(), "7");
    }
}

//! Event store adapter
//!
//! Every row is an independent measurement filed under a physical metric
//! name, so the adapter selects rows by the descriptor's metric label.

use super::{
    settle, with_timeout, BackendAdapter, FetchRequest, FetchStats, FetchStatsSnapshot,
    ReadingSource, SourceFilter, SourceQuery,
};
use crate::error::BackendError;
use crate::types::{BackendKind, Reading, SensorId, StationId};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Adapter over the event store
pub struct EventReadingStore {
    source: Arc<dyn ReadingSource>,
    timeout: Duration,
    stats: FetchStats,
}

impl EventReadingStore {
    /// Create an adapter with a per-call timeout
    pub fn new(source: Arc<dyn ReadingSource>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            stats: FetchStats::default(),
        }
    }

    fn build_query(request: &FetchRequest<'_>) -> SourceQuery {
        SourceQuery {
            station: request.station.station().cloned(),
            filter: SourceFilter::Metric(request.sensor.metric.clone()),
            window: request.window,
        }
    }
}

#[async_trait]
impl BackendAdapter for EventReadingStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Event
    }

    async fn fetch_raw(&self, request: &FetchRequest<'_>) -> Vec<Reading> {
        // Lookback has no meaning for independent events
        let query = Self::build_query(request);
        let result = with_timeout(self.timeout, self.source.query(&query)).await;
        settle(self.kind(), request, result, &self.stats)
    }

    async fn scan_sensor_pairs(&self) -> Result<Vec<(StationId, SensorId)>, BackendError> {
        with_timeout(self.timeout, self.source.distinct_pairs()).await
    }

    fn stats(&self) -> FetchStatsSnapshot {
        self.stats.snapshot()
    }
}

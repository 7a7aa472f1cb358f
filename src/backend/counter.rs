//! Counter store adapter
//!
//! Rows are selected by sensor id. Rain gauges in this store report a
//! running total, so when the caller asks for lookback the query starts one
//! lookback period before the window: the first in-window delta then has a
//! real predecessor instead of defaulting to zero.

use super::{
    settle, with_timeout, BackendAdapter, FetchRequest, FetchStats, FetchStatsSnapshot,
    ReadingSource, SourceFilter, SourceQuery,
};
use crate::error::BackendError;
use crate::types::{BackendKind, Reading, SensorId, StationId};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Adapter over the counter store
pub struct CounterReadingStore {
    source: Arc<dyn ReadingSource>,
    timeout: Duration,
    lookback: chrono::Duration,
    stats: FetchStats,
}

impl CounterReadingStore {
    /// Create an adapter with a per-call timeout and lookback period
    pub fn new(
        source: Arc<dyn ReadingSource>,
        timeout: Duration,
        lookback: chrono::Duration,
    ) -> Self {
        Self {
            source,
            timeout,
            lookback,
            stats: FetchStats::default(),
        }
    }

    fn build_query(&self, request: &FetchRequest<'_>) -> SourceQuery {
        let window = if request.lookback {
            request.window.extended_back(self.lookback)
        } else {
            request.window
        };
        SourceQuery {
            station: request.station.station().cloned(),
            filter: SourceFilter::Sensor(request.sensor.id.clone()),
            window,
        }
    }
}

#[async_trait]
impl BackendAdapter for CounterReadingStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Counter
    }

    async fn fetch_raw(&self, request: &FetchRequest<'_>) -> Vec<Reading> {
        let query = self.build_query(request);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemorySource;
    use crate::types::{MetricKind, SensorDescriptor, StationSelector, TimeWindow};
    use chrono::{TimeZone, Utc};

    fn rain() -> SensorDescriptor {
        SensorDescriptor::counter("7", "Pluviometro", MetricKind::Rainfall)
    }

    fn source() -> Arc<InMemorySource> {
        let source = InMemorySource::new("counter");
        source.insert("12", "7", Utc.with_ymd_and_hms(2024, 2, 29, 18, 0, 0).unwrap(), 100.0);
        source.insert("12", "7", Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap(), 102.0);
        source.insert("12", "8", Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap(), 12.7);
        Arc::new(source)
    }

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_lookback_reads_prior_period() {
        let store = CounterReadingStore::new(
            source(),
            Duration::from_secs(1),
            chrono::Duration::hours(24),
        );
        let selector = StationSelector::parse("12");
        let sensor = rain();

        let with_lookback = store
            .fetch_raw(&FetchRequest {
                station: &selector,
                sensor: &sensor,
                window: window(),
                lookback: true,
            })
            .await;
        let without = store
            .fetch_raw(&FetchRequest {
                station: &selector,
                sensor: &sensor,
                window: window(),
                lookback: false,
            })
            .await;

        assert_eq!(with_lookback.len(), 2);
        assert_eq!(with_lookback[0].value, 100.0);
        assert_eq!(without.len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_empty() {
        let source = source();
        source.set_delay(Some(Duration::from_millis(200)));
        let store = CounterReadingStore::new(
            source,
            Duration::from_millis(20),
            chrono::Duration::hours(24),
        );
        let sensor = rain();

        let rows = store
            .fetch_raw(&FetchRequest {
                station: &StationSelector::All,
                sensor: &sensor,
                window: window(),
                lookback: true,
            })
            .await;

        assert!(rows.is_empty());
        assert_eq!(store.stats().timeouts, 1);
    }
}

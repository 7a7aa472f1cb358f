//! In-memory reading store
//!
//! A [`ReadingSource`] that keeps rows in memory, for tests and local
//! development without a database. Failures and latency can be injected to
//! exercise the degradation paths of the adapters above it.
//!
//! Rows are filed under a channel key: the metric name for event-store data,
//! the sensor id for counter-store data.
//!
//! # Example
//!
//! ```rust
//! use hydromet_telemetry::backend::InMemorySource;
//! use chrono::{TimeZone, Utc};
//!
//! let source = InMemorySource::new("counter");
//! source.insert("12", "7", Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(), 104.2);
//! assert_eq!(source.len(), 1);
//! ```

use super::{ReadingSource, SourceQuery};
use crate::error::BackendError;
use crate::types::{Reading, SensorId, StationId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

struct StoredRow {
    channel: String,
    reading: Reading,
}

/// In-memory [`ReadingSource`]
pub struct InMemorySource {
    id: String,
    rows: RwLock<Vec<StoredRow>>,
    failure: RwLock<Option<BackendError>>,
    failing_channels: RwLock<HashSet<String>>,
    delay: RwLock<Option<Duration>>,
    queries: AtomicU64,
}

impl InMemorySource {
    /// Create an empty source
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rows: RwLock::new(Vec::new()),
            failure: RwLock::new(None),
            failing_channels: RwLock::new(HashSet::new()),
            delay: RwLock::new(None),
            queries: AtomicU64::new(0),
        }
    }

    /// Store one row
    pub fn insert(
        &self,
        station: impl Into<StationId>,
        channel: impl Into<String>,
        timestamp: DateTime<Utc>,
        value: f64,
    ) {
        self.rows.write().push(StoredRow {
            channel: channel.into(),
            reading: Reading::new(station, timestamp, value),
        });
    }

    /// Store many rows under one channel
    pub fn insert_readings(&self, channel: &str, readings: impl IntoIterator<Item = Reading>) {
        let mut rows = self.rows.write();
        rows.extend(readings.into_iter().map(|reading| StoredRow {
            channel: channel.to_string(),
            reading,
        }));
    }

    /// Number of stored rows
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Check if the source holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Make every call fail with `error`, or clear the failure with `None`
    pub fn fail_with(&self, error: Option<BackendError>) {
        *self.failure.write() = error;
    }

    /// Make queries on one channel fail
    pub fn fail_channel(&self, channel: impl Into<String>) {
        self.failing_channels.write().insert(channel.into());
    }

    /// Delay every call by `delay`
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    /// Number of queries served, including failed ones
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    async fn simulate_latency(&self) {
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_failure(&self) -> Result<(), BackendError> {
        match self.failure.read().as_ref() {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ReadingSource for InMemorySource {
    fn source_id(&self) -> &str {
        &self.id
    }

    async fn query(&self, query: &SourceQuery) -> Result<Vec<Reading>, BackendError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;
        self.check_failure()?;

        let channel = query.filter.key();
        if self.failing_channels.read().contains(channel) {
            return Err(BackendError::Query(format!(
                "{}: query on '{}' failed",
                self.id, channel
            )));
        }

        let rows = self.rows.read();
        Ok(rows
            .iter()
            .filter(|row| row.channel == channel)
            .filter(|row| {
                query
                    .station
                    .as_ref()
                    .map_or(true, |s| *s == row.reading.station_id)
            })
            .filter(|row| query.window.contains(row.reading.timestamp))
            .map(|row| row.reading.clone())
            .collect())
    }

    async fn distinct_pairs(&self) -> Result<Vec<(StationId, SensorId)>, BackendError> {
        self.simulate_latency().await;
        self.check_failure()?;

        let rows = self.rows.read();
        let pairs: BTreeSet<(StationId, SensorId)> = rows
            .iter()
            .map(|row| {
                (
                    row.reading.station_id.clone(),
                    SensorId::new(row.channel.as_str()),
                )
            })
            .collect();
        Ok(pairs.into_iter().collect())
    }
}

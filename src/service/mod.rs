//! Public façade of the telemetry engine
//!
//! [`TelemetryService`] ties the pieces together for one request:
//!
//! ```text
//! SeriesRequest
//!      │ validate range, resolve sensors via the catalog
//!      ▼
//! BackendAdapter::fetch_raw   (one concurrent fetch per sensor)
//!      │
//!      ▼
//! DeltaReconstructor          (counter sensors only)
//!      │
//!      ▼
//! Aggregator::reduce_with     (per station, per sensor)
//!      │
//!      ▼
//! ChartComposer / report rows
//! ```
//!
//! Malformed requests are rejected before any store is touched. Store
//! failures never surface as errors: the affected sensor comes back empty.
//!
//! # Example
//!
//! ```rust
//! use hydromet_telemetry::backend::InMemorySource;
//! use hydromet_telemetry::directory::InMemoryDirectory;
//! use hydromet_telemetry::service::{SeriesRequest, TelemetryServiceBuilder};
//! use hydromet_telemetry::types::{MetricKind, SensorDescriptor};
//! use chrono::{TimeZone, Utc};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let counters = InMemorySource::new("counter");
//! counters.insert("12", "7", Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(), 100.0);
//! counters.insert("12", "7", Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap(), 104.0);
//!
//! let service = TelemetryServiceBuilder::new()
//!     .with_event_source(InMemorySource::new("event"))
//!     .with_counter_source(counters)
//!     .with_directory(InMemoryDirectory::new())
//!     .build()
//!     .await
//!     .unwrap();
//!
//! let rain = SensorDescriptor::counter("7", "Pluviometro", MetricKind::Rainfall);
//! let request =
//!     SeriesRequest::parse("counter", "12", vec![rain], "2024-03-01", "2024-03-01", None)
//!         .unwrap();
//! let series = service.get_series(&request).await.unwrap();
//! assert_eq!(series[0].points[0].value.max(), 4.0);
//! # }
//! ```

pub mod builder;
pub mod request;

pub use builder::TelemetryServiceBuilder;
pub use request::{
    ChartLayout, LatestValue, ReportRow, SensorSeries, SeriesRequest, StationLocation,
    StationSnapshot,
};

use crate::aggregation::{Aggregator, LocalClock, ProcessingMode};
use crate::alert::AlertEvaluator;
use crate::backend::{BackendAdapter, Backends, FetchRequest, FetchStatsSnapshot};
use crate::catalog::SensorCatalogCache;
use crate::chart::{compose, separate, ChartPayload, ComposerInput};
use crate::delta::DeltaReconstructor;
use crate::directory::StationDirectory;
use crate::error::Result;
use crate::types::{
    BackendKind, DateRange, MetricKind, Reading, SensorDescriptor, SensorId, StationId,
    StationRecord, StationSelector, TimeWindow,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

// =============================================================================
// Statistics
// =============================================================================

#[derive(Debug, Default)]
struct ServiceStats {
    requests: AtomicU64,
    rejected: AtomicU64,
    sensors_fetched: AtomicU64,
    empty_series: AtomicU64,
}

/// Snapshot of service statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStatsSnapshot {
    /// Series requests received
    pub requests: u64,
    /// Requests rejected as malformed
    pub rejected: u64,
    /// Sensor fetches issued
    pub sensors_fetched: u64,
    /// Series that came back without points
    pub empty_series: u64,
    /// Event store adapter counters
    pub event: FetchStatsSnapshot,
    /// Counter store adapter counters
    pub counter: FetchStatsSnapshot,
}

// =============================================================================
// TelemetryService
// =============================================================================

/// Telemetry normalization and aggregation service
pub struct TelemetryService {
    backends: Backends,
    catalog: Arc<SensorCatalogCache>,
    directory: Arc<dyn StationDirectory>,
    reconstructor: DeltaReconstructor,
    aggregator: Aggregator,
    alerts: AlertEvaluator,
    stats: ServiceStats,
}

impl TelemetryService {
    /// Sensor catalog shared with the service
    pub fn catalog(&self) -> &Arc<SensorCatalogCache> {
        &self.catalog
    }

    /// Clock used for windows and buckets
    pub fn clock(&self) -> &LocalClock {
        self.aggregator.clock()
    }

    /// Rebuild the sensor catalog from both stores
    pub async fn rebuild_cache(&self) {
        self.catalog.rebuild(&self.backends).await;
    }

    /// Reduced points per (station, sensor)
    ///
    /// For a single station every resolved sensor yields one series, empty
    /// when the store had nothing. For the wildcard selector every station
    /// with readings yields its own series.
    pub async fn get_series(&self, request: &SeriesRequest) -> Result<Vec<SensorSeries>> {
        self.stats.requests.fetch_add(1, Ordering::Relaxed);
        let window = match self.validate(&request.range) {
            Ok(window) => window,
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            },
        };

        let sensors = self.resolve_sensors(request);
        debug!(
            backend = %request.backend,
            station = %request.station,
            sensors = sensors.len(),
            start = %request.range.start,
            end = %request.range.end,
            "Series request"
        );

        let results = self
            .fetch_all(request.backend, &request.station, &sensors, window)
            .await;

        let mut out = Vec::new();
        for (sensor, readings) in sensors.iter().zip(results) {
            out.extend(self.process(request, sensor, readings, window));
        }
        Ok(out)
    }

    /// Chart payloads for a request
    pub async fn get_chart(
        &self,
        request: &SeriesRequest,
        layout: ChartLayout,
    ) -> Result<Vec<ChartPayload>> {
        let series = self.get_series(request).await?;
        let multi_station = request.station == StationSelector::All;

        let inputs: Vec<ComposerInput> = series
            .into_iter()
            .map(|s| {
                let label = if multi_station {
                    format!("{} - {}", s.sensor.name, s.station_id)
                } else {
                    s.sensor.name.clone()
                };
                ComposerInput::new(label, s.sensor.kind, s.points)
            })
            .collect();

        Ok(match layout {
            ChartLayout::Combined => {
                let title = self.chart_title(request).await;
                vec![compose(title, &inputs)]
            },
            ChartLayout::Separate => separate(&inputs),
        })
    }

    /// Flat rows for a spreadsheet writer
    pub async fn report_rows(&self, request: &SeriesRequest) -> Result<Vec<ReportRow>> {
        let series = self.get_series(request).await?;
        let stations = self.station_index(request.backend).await;

        let mut rows = Vec::new();
        for s in series {
            let record = stations.get(&s.station_id);
            let station_name = record
                .map(|r| r.name.clone())
                .unwrap_or_else(|| s.station_id.to_string());
            let municipality = record.and_then(|r| r.municipality.clone());
            let unit = s.sensor.kind.unit().to_string();

            for point in &s.points {
                let (value, min, max) = ReportRow::split_value(&point.value);
                rows.push(ReportRow {
                    station_id: s.station_id.clone(),
                    station_name: station_name.clone(),
                    municipality: municipality.clone(),
                    sensor: s.sensor.name.clone(),
                    bucket: point.bucket.label(),
                    value,
                    min,
                    max,
                    unit: unit.clone(),
                    mode: s.mode.label().to_string(),
                });
            }
        }
        Ok(rows)
    }

    /// Descriptors of the sensors that have reported for a selection
    ///
    /// Sorted by name. The wildcard selector keeps one descriptor per name.
    pub async fn sensors_for_station(
        &self,
        backend: BackendKind,
        selector: &StationSelector,
    ) -> Vec<SensorDescriptor> {
        let ids: Vec<SensorId> = self.catalog.lookup(backend, selector).into_iter().collect();
        if ids.is_empty() {
            return Vec::new();
        }

        let mut sensors = match self.directory.describe_sensors(backend, &ids).await {
            Ok(sensors) => sensors,
            Err(e) => {
                warn!(backend = %backend, error = %e, "Sensor metadata unavailable");
                return Vec::new();
            },
        };
        sensors.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        if *selector == StationSelector::All {
            sensors.dedup_by(|a, b| a.name == b.name);
        }
        sensors
    }

    /// `(storage key, display label)` of every station, sorted by label
    pub async fn list_stations(&self, backend: BackendKind) -> Vec<(StationId, String)> {
        let mut stations: Vec<(StationId, String)> = self
            .load_stations(backend)
            .await
            .iter()
            .map(|s| (s.storage_key(backend).clone(), s.display_label()))
            .collect();
        stations.sort_by(|a, b| a.1.cmp(&b.1));
        stations
    }

    /// Stations with a surveyed position
    pub async fn station_locations(&self, backend: BackendKind) -> Vec<StationLocation> {
        self.load_stations(backend)
            .await
            .iter()
            .filter_map(|s| {
                s.location.map(|location| StationLocation {
                    station_id: s.storage_key(backend).clone(),
                    label: s.display_label(),
                    location,
                })
            })
            .collect()
    }

    /// Live summary of one station for the local day containing `now`
    pub async fn station_snapshot(
        &self,
        backend: BackendKind,
        station: &StationId,
        now: DateTime<Utc>,
    ) -> Result<StationSnapshot> {
        let day = self.clock().today(now);
        let window = self.clock().day_window(day)?;
        let selector = StationSelector::Station(station.clone());
        let sensors = self.sensors_for_station(backend, &selector).await;
        let refs: Vec<&SensorDescriptor> = sensors.iter().collect();
        let results = self.fetch_all(backend, &selector, &refs, window).await;

        let mut rain_today: Option<f64> = None;
        let mut level_max_today: Option<f64> = None;
        let mut latest_level: Option<Reading> = None;
        let mut latest = Vec::new();

        for (sensor, readings) in sensors.iter().zip(results) {
            match sensor.kind {
                MetricKind::Rainfall => {
                    let normalized =
                        self.reconstructor.normalize(sensor, station, &readings, window.start);
                    if normalized.points.is_empty() {
                        continue;
                    }
                    let daily = self.aggregator.reduce_with(
                        &normalized.points,
                        ProcessingMode::DailySum,
                        normalized.strategy,
                    );
                    let total: f64 = daily.iter().map(|p| p.value.max()).sum();
                    rain_today = Some(rain_today.map_or(total, |t| t.max(total)));
                },
                kind if kind.is_level() => {
                    let in_day = in_window(readings, &window);
                    if let Some(max) = in_day.iter().map(|r| r.value).reduce(f64::max) {
                        level_max_today = Some(level_max_today.map_or(max, |m| m.max(max)));
                    }
                    if let Some(last) = in_day.into_iter().last() {
                        let newer = latest_level
                            .as_ref()
                            .map_or(true, |l| last.timestamp > l.timestamp);
                        if newer {
                            latest_level = Some(last);
                        }
                    }
                },
                kind => {
                    if let Some(last) = in_window(readings, &window).into_iter().last() {
                        latest.push(LatestValue {
                            sensor: sensor.name.clone(),
                            kind,
                            value: last.value,
                            unit: kind.unit().to_string(),
                            timestamp: last.timestamp,
                        });
                    }
                },
            }
        }

        Ok(StationSnapshot {
            station_id: station.clone(),
            day,
            rain_today,
            level_max_today,
            latest,
            alert: self.alerts.evaluate(station, latest_level.as_ref()),
        })
    }

    /// Get service statistics
    pub fn stats(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            requests: self.stats.requests.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
            sensors_fetched: self.stats.sensors_fetched.load(Ordering::Relaxed),
            empty_series: self.stats.empty_series.load(Ordering::Relaxed),
            event: self.backends.adapter(BackendKind::Event).stats(),
            counter: self.backends.adapter(BackendKind::Counter).stats(),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn validate(&self, range: &DateRange) -> Result<TimeWindow> {
        DateRange::new(range.start, range.end)?.to_window(self.clock().offset())
    }

    fn resolve_sensors<'a>(&self, request: &'a SeriesRequest) -> Vec<&'a SensorDescriptor> {
        let available = self.catalog.lookup(request.backend, &request.station);
        request
            .sensors
            .iter()
            .filter(|sensor| {
                let known = sensor.backend == request.backend && available.contains(&sensor.id);
                if !known {
                    debug!(
                        backend = %request.backend,
                        station = %request.station,
                        sensor = %sensor.id,
                        "Sensor has never reported for this selection, skipping"
                    );
                }
                known
            })
            .collect()
    }

    async fn fetch_all(
        &self,
        backend: BackendKind,
        selector: &StationSelector,
        sensors: &[&SensorDescriptor],
        window: TimeWindow,
    ) -> Vec<Vec<Reading>> {
        let adapter: &dyn BackendAdapter = self.backends.adapter(backend);
        let requests: Vec<FetchRequest<'_>> = sensors
            .iter()
            .map(|&sensor| FetchRequest {
                station: selector,
                sensor,
                window,
                lookback: sensor.is_counter(),
            })
            .collect();
        self.stats
            .sensors_fetched
            .fetch_add(requests.len() as u64, Ordering::Relaxed);
        join_all(requests.iter().map(|r| adapter.fetch_raw(r))).await
    }

    fn process(
        &self,
        request: &SeriesRequest,
        sensor: &SensorDescriptor,
        readings: Vec<Reading>,
        window: TimeWindow,
    ) -> Vec<SensorSeries> {
        let mode = request.mode_for(sensor);

        let mut by_station: BTreeMap<StationId, Vec<Reading>> = BTreeMap::new();
        for reading in readings {
            by_station
                .entry(reading.station_id.clone())
                .or_default()
                .push(reading);
        }
        if let StationSelector::Station(id) = &request.station {
            by_station.entry(id.clone()).or_default();
        }

        by_station
            .into_iter()
            .map(|(station_id, rows)| {
                let normalized = self
                    .reconstructor
                    .normalize(sensor, &station_id, &rows, window.start);
                let points = self
                    .aggregator
                    .reduce_with(&normalized.points, mode, normalized.strategy);
                if points.is_empty() {
                    self.stats.empty_series.fetch_add(1, Ordering::Relaxed);
                }
                SensorSeries {
                    station_id,
                    sensor: sensor.clone(),
                    mode,
                    points,
                }
            })
            .collect()
    }

    async fn chart_title(&self, request: &SeriesRequest) -> String {
        match &request.station {
            StationSelector::All => "All stations".to_string(),
            StationSelector::Station(id) => {
                match self.directory.station_by_id(request.backend, id).await {
                    Ok(Some(record)) => record.display_label(),
                    Ok(None) => id.to_string(),
                    Err(e) => {
                        warn!(station = %id, error = %e, "Station metadata unavailable");
                        id.to_string()
                    },
                }
            },
        }
    }

    async fn load_stations(&self, backend: BackendKind) -> Vec<StationRecord> {
        match self.directory.list_stations(backend).await {
            Ok(stations) => stations,
            Err(e) => {
                warn!(backend = %backend, error = %e, "Station list unavailable");
                Vec::new()
            },
        }
    }

    async fn station_index(&self, backend: BackendKind) -> HashMap<StationId, StationRecord> {
        self.load_stations(backend)
            .await
            .into_iter()
            .map(|s| (s.storage_key(backend).clone(), s))
            .collect()
    }
}

fn in_window(readings: Vec<Reading>, window: &TimeWindow) -> Vec<Reading> {
    readings
        .into_iter()
        .filter(|r| r.value.is_finite() && window.contains(r.timestamp))
        .collect()
}

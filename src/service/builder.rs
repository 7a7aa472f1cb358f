//! Service builder with pluggable stores

use super::{ServiceStats, TelemetryService};
use crate::aggregation::{Aggregator, LocalClock};
use crate::alert::AlertEvaluator;
use crate::backend::{Backends, CounterReadingStore, EventReadingStore, ReadingSource};
use crate::catalog::SensorCatalogCache;
use crate::config::TelemetryConfig;
use crate::delta::DeltaReconstructor;
use crate::directory::StationDirectory;
use crate::error::{Error, Result};
use std::sync::Arc;
use tracing::info;

/// Builder for a [`TelemetryService`]
pub struct TelemetryServiceBuilder {
    config: TelemetryConfig,
    event_source: Option<Arc<dyn ReadingSource>>,
    counter_source: Option<Arc<dyn ReadingSource>>,
    directory: Option<Arc<dyn StationDirectory>>,
    catalog: Option<Arc<SensorCatalogCache>>,
}

impl TelemetryServiceBuilder {
    /// Create a builder with default configuration and `TELEMETRY_*` overrides
    pub fn new() -> Self {
        Self {
            config: TelemetryConfig::from_env(),
            event_source: None,
            counter_source: None,
            directory: None,
            catalog: None,
        }
    }

    /// Set the configuration
    pub fn with_config(mut self, config: TelemetryConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the event store
    pub fn with_event_source<S>(mut self, source: S) -> Self
    where
        S: ReadingSource,
    {
        self.event_source = Some(Arc::new(source));
        self
    }

    /// Set the event store from an existing Arc
    ///
    /// Use this to keep a handle on the store, e.g. to inject failures in tests.
    pub fn with_event_source_arc(mut self, source: Arc<dyn ReadingSource>) -> Self {
        self.event_source = Some(source);
        self
    }

    /// Set the counter store
    pub fn with_counter_source<S>(mut self, source: S) -> Self
    where
        S: ReadingSource,
    {
        self.counter_source = Some(Arc::new(source));
        self
    }

    /// Set the counter store from an existing Arc
    pub fn with_counter_source_arc(mut self, source: Arc<dyn ReadingSource>) -> Self {
        self.counter_source = Some(source);
        self
    }

    /// Set the metadata directory
    pub fn with_directory<D>(mut self, directory: D) -> Self
    where
        D: StationDirectory,
    {
        self.directory = Some(Arc::new(directory));
        self
    }

    /// Set the metadata directory from an existing Arc
    pub fn with_directory_arc(mut self, directory: Arc<dyn StationDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Share an existing catalog instead of creating one
    pub fn with_catalog(mut self, catalog: Arc<SensorCatalogCache>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Validate the configuration, wire the adapters and build the catalog
    pub async fn build(self) -> Result<TelemetryService> {
        self.config.validate()?;

        let event_source = self
            .event_source
            .ok_or_else(|| Error::Configuration("No event source configured".to_string()))?;

        let counter_source = self
            .counter_source
            .ok_or_else(|| Error::Configuration("No counter source configured".to_string()))?;

        let directory = self
            .directory
            .ok_or_else(|| Error::Configuration("No station directory configured".to_string()))?;

        let service_config = &self.config.service;
        let timeout = service_config.fetch_timeout();
        let backends = Backends::new(
            EventReadingStore::new(event_source, timeout),
            CounterReadingStore::new(counter_source, timeout, service_config.counter_lookback()),
        );

        let service = TelemetryService {
            backends,
            catalog: self.catalog.unwrap_or_default(),
            directory,
            reconstructor: DeltaReconstructor::new(self.config.overrides.clone()),
            aggregator: Aggregator::new(LocalClock::new(service_config.offset()?)),
            alerts: AlertEvaluator::from_config(&self.config.alerts),
            stats: ServiceStats::default(),
        };

        service.rebuild_cache().await;
        info!(
            utc_offset_minutes = service_config.utc_offset_minutes,
            fetch_timeout_ms = service_config.fetch_timeout_ms,
            overrides = self.config.overrides.daily_accumulated.len(),
            alert_rules = self.config.alerts.len(),
            "Telemetry service ready"
        );
        Ok(service)
    }
}

impl Default for TelemetryServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Shared fixture: a small fleet on both stores
//!
//! All times are UTC; stations run at UTC-3, so local 2024-03-01 is
//! `[03-01 03:00Z, 03-02 03:00Z)`.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use hydromet_telemetry::alert::AlertThresholds;
use hydromet_telemetry::backend::InMemorySource;
use hydromet_telemetry::config::{ClassificationConfig, CounterOverrides, TelemetryConfig};
use hydromet_telemetry::directory::{describe_sensor, InMemoryDirectory};
use hydromet_telemetry::types::{BackendKind, Location, SensorDescriptor, StationRecord};
use hydromet_telemetry::{TelemetryService, TelemetryServiceBuilder};

pub fn utc(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

pub struct Fleet {
    pub service: TelemetryService,
    pub events: Arc<InMemorySource>,
    pub counters: Arc<InMemorySource>,
    pub directory: Arc<InMemoryDirectory>,
}

pub fn config() -> TelemetryConfig {
    let mut config = TelemetryConfig::default();
    config.overrides = CounterOverrides::new(["9"]);
    let mut alerts = BTreeMap::new();
    alerts.insert(
        "P-01".to_string(),
        AlertThresholds {
            yellow: 0.71,
            orange: 4.01,
            red: 8.02,
        },
    );
    config.alerts = alerts;
    config
}

pub fn counter_rain() -> SensorDescriptor {
    describe_sensor(
        BackendKind::Counter,
        "7",
        "Pluviometro",
        "Pluviometro",
        &ClassificationConfig::default(),
    )
}

pub fn counter_battery() -> SensorDescriptor {
    describe_sensor(
        BackendKind::Counter,
        "8",
        "Bateria",
        "Bateria",
        &ClassificationConfig::default(),
    )
}

pub fn event_level() -> SensorDescriptor {
    describe_sensor(
        BackendKind::Event,
        "Limnigrafica",
        "Nivel",
        "Limnigrafica nivel",
        &ClassificationConfig::default(),
    )
}

pub fn event_rain() -> SensorDescriptor {
    describe_sensor(
        BackendKind::Event,
        "Pluviometro",
        "Lluvia",
        "Pluviometro",
        &ClassificationConfig::default(),
    )
}

pub fn event_battery() -> SensorDescriptor {
    describe_sensor(
        BackendKind::Event,
        "Bateria",
        "Bateria",
        "Bateria",
        &ClassificationConfig::default(),
    )
}

fn seed_counters(counters: &InMemorySource) {
    // Station 12: one row in the lookback period
    counters.insert("12", "7", utc(1, 0) - chrono::Duration::hours(4), 90.0);
    counters.insert("12", "7", utc(1, 6), 100.0);
    counters.insert("12", "7", utc(1, 9), 105.0);
    counters.insert("12", "7", utc(1, 12), 3.0);
    counters.insert("12", "7", utc(1, 15), 8.0);
    counters.insert("12", "7", utc(2, 6), 10.0);
    counters.insert("12", "8", utc(1, 6), 12.7);

    // Station 13: no predecessor
    counters.insert("13", "7", utc(1, 6), 100.0);
    counters.insert("13", "7", utc(1, 9), 105.0);
    counters.insert("13", "7", utc(1, 12), 3.0);
    counters.insert("13", "7", utc(1, 15), 8.0);

    // Station 9 reports a daily accumulated value
    counters.insert("9", "7", utc(1, 6), 2.0);
    counters.insert("9", "7", utc(1, 9), 6.5);
    counters.insert("9", "7", utc(1, 12), 4.0);
}

fn seed_events(events: &InMemorySource) {
    events.insert("P-01", "Limnigrafica", utc(1, 6), 1.2);
    events.insert("P-01", "Limnigrafica", utc(1, 9), 1.5);
    events.insert("P-01", "Limnigrafica", utc(1, 12), 0.9);
    events.insert("P-01", "Limnigrafica", utc(3, 6), 1.4);
    events.insert("P-01", "Pluviometro", utc(1, 6), 0.5);
    events.insert("P-01", "Pluviometro", utc(1, 9), 1.0);
    events.insert("P-01", "Bateria", utc(1, 10), 12.6);

    // P-02: rain on days 1 and 3, level on days 2 and 3
    events.insert("P-02", "Pluviometro", utc(1, 12), 4.0);
    events.insert("P-02", "Pluviometro", utc(3, 12), 0.5);
    events.insert("P-02", "Limnigrafica", utc(2, 12), 1.1);
    events.insert("P-02", "Limnigrafica", utc(3, 12), 1.4);
}

fn seed_directory(directory: &InMemoryDirectory) {
    let location = Location::from_dms((34.0, 25.0, 0.0), 'S', (58.0, 35.0, 0.0), 'O');
    let mut north = StationRecord::new("1", "Arroyo Norte")
        .with_project_id("P-01")
        .with_municipality("Tigre");
    if let Some(location) = location {
        north = north.with_location(location);
    }
    directory.add_station(BackendKind::Event, north);
    directory.add_station(
        BackendKind::Event,
        StationRecord::new("2", "Puente Sur").with_project_id("P-02"),
    );
    directory.add_station(BackendKind::Counter, StationRecord::new("12", "Escuela 12"));
    directory.add_station(BackendKind::Counter, StationRecord::new("13", "Club Nautico"));
    directory.add_station(BackendKind::Counter, StationRecord::new("9", "Delegacion"));

    for sensor in [
        counter_rain(),
        counter_battery(),
        event_level(),
        event_rain(),
        event_battery(),
    ] {
        directory.add_sensor(sensor);
    }
}

pub async fn fleet_with(config: TelemetryConfig) -> Fleet {
    let events = Arc::new(InMemorySource::new("events"));
    let counters = Arc::new(InMemorySource::new("counters"));
    let directory = Arc::new(InMemoryDirectory::new());
    seed_events(&events);
    seed_counters(&counters);
    seed_directory(&directory);

    let service = TelemetryServiceBuilder::new()
        .with_config(config)
        .with_event_source_arc(events.clone())
        .with_counter_source_arc(counters.clone())
        .with_directory_arc(directory.clone())
        .build()
        .await
        .expect("service should build");

    Fleet {
        service,
        events,
        counters,
        directory,
    }
}

pub async fn fleet() -> Fleet {
    fleet_with(config()).await
}

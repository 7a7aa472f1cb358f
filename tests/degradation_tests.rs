//! Degradation tests
//!
//! Store failures and slow stores must shrink the answer, never fail it.
//! Malformed requests must be rejected before any store is touched.

mod common;

use std::time::Duration;

use chrono::NaiveDate;
use common::{config, counter_battery, counter_rain, event_level, fleet, fleet_with};
use hydromet_telemetry::aggregation::AggregateValue;
use hydromet_telemetry::error::{BackendError, Error};
use hydromet_telemetry::service::SeriesRequest;
use hydromet_telemetry::types::{BackendKind, DateRange, StationSelector};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

#[tokio::test]
async fn test_failing_sensor_does_not_abort_others() {
    let fleet = fleet().await;
    fleet.counters.fail_channel("8");

    let request = SeriesRequest::parse(
        "counter",
        "12",
        vec![counter_rain(), counter_battery()],
        "2024-03-01",
        "2024-03-01",
        None,
    )
    .unwrap();
    let series = fleet.service.get_series(&request).await.unwrap();

    assert_eq!(series.len(), 2);
    assert_eq!(series[0].points[0].value, AggregateValue::Single(23.0));
    assert!(series[1].points.is_empty());
    assert_eq!(fleet.service.stats().counter.failures, 1);
}

#[tokio::test]
async fn test_slow_store_times_out_to_empty() {
    let mut config = config();
    config.service.fetch_timeout_ms = 50;
    let fleet = fleet_with(config).await;
    fleet.events.set_delay(Some(Duration::from_millis(500)));

    let request = SeriesRequest::parse(
        "event",
        "P-01",
        vec![event_level()],
        "2024-03-01",
        "2024-03-01",
        None,
    )
    .unwrap();
    let series = fleet.service.get_series(&request).await.unwrap();

    assert_eq!(series.len(), 1);
    assert!(series[0].points.is_empty());
    let stats = fleet.service.stats();
    assert_eq!(stats.event.timeouts, 1);
    assert_eq!(stats.empty_series, 1);
}

#[tokio::test]
async fn test_inverted_range_rejected_before_fetch() {
    let fleet = fleet().await;
    let before = fleet.counters.query_count();

    let request = SeriesRequest::new(
        BackendKind::Counter,
        StationSelector::parse("12"),
        vec![counter_rain()],
        DateRange {
            start: day(5),
            end: day(1),
        },
    );
    let result = fleet.service.get_series(&request).await;

    assert!(matches!(result, Err(Error::InvalidRange { .. })));
    assert_eq!(fleet.counters.query_count(), before);
    assert_eq!(fleet.service.stats().rejected, 1);
}

#[tokio::test]
async fn test_catalog_recovers_after_store_outage() {
    let fleet = fleet().await;
    let request = SeriesRequest::parse(
        "event",
        "P-01",
        vec![event_level()],
        "2024-03-01",
        "2024-03-01",
        None,
    )
    .unwrap();

    fleet
        .events
        .fail_with(Some(BackendError::Unavailable("maintenance".to_string())));
    fleet.service.rebuild_cache().await;

    // Counter side of the catalog is untouched
    assert!(fleet.service.catalog().stations(BackendKind::Event).is_empty());
    assert_eq!(fleet.service.catalog().stations(BackendKind::Counter).len(), 3);
    assert!(fleet.service.get_series(&request).await.unwrap().is_empty());

    fleet.events.fail_with(None);
    fleet.service.rebuild_cache().await;

    let series = fleet.service.get_series(&request).await.unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].points.len(), 1);
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let fleet = fleet().await;
    let first = fleet.service.catalog().snapshot();

    fleet.service.rebuild_cache().await;
    fleet.service.rebuild_cache().await;

    assert_eq!(*fleet.service.catalog().snapshot(), *first);
}

#[tokio::test]
async fn test_new_sensor_visible_after_rebuild() {
    let fleet = fleet().await;
    let request = SeriesRequest::parse(
        "counter",
        "13",
        vec![counter_battery()],
        "2024-03-01",
        "2024-03-01",
        None,
    )
    .unwrap();
    fleet
        .counters
        .insert("13", "8", common::utc(1, 10), 12.9);

    assert!(fleet.service.get_series(&request).await.unwrap().is_empty());

    fleet.service.rebuild_cache().await;
    let series = fleet.service.get_series(&request).await.unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].points.len(), 1);
}

#[tokio::test]
async fn test_range_at_calendar_edge_comes_back_empty() {
    let fleet = fleet().await;
    let request = SeriesRequest::new(
        BackendKind::Counter,
        StationSelector::parse("13"),
        vec![counter_rain()],
        DateRange::single_day(NaiveDate::MIN),
    );

    let series = fleet.service.get_series(&request).await.unwrap();
    assert_eq!(series.len(), 1);
    assert!(series[0].points.is_empty());
}

#[tokio::test]
async fn test_range_outside_clock_rejected() {
    let mut config = config();
    config.service.utc_offset_minutes = 180;
    let fleet = fleet_with(config).await;
    let before = fleet.counters.query_count();

    let request = SeriesRequest::new(
        BackendKind::Counter,
        StationSelector::parse("13"),
        vec![counter_rain()],
        DateRange::single_day(NaiveDate::MIN),
    );
    let result = fleet.service.get_series(&request).await;

    assert!(matches!(result, Err(Error::InvalidDate(_))));
    assert_eq!(fleet.counters.query_count(), before);
    assert_eq!(fleet.service.stats().rejected, 1);
}

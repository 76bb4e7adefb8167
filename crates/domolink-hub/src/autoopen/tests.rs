//! Tests for the auto-open decider and call handling.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::{NaiveTime, TimeZone, Utc};
use serde_json::{Map, json};

use domolink_core::clock::ManualClock;
use domolink_core::config::{AutoOpenConfig, DayOfWeek, HubConfig, Schedule};

use crate::device::DeviceControl;
use crate::events::{EventKind, EventLog};
use crate::push::{CallEvent, CallHandler};
use crate::testutil::FakeApi;

use super::{AutoOpenManager, should_open};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn workday_schedule() -> Schedule {
    Schedule {
        days: BTreeSet::from([DayOfWeek::Monday, DayOfWeek::Wednesday]),
        time_start: t(9, 0),
        time_end: t(18, 0),
    }
}

// =============================================================================
// Decision table
// =============================================================================

#[test]
fn disabled_never_opens() {
    let config = AutoOpenConfig {
        enabled: false,
        schedules: vec![workday_schedule()],
    };
    // 2025-06-02 is a Monday, inside the window.
    let at = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
    assert!(!should_open(&config, at));
}

#[test]
fn enabled_without_schedules_always_opens() {
    let config = AutoOpenConfig {
        enabled: true,
        schedules: vec![],
    };
    let at = Utc.with_ymd_and_hms(2025, 6, 7, 3, 0, 0).unwrap();
    assert!(should_open(&config, at));
}

#[test]
fn schedule_day_and_window_must_both_match() {
    let config = AutoOpenConfig {
        enabled: true,
        schedules: vec![workday_schedule()],
    };

    let monday_noon = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
    assert!(should_open(&config, monday_noon));

    // Tuesday is not in the day set.
    let tuesday_noon = Utc.with_ymd_and_hms(2025, 6, 3, 12, 0, 0).unwrap();
    assert!(!should_open(&config, tuesday_noon));

    // Monday outside the window.
    let monday_night = Utc.with_ymd_and_hms(2025, 6, 2, 20, 0, 0).unwrap();
    assert!(!should_open(&config, monday_night));
}

#[test]
fn window_bounds_are_inclusive() {
    let config = AutoOpenConfig {
        enabled: true,
        schedules: vec![workday_schedule()],
    };
    assert!(should_open(
        &config,
        Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
    ));
    assert!(should_open(
        &config,
        Utc.with_ymd_and_hms(2025, 6, 2, 18, 0, 0).unwrap()
    ));
    assert!(!should_open(
        &config,
        Utc.with_ymd_and_hms(2025, 6, 2, 18, 0, 1).unwrap()
    ));
}

#[test]
fn any_matching_schedule_wins() {
    let config = AutoOpenConfig {
        enabled: true,
        schedules: vec![
            workday_schedule(),
            Schedule {
                days: BTreeSet::from([DayOfWeek::Saturday]),
                time_start: t(0, 0),
                time_end: t(23, 59),
            },
        ],
    };
    let saturday = Utc.with_ymd_and_hms(2025, 6, 7, 4, 30, 0).unwrap();
    assert!(should_open(&config, saturday));
}

// =============================================================================
// Call handling
// =============================================================================

struct Fixture {
    api: Arc<FakeApi>,
    events: Arc<EventLog>,
    control: Arc<DeviceControl>,
    manager: AutoOpenManager,
}

fn fixture(config: AutoOpenConfig) -> Fixture {
    let api = Arc::new(FakeApi::with_shared_relays(json!([
        FakeApi::relay_fixture("dev-1", 1001, true),
    ])));
    let clock = Arc::new(ManualClock::default());
    let events = Arc::new(EventLog::new(clock.clone()));
    let control = Arc::new(DeviceControl::new(
        api.clone(),
        clock.clone(),
        events.clone(),
        HubConfig::default(),
    ));
    let manager = AutoOpenManager::new(clock, control.clone(), events.clone(), config);
    Fixture {
        api,
        events,
        control,
        manager,
    }
}

fn call(device_id: &str) -> CallEvent {
    CallEvent {
        call_id: "call-1".to_string(),
        device_id: device_id.to_string(),
        timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        snapshot_url: None,
        metadata: Map::new(),
    }
}

#[tokio::test]
async fn declined_call_takes_no_action() {
    let fx = fixture(AutoOpenConfig::default());
    fx.control.list_devices(false).await.unwrap();

    assert!(!fx.manager.handle_call(call("dev-1")).await);
    assert_eq!(fx.api.open_calls.load(Ordering::SeqCst), 0);
    assert!(fx.events.history(10, None, None).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn accepted_call_opens_door_and_logs_auto_open() {
    let fx = fixture(AutoOpenConfig {
        enabled: true,
        schedules: vec![],
    });
    fx.control.list_devices(false).await.unwrap();

    assert!(fx.manager.handle_call(call("dev-1")).await);
    assert_eq!(fx.api.open_calls.load(Ordering::SeqCst), 1);

    let auto_opens = fx.events.history(10, Some(EventKind::AutoOpen), None).await;
    assert_eq!(auto_opens.len(), 1);
    assert_eq!(auto_opens[0].metadata["call_id"], json!("call-1"));
}

#[tokio::test]
async fn door_failure_is_swallowed_and_logged() {
    let fx = fixture(AutoOpenConfig {
        enabled: true,
        schedules: vec![],
    });
    fx.control.list_devices(false).await.unwrap();
    fx.api.fail_open.store(true, Ordering::SeqCst);

    assert!(!fx.manager.handle_call(call("dev-1")).await);
    assert_eq!(
        fx.events.history(10, Some(EventKind::Error), None).await.len(),
        1
    );
    assert!(
        fx.events
            .history(10, Some(EventKind::AutoOpen), None)
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn config_can_be_swapped_at_runtime() {
    let fx = fixture(AutoOpenConfig::default());
    fx.control.list_devices(false).await.unwrap();
    assert!(!fx.manager.handle_call(call("dev-1")).await);

    fx.manager
        .set_config(AutoOpenConfig {
            enabled: true,
            schedules: vec![],
        })
        .await;
    assert!(fx.manager.handle_call(call("dev-1")).await);
    assert!(fx.manager.config().await.enabled);
}

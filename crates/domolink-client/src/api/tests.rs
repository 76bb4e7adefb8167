//! Tests for the vendor response adapters.

use serde_json::json;

use super::adapt::{
    camera_from_json, cameras_from_response, candidates_from_response, device_from_json,
    devices_from_response,
};
use super::types::DeviceStatusKind;

// =============================================================================
// Device adapter tests
// =============================================================================

#[test]
fn device_parsed_from_vendor_shape() {
    let item = json!({
        "MAC_ADDR": "AA:BB:CC:DD:EE:FF",
        "RELAY_TYPE": "Подъезд",
        "OPENER": { "relay_id": 1234, "relay_num": 2 },
        "STATUS_CODE": "0",
        "ADDRESS": "Lenina 1",
        "ENTRANCE_UID": "3",
        "FLAT": "42",
        "CAMERAS": ["cam-1", { "UUID": "cam-2" }]
    });

    let device = device_from_json(&item).unwrap();
    assert_eq!(device.id, "AA:BB:CC:DD:EE:FF");
    assert_eq!(device.name, "Подъезд");
    assert_eq!(device.relay_id, 1234);
    assert_eq!(device.relay_num, 2);
    assert_eq!(device.status, DeviceStatusKind::Online);
    assert_eq!(device.address.as_deref(), Some("Lenina 1"));
    assert_eq!(device.entrance.as_deref(), Some("3"));
    assert_eq!(device.flat.as_deref(), Some("42"));
    assert_eq!(device.camera_ids, vec!["cam-1", "cam-2"]);
}

#[test]
fn device_relay_fields_fall_back_to_top_level() {
    let item = json!({
        "mac": "11:22:33:44:55:66",
        "name": "Gate",
        "relayId": "77",
        "relayNum": 1,
        "STATUS_TEXT": "OK"
    });

    let device = device_from_json(&item).unwrap();
    assert_eq!(device.relay_id, 77);
    assert_eq!(device.relay_num, 1);
    assert!(device.is_online());
}

#[test]
fn device_without_hardware_id_is_dropped() {
    assert!(device_from_json(&json!({ "NAME": "orphan" })).is_none());

    let response = json!([
        { "NAME": "orphan" },
        { "MAC": "AA:AA:AA:AA:AA:AA", "NAME": "ok" }
    ]);
    assert_eq!(devices_from_response(&response).len(), 1);
}

#[test]
fn device_status_defaults_to_unknown() {
    let device = device_from_json(&json!({ "MAC": "AA", "STATUS": "flaky" })).unwrap();
    assert_eq!(device.status, DeviceStatusKind::Unknown);
}

#[test]
fn devices_parse_from_items_wrapper() {
    let response = json!({ "items": [{ "MAC": "AA:BB", "NAME": "Door" }] });
    let devices = devices_from_response(&response);
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].name, "Door");
    // Missing relay addressing falls back to defaults.
    assert_eq!(devices[0].relay_id, 0);
    assert_eq!(devices[0].relay_num, 1);
}

// =============================================================================
// Camera adapter tests
// =============================================================================

#[test]
fn cameras_flattened_from_grouped_response() {
    let response = json!([
        {
            "groupName": "Yard",
            "cameras": [
                { "UUID": "cam-1", "NAME": "Entrance" },
                { "NAME": "no uuid, skipped" }
            ]
        },
        { "groupName": "Empty", "cameras": [] }
    ]);

    let cameras = cameras_from_response(&response);
    assert_eq!(cameras.len(), 1);
    assert_eq!(cameras[0].uuid, "cam-1");
}

#[test]
fn cameras_parse_from_legacy_flat_shapes() {
    let flat = json!([{ "uuid": "cam-9" }]);
    assert_eq!(cameras_from_response(&flat).len(), 1);

    let wrapped = json!({ "cameras": [{ "cam_id": 41 }] });
    let cameras = cameras_from_response(&wrapped);
    assert_eq!(cameras.len(), 1);
    assert_eq!(cameras[0].uuid, "41");
}

#[test]
fn camera_live_access_status_is_authoritative() {
    let camera = camera_from_json(&json!({
        "UUID": "cam-1",
        "IS_ONLINE": true,
        "ACCESS": { "LIVE": { "STATUS": false } }
    }))
    .unwrap();
    assert_eq!(camera.status, DeviceStatusKind::Offline);
}

#[test]
fn camera_media_urls_enable_stream() {
    let camera = camera_from_json(&json!({
        "UUID": "cam-1",
        "MEDIA": {
            "HLS": {
                "LIVE": {
                    "MAIN": "https://cdn.example.com/live/main.m3u8",
                    "LOW_LATENCY": "https://cdn.example.com/live/ll.m3u8"
                }
            }
        }
    }))
    .unwrap();
    assert!(camera.has_stream);
    assert_eq!(
        camera.hls_live_low_latency.as_deref(),
        Some("https://cdn.example.com/live/ll.m3u8")
    );
}

#[test]
fn camera_without_stream_sources_reports_none() {
    let camera = camera_from_json(&json!({ "UUID": "cam-1", "NAME": "Bare" })).unwrap();
    assert!(!camera.has_stream);
    assert_eq!(camera.status, DeviceStatusKind::Unknown);
}

// =============================================================================
// Auth candidate tests
// =============================================================================

#[test]
fn candidates_parsed_with_string_user_ids() {
    let response = json!({
        "authId": "abc",
        "addresses": [
            { "USER_ID": "16551914", "ADDRESS": "Lenina 1-42" },
            { "USER_ID": 123, "ADDRESS": "Mira 5-1" },
            { "ADDRESS": "no user id, skipped" }
        ]
    });

    let candidates = candidates_from_response(&response);
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].user_id, 16_551_914);
    assert_eq!(candidates[1].address, "Mira 5-1");
}

#[test]
fn missing_addresses_yield_empty_candidates() {
    assert!(candidates_from_response(&json!({ "authId": "abc" })).is_empty());
}

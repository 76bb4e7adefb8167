//! Defensive adapters from vendor JSON to typed entities.
//!
//! The backend mixes SCREAMING_CASE, camelCase and snake_case keys across
//! deployments, and sometimes returns numbers as strings. All of that
//! tolerance lives here and only here; skipped entries are logged and
//! dropped.

use serde_json::Value;
use tracing::warn;

use super::types::{Camera, Device, DeviceStatusKind};

/// Pull the item list out of an enumeration response (bare array or
/// `{"items": [...]}`).
fn item_list(response: &Value) -> Vec<&Value> {
    match response {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => response
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn str_field(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match item.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn int_field(item: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| match item.get(*key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

fn bool_field(item: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|key| item.get(*key).and_then(Value::as_bool))
}

fn status_from_text(text: Option<String>) -> DeviceStatusKind {
    match text.as_deref() {
        Some("online") | Some("OK") => DeviceStatusKind::Online,
        Some("offline") => DeviceStatusKind::Offline,
        _ => DeviceStatusKind::Unknown,
    }
}

/// Adapt the relay-enumeration response into devices. Entries without a
/// hardware id are dropped.
pub fn devices_from_response(response: &Value) -> Vec<Device> {
    let mut devices = Vec::new();
    for item in item_list(response) {
        match device_from_json(item) {
            Some(device) => devices.push(device),
            None => warn!("skipping device without hardware id"),
        }
    }
    devices
}

/// Adapt one relay entry. Returns `None` when the entry has no usable
/// hardware id.
pub fn device_from_json(item: &Value) -> Option<Device> {
    let id = str_field(item, &["MAC_ADDR", "MAC", "mac", "id"])?;

    let name = str_field(
        item,
        &["RELAY_TYPE", "RELAY_DESCR", "NAME", "name", "ADDRESS", "address"],
    )
    .unwrap_or_else(|| "Unknown".to_string());

    // Relay addressing prefers the nested OPENER object.
    let opener = item.get("OPENER").cloned().unwrap_or(Value::Null);
    let relay_id = int_field(&opener, &["relay_id"])
        .or_else(|| int_field(item, &["RELAY_ID", "relay_id", "relayId"]))
        .unwrap_or(0);
    let relay_num = int_field(&opener, &["relay_num"])
        .or_else(|| int_field(item, &["RELAY_NUM", "relay_num", "relayNum"]))
        .unwrap_or(1);

    let status = if str_field(item, &["STATUS_CODE"]).as_deref() == Some("0")
        || str_field(item, &["STATUS_TEXT"]).as_deref() == Some("OK")
    {
        DeviceStatusKind::Online
    } else {
        status_from_text(str_field(item, &["STATUS", "status"]))
    };

    let camera_ids = item
        .get("CAMERAS")
        .and_then(Value::as_array)
        .map(|cams| {
            cams.iter()
                .filter_map(|cam| match cam {
                    Value::String(uuid) => Some(uuid.clone()),
                    Value::Object(_) => str_field(cam, &["UUID", "uuid"]),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    Some(Device {
        id,
        name,
        relay_id,
        relay_num,
        status,
        address: str_field(item, &["ADDRESS", "address"]),
        entrance: str_field(item, &["ENTRANCE_UID", "ENTRANCE", "entrance"]),
        flat: str_field(item, &["FLAT", "flat"]),
        camera_ids,
    })
}

/// Adapt the camera-enumeration response. The current backend returns a
/// list of groups each holding a `cameras` array; older deployments return
/// a flat list or a dict with a `cameras`/`items`/`data` key.
pub fn cameras_from_response(response: &Value) -> Vec<Camera> {
    let mut cameras = Vec::new();

    let flat: Vec<&Value> = match response {
        Value::Array(groups)
            if groups
                .iter()
                .any(|g| g.get("cameras").is_some_and(Value::is_array)) =>
        {
            groups
                .iter()
                .filter_map(|g| g.get("cameras").and_then(Value::as_array))
                .flatten()
                .collect()
        }
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => ["cameras", "items", "data"]
            .iter()
            .find_map(|key| response.get(*key).and_then(Value::as_array))
            .map(|items| items.iter().collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    for item in flat {
        match camera_from_json(item) {
            Some(camera) => cameras.push(camera),
            None => warn!("skipping camera without uuid"),
        }
    }
    cameras
}

/// Adapt one camera entry. Returns `None` when the entry has no uuid.
pub fn camera_from_json(item: &Value) -> Option<Camera> {
    let uuid = str_field(item, &["UUID", "uuid", "ID", "id", "cam_id"])?;

    let name = str_field(item, &["NAME", "name", "title", "address", "ADDRESS"])
        .unwrap_or_else(|| "Unknown Camera".to_string());

    // ACCESS.LIVE.STATUS is the authoritative online source when present.
    let live_status = item
        .get("ACCESS")
        .and_then(|a| a.get("LIVE"))
        .and_then(|l| l.get("STATUS"))
        .and_then(Value::as_bool);
    let status = if let Some(live) = live_status {
        if live {
            DeviceStatusKind::Online
        } else {
            DeviceStatusKind::Offline
        }
    } else if let Some(online) = bool_field(item, &["IS_ONLINE", "is_online", "isOnline"]) {
        if online {
            DeviceStatusKind::Online
        } else {
            DeviceStatusKind::Offline
        }
    } else {
        status_from_text(str_field(item, &["STATUS_TEXT", "status", "STATUS"]))
    };

    let live = item
        .get("MEDIA")
        .and_then(|m| m.get("HLS"))
        .and_then(|h| h.get("LIVE"))
        .cloned()
        .unwrap_or(Value::Null);
    let hls_live_main = str_field(&live, &["MAIN"]);
    let hls_live_low_latency = str_field(&live, &["LOW_LATENCY"]);
    let hls_path = str_field(item, &["REALTIME_HLS", "HLS"]);

    let has_stream = hls_live_main.is_some()
        || hls_live_low_latency.is_some()
        || hls_path.is_some()
        || bool_field(item, &["HAS_STREAM", "has_stream", "hasStream"]).unwrap_or(false)
        || str_field(item, &["STREAM_URL", "stream_url"]).is_some();

    Some(Camera {
        uuid,
        name,
        status,
        has_stream,
        address: str_field(item, &["ADDRESS", "address"]),
        hls_live_main,
        hls_live_low_latency,
        hls_path,
    })
}

/// Parse the candidate addresses from a code-verification response.
pub fn candidates_from_response(response: &Value) -> Vec<super::AddressCandidate> {
    response
        .get("addresses")
        .and_then(Value::as_array)
        .map(|addresses| {
            addresses
                .iter()
                .filter_map(|entry| {
                    Some(super::AddressCandidate {
                        user_id: int_field(entry, &["USER_ID", "user_id", "userId"])?,
                        address: str_field(entry, &["ADDRESS", "address"])
                            .unwrap_or_default(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

//! Typed vendor entities.
//!
//! Device and camera lists are rebuilt wholesale on each enumeration; the
//! only stable identity across rebuilds is the hardware id.

use serde::{Deserialize, Serialize};

/// Reported online state of a device or camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatusKind {
    Online,
    Offline,
    Unknown,
}

/// An intercom device (relay).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Stable hardware identifier (MAC address).
    pub id: String,
    pub name: String,
    /// Relay actuator addressing used by the open command.
    pub relay_id: i64,
    pub relay_num: i64,
    pub status: DeviceStatusKind,
    pub address: Option<String>,
    pub entrance: Option<String>,
    pub flat: Option<String>,
    /// UUIDs of associated cameras, when the payload carries them.
    pub camera_ids: Vec<String>,
}

impl Device {
    pub fn is_online(&self) -> bool {
        self.status == DeviceStatusKind::Online
    }
}

/// An intercom camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Camera {
    pub uuid: String,
    pub name: String,
    pub status: DeviceStatusKind,
    pub has_stream: bool,
    pub address: Option<String>,
    /// Direct HLS live URL from the payload's media object, if present.
    pub hls_live_main: Option<String>,
    /// Low-latency variant of the live URL, if present.
    pub hls_live_low_latency: Option<String>,
    /// Legacy relative HLS path, used as a CDN fallback.
    pub hls_path: Option<String>,
}

impl Camera {
    pub fn is_online(&self) -> bool {
        self.status == DeviceStatusKind::Online
    }
}

/// One selectable identity returned by the code-verification step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressCandidate {
    pub user_id: i64,
    pub address: String,
}

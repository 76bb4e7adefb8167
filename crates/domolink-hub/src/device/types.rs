use chrono::{DateTime, Utc};

/// Lock state of a door relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked,
    Unlocked,
}

/// Published on every door lock transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoorLockStatus {
    pub device_id: String,
    pub state: LockState,
    /// Set when the transition reports a failed open attempt.
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// Published on every online/offline transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub device_id: String,
    pub online: bool,
    pub at: DateTime<Utc>,
}

//! Intercom device control.
//!
//! Enumerates the account's door relays with a short-lived cache, fires
//! door-open commands, models the vendor's auto-relock with a 5 s
//! one-shot timer per device, and tracks online/offline edges from
//! enumeration contact. Transitions fan out over broadcast channels.

mod control;
mod monitor;
mod types;


pub use control::{DeviceControl, DeviceControlError};
pub use monitor::spawn_monitor;
pub use types::{DeviceStatus, DoorLockStatus, LockState};

//! Domolink hub.
//!
//! Orchestrates the vendor intercom integration for a host application:
//! - Device control: relay enumeration cache, door-open commands,
//!   lock-reset timers, online/offline monitoring
//! - Bounded event log with broadcast fan-out
//! - Auto-open decision engine driven by day/time schedules
//! - Push-listener seam dispatching incoming calls
//! - The [`Hub`] facade tying it all together

pub mod autoopen;
pub mod device;
pub mod events;
pub mod hub;
pub mod push;

#[cfg(test)]
pub(crate) mod testutil;

pub use autoopen::{AutoOpenManager, should_open};
pub use device::{
    DeviceControl, DeviceControlError, DeviceStatus, DoorLockStatus, LockState, spawn_monitor,
};
pub use events::{Event, EventKind, EventLog};
pub use hub::{Hub, HubError};
pub use push::{CallEvent, CallHandler, ListenerStatus, PushError, PushListener};

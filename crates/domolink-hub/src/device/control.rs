use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, json};
use thiserror::Error;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use domolink_client::api::{Device, IntercomApi, adapt};
use domolink_client::transport::TransportError;
use domolink_core::clock::Clock;
use domolink_core::config::HubConfig;

use crate::events::{EventKind, EventLog};

use super::types::{DeviceStatus, DoorLockStatus, LockState};

const STATUS_CAPACITY: usize = 64;

/// Door and device control errors.
#[derive(Debug, Error)]
pub enum DeviceControlError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Unknown device: {0}")]
    NotFound(String),

    #[error("Device command failed: {source}")]
    Api {
        device_id: Option<String>,
        #[source]
        source: TransportError,
    },

    #[error("Unexpected device control failure: {0}")]
    Unexpected(String),
}

struct DeviceCache {
    devices: Vec<Device>,
    fetched_at: Instant,
}

struct DeviceTrack {
    online: bool,
    last_seen: Instant,
}

/// Device enumeration, door-open commands and online tracking.
///
/// The device list is rebuilt wholesale on refresh, never merged. Door
/// opens start a one-shot lock-reset timer per device; reopening before
/// the timer fires supersedes it, so exactly one `locked` transition is
/// published per open burst, timed from the latest open.
pub struct DeviceControl {
    api: Arc<dyn IntercomApi>,
    clock: Arc<dyn Clock>,
    events: Arc<EventLog>,
    config: HubConfig,
    cache: Mutex<Option<DeviceCache>>,
    tracks: Mutex<HashMap<String, DeviceTrack>>,
    /// Pending lock-reset timers, keyed by device with a generation tag
    /// so a superseded timer can never evict its replacement.
    lock_timers: Mutex<HashMap<String, (u64, JoinHandle<()>)>>,
    timer_generation: AtomicU64,
    lock_tx: broadcast::Sender<DoorLockStatus>,
    status_tx: broadcast::Sender<DeviceStatus>,
}

impl DeviceControl {
    pub fn new(
        api: Arc<dyn IntercomApi>,
        clock: Arc<dyn Clock>,
        events: Arc<EventLog>,
        config: HubConfig,
    ) -> Self {
        let (lock_tx, _) = broadcast::channel(STATUS_CAPACITY);
        let (status_tx, _) = broadcast::channel(STATUS_CAPACITY);
        Self {
            api,
            clock,
            events,
            config,
            cache: Mutex::new(None),
            tracks: Mutex::new(HashMap::new()),
            lock_timers: Mutex::new(HashMap::new()),
            timer_generation: AtomicU64::new(0),
            lock_tx,
            status_tx,
        }
    }

    /// Subscribe to door lock transitions.
    pub fn subscribe_locks(&self) -> broadcast::Receiver<DoorLockStatus> {
        self.lock_tx.subscribe()
    }

    /// Subscribe to online/offline transitions.
    pub fn subscribe_status(&self) -> broadcast::Receiver<DeviceStatus> {
        self.status_tx.subscribe()
    }

    /// Current device list. Served from cache within the TTL unless
    /// `force` is set.
    ///
    /// The primary enumeration asks for shared relays; when it comes back
    /// empty the personal-relay fallback is queried instead. The two sets
    /// are never merged.
    pub async fn list_devices(&self, force: bool) -> Result<Vec<Device>, DeviceControlError> {
        let mut cache = self.cache.lock().await;
        if !force {
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < self.config.cache_ttl() {
                    debug!(devices = cached.devices.len(), "serving devices from cache");
                    return Ok(cached.devices.clone());
                }
            }
        }

        let response = self
            .api
            .list_relays(true)
            .await
            .map_err(|e| self.api_error("enumeration", e))?;
        let mut devices = adapt::devices_from_response(&response);
        if devices.is_empty() {
            debug!("shared relay set empty, falling back to personal relays");
            let response = self
                .api
                .list_relays(false)
                .await
                .map_err(|e| self.api_error("enumeration", e))?;
            devices = adapt::devices_from_response(&response);
        }

        info!(devices = devices.len(), "device list refreshed");
        self.note_contact(&devices).await;
        *cache = Some(DeviceCache {
            devices: devices.clone(),
            fetched_at: Instant::now(),
        });
        Ok(devices)
    }

    /// Fire the door-open command for a device.
    ///
    /// The device must be in the current list; unknown ids fail locally
    /// without touching the backend. `relay_num` overrides the device's
    /// default relay number for this actuation only. A successful open
    /// publishes `unlocked` immediately and arms (or re-arms) the
    /// lock-reset timer. Failures publish `locked` with the error and are
    /// never retried.
    pub async fn open_door(
        self: &Arc<Self>,
        device_id: &str,
        relay_num: Option<i64>,
    ) -> Result<(), DeviceControlError> {
        let Some(device) = self.resolve(device_id).await else {
            let message = format!("Unknown device: {device_id}");
            self.publish_lock(device_id, LockState::Locked, Some(message.clone()));
            self.events
                .log(
                    EventKind::Error,
                    Some(device_id),
                    error_metadata("open_door", &message),
                )
                .await;
            return Err(DeviceControlError::NotFound(device_id.to_string()));
        };

        let relay = relay_num.unwrap_or(device.relay_num);
        match self.api.open_relay(device.relay_id).await {
            Ok(_) => {
                info!(device_id, relay_id = device.relay_id, relay_num = relay, "door opened");
                self.publish_lock(device_id, LockState::Unlocked, None);
                self.events
                    .log(
                        EventKind::DoorOpen,
                        Some(device_id),
                        Map::from_iter([
                            ("relay_id".to_string(), json!(device.relay_id)),
                            ("relay_num".to_string(), json!(relay)),
                        ]),
                    )
                    .await;
                self.arm_lock_reset(device_id).await;
                Ok(())
            }
            Err(e) => {
                warn!(device_id, error = %e, "door open failed");
                self.publish_lock(device_id, LockState::Locked, Some(e.to_string()));
                self.events
                    .log(
                        EventKind::Error,
                        Some(device_id),
                        error_metadata("open_door", &e.to_string()),
                    )
                    .await;
                Err(DeviceControlError::Api {
                    device_id: Some(device_id.to_string()),
                    source: e,
                })
            }
        }
    }

    /// One monitor pass: devices silent past the offline threshold and
    /// still marked online get a single offline transition.
    pub async fn check_offline(&self) {
        let timeout = self.config.offline_timeout();
        let mut tracks = self.tracks.lock().await;
        for (device_id, track) in tracks.iter_mut() {
            if track.online && track.last_seen.elapsed() > timeout {
                track.online = false;
                info!(device_id, "device went offline");
                let _ = self.status_tx.send(DeviceStatus {
                    device_id: device_id.clone(),
                    online: false,
                    at: self.clock.now(),
                });
            }
        }
    }

    /// Cancel all pending lock-reset timers.
    pub async fn shutdown(&self) {
        let mut timers = self.lock_timers.lock().await;
        for (device_id, (_, handle)) in timers.drain() {
            debug!(device_id, "cancelling lock-reset timer");
            handle.abort();
        }
    }

    /// Resolve a device from the cached list only; a miss must not cost a
    /// network round trip.
    async fn resolve(&self, device_id: &str) -> Option<Device> {
        let cache = self.cache.lock().await;
        cache.as_ref().and_then(|c| {
            c.devices.iter().find(|d| d.id == device_id).cloned()
        })
    }

    /// Record enumeration contact and publish online edges for devices
    /// that had been marked offline.
    async fn note_contact(&self, devices: &[Device]) {
        let now = Instant::now();
        let mut tracks = self.tracks.lock().await;
        for device in devices {
            if !device.is_online() {
                continue;
            }
            match tracks.get_mut(&device.id) {
                Some(track) => {
                    track.last_seen = now;
                    if !track.online {
                        track.online = true;
                        info!(device_id = %device.id, "device back online");
                        let _ = self.status_tx.send(DeviceStatus {
                            device_id: device.id.clone(),
                            online: true,
                            at: self.clock.now(),
                        });
                    }
                }
                None => {
                    tracks.insert(
                        device.id.clone(),
                        DeviceTrack {
                            online: true,
                            last_seen: now,
                        },
                    );
                }
            }
        }
    }

    /// Start (or restart) the one-shot timer that reverts the door to
    /// `locked`. A timer already pending for this device is aborted, so
    /// the reset fires once, measured from the latest open.
    async fn arm_lock_reset(self: &Arc<Self>, device_id: &str) {
        let delay = self.config.lock_reset_delay();
        let generation = self.timer_generation.fetch_add(1, Ordering::Relaxed);
        let control = Arc::clone(self);
        let id = device_id.to_string();

        let mut timers = self.lock_timers.lock().await;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(device_id = %id, "lock-reset timer fired");
            control.publish_lock(&id, LockState::Locked, None);
            control
                .events
                .log(EventKind::DoorLocked, Some(&id), Map::new())
                .await;
            let mut timers = control.lock_timers.lock().await;
            if timers.get(&id).is_some_and(|(tag, _)| *tag == generation) {
                timers.remove(&id);
            }
        });
        if let Some((_, previous)) = timers.insert(device_id.to_string(), (generation, handle)) {
            debug!(device_id, "superseding pending lock-reset timer");
            previous.abort();
        }
    }

    fn publish_lock(&self, device_id: &str, state: LockState, error: Option<String>) {
        let _ = self.lock_tx.send(DoorLockStatus {
            device_id: device_id.to_string(),
            state,
            error,
            at: self.clock.now(),
        });
    }

    fn api_error(&self, operation: &str, source: TransportError) -> DeviceControlError {
        warn!(operation, error = %source, "device api call failed");
        DeviceControlError::Api {
            device_id: None,
            source,
        }
    }
}

fn error_metadata(operation: &str, message: &str) -> Map<String, serde_json::Value> {
    Map::from_iter([
        ("operation".to_string(), json!(operation)),
        ("message".to_string(), json!(message)),
    ])
}

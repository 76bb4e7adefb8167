//! The hub facade.
//!
//! Wires the whole object graph together (transport, session, device
//! control, event log, camera directory, auto-open, push listener) and
//! exposes the host-facing surface as one explicitly constructed value.
//! No module-level singletons; tests build a [`Hub`] around fakes.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use domolink_client::api::{AddressCandidate, Camera, Device, IntercomApi};
use domolink_client::session::{AuthError, SessionManager, SessionStage, TokenSet};
use domolink_client::streams::{CameraDirectory, StreamError};
use domolink_client::transport::{ApiClient, ClientConfig, TransportError};
use domolink_core::clock::{Clock, SystemClock};
use domolink_core::config::{AutoOpenConfig, HubConfig};
use domolink_core::store::JsonStore;

use crate::autoopen::AutoOpenManager;
use crate::device::{
    DeviceControl, DeviceControlError, DeviceStatus, DoorLockStatus, spawn_monitor,
};
use crate::events::{Event, EventKind, EventLog};
use crate::push::{CallEvent, ListenerStatus, PushError, PushListener};

const TOKEN_FILE: &str = "tokens.json";
const PUSH_FILE: &str = "push_registration.json";

/// Hub bootstrap failures.
#[derive(Debug, Error)]
pub enum HubError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Core(#[from] domolink_core::Error),
}

struct Monitor {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Host-facing entry point. Owns every component and their background
/// tasks; [`Hub::shutdown`] tears all of it down.
pub struct Hub {
    config: HubConfig,
    session: Arc<SessionManager>,
    control: Arc<DeviceControl>,
    events: Arc<EventLog>,
    cameras: CameraDirectory,
    auto_open: Arc<AutoOpenManager>,
    push: PushListener,
    monitor: Mutex<Option<Monitor>>,
}

impl Hub {
    /// Assemble a hub from injected collaborators.
    pub fn new(
        config: HubConfig,
        api: Arc<dyn IntercomApi>,
        clock: Arc<dyn Clock>,
        token_store: JsonStore,
        push_store: JsonStore,
    ) -> Self {
        let session = Arc::new(SessionManager::new(
            Arc::clone(&api),
            Arc::clone(&clock),
            token_store,
            push_store,
        ));
        let events = Arc::new(EventLog::new(Arc::clone(&clock)));
        let control = Arc::new(DeviceControl::new(
            Arc::clone(&api),
            Arc::clone(&clock),
            Arc::clone(&events),
            config.clone(),
        ));
        let auto_open = Arc::new(AutoOpenManager::new(
            Arc::clone(&clock),
            Arc::clone(&control),
            Arc::clone(&events),
            AutoOpenConfig::default(),
        ));
        let cameras = CameraDirectory::new(Arc::clone(&api), Arc::clone(&session));
        let push = PushListener::new(
            Arc::clone(&session),
            Arc::clone(&events),
            Arc::clone(&auto_open) as Arc<dyn crate::push::CallHandler>,
        );

        Self {
            config,
            session,
            control,
            events,
            cameras,
            auto_open,
            push,
            monitor: Mutex::new(None),
        }
    }

    /// Build a hub against the real vendor backend: credentials from the
    /// config directory, device id pinned from the persisted token set,
    /// previous session restored, monitor started.
    pub async fn connect(config: HubConfig) -> Result<Self, HubError> {
        let token_store = JsonStore::in_data_dir(TOKEN_FILE)?;
        let push_store = JsonStore::in_data_dir(PUSH_FILE)?;

        let persisted: Option<TokenSet> = match token_store.load().await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable persisted tokens");
                None
            }
        };
        let api = Arc::new(ApiClient::new(&ClientConfig {
            base_url: config.base_url.clone(),
            timeout: config.request_timeout(),
            device_id: persisted.and_then(|t| t.device_id),
        })?);

        let hub = Self::new(
            config,
            api,
            Arc::new(SystemClock),
            token_store,
            push_store,
        );
        hub.session.restore().await;
        hub.start().await;
        Ok(hub)
    }

    /// Start the offline monitor. Idempotent.
    pub async fn start(&self) {
        let mut monitor = self.monitor.lock().await;
        if monitor.is_some() {
            return;
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_monitor(
            Arc::clone(&self.control),
            self.config.monitor_interval(),
            shutdown_rx,
        );
        *monitor = Some(Monitor {
            shutdown_tx,
            handle,
        });
        info!("hub started");
    }

    /// Stop every background task: monitor, lock-reset timers, push
    /// listener.
    pub async fn shutdown(&self) {
        if let Some(monitor) = self.monitor.lock().await.take() {
            let _ = monitor.shutdown_tx.send(true);
            if let Err(e) = monitor.handle.await {
                warn!(error = %e, "monitor task join failed");
            }
        }
        self.control.shutdown().await;
        self.push.stop().await;
        info!("hub shut down");
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub async fn request_code(&self, phone: &str) -> Result<(), AuthError> {
        self.session.request_code(phone).await
    }

    pub async fn verify(
        &self,
        phone: &str,
        code: &str,
    ) -> Result<Vec<AddressCandidate>, AuthError> {
        self.session.verify(phone, code).await
    }

    pub async fn login(
        &self,
        phone: &str,
        code: &str,
        user_id: Option<i64>,
    ) -> Result<TokenSet, AuthError> {
        self.session.login(phone, code, user_id).await
    }

    pub async fn logout(&self) {
        self.session.logout().await;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.is_authenticated().await
    }

    pub async fn session_stage(&self) -> SessionStage {
        self.session.stage().await
    }

    pub async fn refresh_if_needed(&self) -> Result<bool, AuthError> {
        self.session.refresh_if_needed().await
    }

    // =========================================================================
    // Devices and cameras
    // =========================================================================

    pub async fn list_devices(&self, force: bool) -> Result<Vec<Device>, DeviceControlError> {
        self.ensure_authenticated().await?;
        self.control.list_devices(force).await
    }

    pub async fn open_door(
        &self,
        device_id: &str,
        relay_num: Option<i64>,
    ) -> Result<(), DeviceControlError> {
        self.ensure_authenticated().await?;
        self.control.open_door(device_id, relay_num).await
    }

    /// Device commands require a live session, enforced here at the host
    /// surface.
    async fn ensure_authenticated(&self) -> Result<(), DeviceControlError> {
        if self.session.is_authenticated().await {
            Ok(())
        } else {
            Err(DeviceControlError::NotAuthenticated)
        }
    }

    pub fn subscribe_locks(&self) -> broadcast::Receiver<DoorLockStatus> {
        self.control.subscribe_locks()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<DeviceStatus> {
        self.control.subscribe_status()
    }

    pub async fn list_cameras(&self) -> Result<Vec<Camera>, StreamError> {
        self.cameras.list_cameras().await
    }

    pub async fn stream_url(&self, uuid: &str, realtime: bool) -> Result<String, StreamError> {
        self.cameras.stream_url(uuid, realtime).await
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub async fn history(
        &self,
        limit: usize,
        kind: Option<EventKind>,
        device_id: Option<&str>,
    ) -> Vec<Event> {
        self.events.history(limit, kind, device_id).await
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub async fn clear_history(&self) {
        self.events.clear().await;
    }

    pub async fn event_stats(&self) -> std::collections::BTreeMap<EventKind, usize> {
        self.events.stats().await
    }

    // =========================================================================
    // Auto-open and push
    // =========================================================================

    pub async fn auto_open_config(&self) -> AutoOpenConfig {
        self.auto_open.config().await
    }

    pub async fn set_auto_open_config(&self, config: AutoOpenConfig) {
        self.auto_open.set_config(config).await;
    }

    pub async fn start_push(&self) -> Result<(), PushError> {
        self.push.start().await
    }

    pub async fn stop_push(&self) {
        self.push.stop().await;
    }

    pub async fn push_status(&self) -> ListenerStatus {
        self.push.status().await
    }

    /// Feed one decoded incoming call into the push pipeline.
    pub async fn deliver_call(&self, call: CallEvent) -> Result<(), PushError> {
        self.push.deliver(call).await
    }
}

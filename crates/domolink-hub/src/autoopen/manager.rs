use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use domolink_core::clock::Clock;
use domolink_core::config::AutoOpenConfig;

use crate::device::DeviceControl;
use crate::events::{EventKind, EventLog};
use crate::push::{CallEvent, CallHandler};

use super::decider::should_open;

/// Holds the live auto-open configuration and acts on incoming calls.
pub struct AutoOpenManager {
    clock: Arc<dyn Clock>,
    control: Arc<DeviceControl>,
    events: Arc<EventLog>,
    config: RwLock<AutoOpenConfig>,
}

impl AutoOpenManager {
    pub fn new(
        clock: Arc<dyn Clock>,
        control: Arc<DeviceControl>,
        events: Arc<EventLog>,
        config: AutoOpenConfig,
    ) -> Self {
        Self {
            clock,
            control,
            events,
            config: RwLock::new(config),
        }
    }

    pub async fn config(&self) -> AutoOpenConfig {
        self.config.read().await.clone()
    }

    pub async fn set_config(&self, config: AutoOpenConfig) {
        info!(
            enabled = config.enabled,
            schedules = config.schedules.len(),
            "auto-open configuration updated"
        );
        *self.config.write().await = config;
    }
}

#[async_trait]
impl CallHandler for AutoOpenManager {
    /// Best-effort call handling: a declined decision does nothing, a
    /// door failure is logged and swallowed.
    async fn handle_call(&self, call: CallEvent) -> bool {
        let config = self.config.read().await.clone();
        let now = self.clock.now();
        if !should_open(&config, now) {
            debug!(device_id = %call.device_id, "auto-open declined for this call");
            return false;
        }

        match self.control.open_door(&call.device_id, None).await {
            Ok(()) => {
                self.events
                    .log(
                        EventKind::AutoOpen,
                        Some(&call.device_id),
                        serde_json::Map::from_iter([
                            ("call_id".to_string(), json!(call.call_id)),
                            ("call_timestamp".to_string(), json!(call.timestamp)),
                        ]),
                    )
                    .await;
                info!(device_id = %call.device_id, call_id = %call.call_id, "auto-opened door");
                true
            }
            Err(e) => {
                // open_door already logged the error event; just swallow.
                warn!(device_id = %call.device_id, error = %e, "auto-open door command failed");
                false
            }
        }
    }
}

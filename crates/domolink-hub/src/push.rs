//! Push-notification seam.
//!
//! The wire protocol that delivers intercom calls stays outside this
//! crate; the host feeds decoded [`CallEvent`]s into a running
//! [`PushListener`], which logs them and dispatches to the registered
//! [`CallHandler`] (the auto-open manager).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use domolink_client::session::SessionManager;

use crate::events::{EventKind, EventLog};

const DELIVERY_CAPACITY: usize = 32;

/// An incoming intercom call, decoded from a push payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CallEvent {
    pub call_id: String,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub snapshot_url: Option<String>,
    pub metadata: Map<String, Value>,
}

/// Receives incoming calls from the push listener.
#[async_trait]
pub trait CallHandler: Send + Sync {
    /// Returns whether the call resulted in a door action.
    async fn handle_call(&self, call: CallEvent) -> bool;
}

#[derive(Debug, Error)]
pub enum PushError {
    #[error("Push listener requires an authenticated session")]
    NotAuthenticated,

    #[error("Push listener requires a registered push token")]
    NoPushToken,

    #[error("Push listener is already running")]
    AlreadyRunning,

    #[error("Push listener is not running")]
    NotRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerStatus {
    Stopped,
    Running,
}

struct ListenerTask {
    delivery_tx: mpsc::Sender<CallEvent>,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Start/stop handle around the call-dispatch task.
pub struct PushListener {
    session: Arc<SessionManager>,
    events: Arc<EventLog>,
    handler: Arc<dyn CallHandler>,
    task: Mutex<Option<ListenerTask>>,
}

impl PushListener {
    pub fn new(
        session: Arc<SessionManager>,
        events: Arc<EventLog>,
        handler: Arc<dyn CallHandler>,
    ) -> Self {
        Self {
            session,
            events,
            handler,
            task: Mutex::new(None),
        }
    }

    /// Start dispatching. Requires an authenticated session holding a
    /// push token.
    pub async fn start(&self) -> Result<(), PushError> {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return Err(PushError::AlreadyRunning);
        }
        if !self.session.is_authenticated().await {
            return Err(PushError::NotAuthenticated);
        }
        let has_push_token = self
            .session
            .tokens()
            .await
            .is_some_and(|t| t.push_token.is_some());
        if !has_push_token {
            return Err(PushError::NoPushToken);
        }

        let (delivery_tx, mut delivery_rx) = mpsc::channel::<CallEvent>(DELIVERY_CAPACITY);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let events = Arc::clone(&self.events);
        let handler = Arc::clone(&self.handler);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    call = delivery_rx.recv() => {
                        let Some(call) = call else { return };
                        let mut metadata = call.metadata.clone();
                        metadata.insert("call_id".to_string(), json!(call.call_id));
                        events
                            .log(EventKind::CallReceived, Some(&call.device_id), metadata)
                            .await;
                        let opened = handler.handle_call(call).await;
                        if !opened {
                            info!("incoming call handled without door action");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("Push listener shutting down");
                        return;
                    }
                }
            }
        });

        *task = Some(ListenerTask {
            delivery_tx,
            shutdown_tx,
            handle,
        });
        info!("push listener started");
        Ok(())
    }

    /// Stop dispatching; cancels and awaits the task.
    pub async fn stop(&self) {
        let Some(task) = self.task.lock().await.take() else {
            return;
        };
        let _ = task.shutdown_tx.send(true);
        if let Err(e) = task.handle.await {
            warn!(error = %e, "push listener task join failed");
        }
        info!("push listener stopped");
    }

    pub async fn status(&self) -> ListenerStatus {
        if self.task.lock().await.is_some() {
            ListenerStatus::Running
        } else {
            ListenerStatus::Stopped
        }
    }

    /// Feed one decoded call into the running listener.
    pub async fn deliver(&self, call: CallEvent) -> Result<(), PushError> {
        let task = self.task.lock().await;
        let Some(task) = task.as_ref() else {
            return Err(PushError::NotRunning);
        };
        task.delivery_tx
            .send(call)
            .await
            .map_err(|_| PushError::NotRunning)
    }
}

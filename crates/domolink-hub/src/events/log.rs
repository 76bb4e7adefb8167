use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, broadcast};
use tracing::debug;
use uuid::Uuid;

use domolink_core::clock::Clock;

const MAX_EVENTS: usize = 100;
const BROADCAST_CAPACITY: usize = 64;

/// Event categories.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Call,
    CallReceived,
    CallAccepted,
    DoorOpen,
    DoorLocked,
    DoorUnlocked,
    AutoOpen,
    StreamStarted,
    StreamStopped,
    NotificationReceived,
    Error,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::CallReceived => "call_received",
            Self::CallAccepted => "call_accepted",
            Self::DoorOpen => "door_open",
            Self::DoorLocked => "door_locked",
            Self::DoorUnlocked => "door_unlocked",
            Self::AutoOpen => "auto_open",
            Self::StreamStarted => "stream_started",
            Self::StreamStopped => "stream_stopped",
            Self::NotificationReceived => "notification_received",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logged occurrence. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub kind: EventKind,
    pub device_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub metadata: Map<String, Value>,
}

/// Bounded in-memory event history with broadcast fan-out.
pub struct EventLog {
    clock: Arc<dyn Clock>,
    entries: Mutex<VecDeque<Event>>,
    tx: broadcast::Sender<Event>,
}

impl EventLog {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            clock,
            entries: Mutex::new(VecDeque::with_capacity(MAX_EVENTS)),
            tx,
        }
    }

    /// Append an event and fan it out to subscribers.
    ///
    /// Sending is fire-and-forget; a full or absent subscriber never
    /// blocks or fails the append.
    pub async fn log(
        &self,
        kind: EventKind,
        device_id: Option<&str>,
        metadata: Map<String, Value>,
    ) -> Event {
        let event = Event {
            id: Uuid::new_v4().to_string(),
            kind,
            device_id: device_id.map(str::to_string),
            timestamp: self.clock.now(),
            metadata,
        };

        let mut entries = self.entries.lock().await;
        entries.push_back(event.clone());
        while entries.len() > MAX_EVENTS {
            entries.pop_front();
        }
        drop(entries);

        debug!(kind = %event.kind, device_id = ?event.device_id, "event logged");
        let _ = self.tx.send(event.clone());
        event
    }

    /// Subscribe to the live event feed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Up to `limit` events, most recent first, optionally filtered by
    /// kind and/or device.
    pub async fn history(
        &self,
        limit: usize,
        kind: Option<EventKind>,
        device_id: Option<&str>,
    ) -> Vec<Event> {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .rev()
            .filter(|e| kind.is_none_or(|k| e.kind == k))
            .filter(|e| device_id.is_none_or(|d| e.device_id.as_deref() == Some(d)))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Drop all history.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Current entry count per kind.
    pub async fn stats(&self) -> BTreeMap<EventKind, usize> {
        let entries = self.entries.lock().await;
        let mut stats = BTreeMap::new();
        for event in entries.iter() {
            *stats.entry(event.kind).or_insert(0) += 1;
        }
        stats
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

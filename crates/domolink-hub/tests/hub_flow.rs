//! End-to-end hub flow against a fake vendor backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value, json};
use tempfile::TempDir;

use domolink_client::api::IntercomApi;
use domolink_client::transport::TransportError;
use domolink_core::clock::{Clock, ManualClock};
use domolink_core::config::{AutoOpenConfig, HubConfig};
use domolink_core::store::JsonStore;
use domolink_hub::{CallEvent, DeviceControlError, EventKind, Hub, ListenerStatus, LockState};

#[derive(Default)]
struct FakeBackend {
    open_calls: AtomicU32,
}

#[async_trait]
impl IntercomApi for FakeBackend {
    fn device_id(&self) -> &str {
        "aabbccdd00112233"
    }

    fn set_bearer(&self, _token: &str) {}

    fn clear_bearer(&self) {}

    async fn request_confirm_code(&self, _phone: &str) -> Result<Value, TransportError> {
        Ok(json!({ "authId": "auth-1" }))
    }

    async fn check_confirm_code(
        &self,
        _phone: &str,
        _code: &str,
        _auth_id: &str,
    ) -> Result<Value, TransportError> {
        Ok(json!({
            "authId": "auth-2",
            "addresses": [{ "USER_ID": 42, "ADDRESS": "Lenina 1-42" }]
        }))
    }

    async fn issue_token(&self, _auth_id: &str, user_id: i64) -> Result<Value, TransportError> {
        Ok(json!({
            "TOKEN": "integration-token",
            "USER_ID": user_id,
            "PROFILE_ID": 7,
            "ACCESS_END": "2030-01-01 00:00:00"
        }))
    }

    async fn list_relays(&self, shared: bool) -> Result<Value, TransportError> {
        if !shared {
            return Ok(json!([]));
        }
        Ok(json!([{
            "MAC_ADDR": "door-1",
            "NAME": "Entrance",
            "OPENER": { "relay_id": 500, "relay_num": 1 },
            "STATUS_CODE": "0"
        }]))
    }

    async fn open_relay(&self, relay_id: i64) -> Result<Value, TransportError> {
        assert_eq!(relay_id, 500);
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({}))
    }

    async fn list_cameras(&self) -> Result<Value, TransportError> {
        Ok(json!([{
            "groupName": "Yard",
            "cameras": [{
                "UUID": "cam-1",
                "MEDIA": { "HLS": { "LIVE": { "MAIN": "https://cdn.example.com/main.m3u8" } } }
            }]
        }]))
    }

    async fn register_push_token(
        &self,
        _push_token: &str,
        _access_token: &str,
        _profile_id: i64,
        _user_id: i64,
    ) -> Result<(), TransportError> {
        Ok(())
    }
}

fn hub(dir: &TempDir, backend: Arc<FakeBackend>) -> Hub {
    Hub::new(
        HubConfig::default(),
        backend,
        Arc::new(ManualClock::default()) as Arc<dyn Clock>,
        JsonStore::new(dir.path().join("tokens.json")),
        JsonStore::new(dir.path().join("push.json")),
    )
}

#[tokio::test]
async fn unauthenticated_hub_refuses_device_commands() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let hub = hub(&dir, Arc::clone(&backend));

    assert!(matches!(
        hub.list_devices(false).await,
        Err(DeviceControlError::NotAuthenticated)
    ));
    assert!(matches!(
        hub.open_door("door-1", None).await,
        Err(DeviceControlError::NotAuthenticated)
    ));
    // The backend never saw the open command.
    assert_eq!(backend.open_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn login_open_door_and_observe_events() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let hub = hub(&dir, Arc::clone(&backend));
    hub.start().await;

    // Phone auth end to end.
    hub.request_code("+79990001122").await.unwrap();
    let candidates = hub.verify("+79990001122", "1234").await.unwrap();
    assert_eq!(candidates[0].user_id, 42);
    let tokens = hub.login("+79990001122", "1234", Some(42)).await.unwrap();
    assert_eq!(tokens.access_token, "integration-token");
    assert!(hub.is_authenticated().await);

    // Devices and door control.
    let devices = hub.list_devices(false).await.unwrap();
    assert_eq!(devices.len(), 1);
    let mut locks = hub.subscribe_locks();
    hub.open_door("door-1", None).await.unwrap();
    assert_eq!(locks.recv().await.unwrap().state, LockState::Unlocked);
    tokio::time::sleep(std::time::Duration::from_secs(6)).await;
    assert_eq!(locks.recv().await.unwrap().state, LockState::Locked);

    // Cameras.
    let cameras = hub.list_cameras().await.unwrap();
    assert_eq!(cameras.len(), 1);
    assert_eq!(
        hub.stream_url("cam-1", false).await.unwrap(),
        "https://cdn.example.com/main.m3u8"
    );

    // History reflects the door cycle.
    let history = hub.history(10, None, None).await;
    assert_eq!(history[0].kind, EventKind::DoorLocked);
    assert_eq!(history[1].kind, EventKind::DoorOpen);

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn delivered_call_auto_opens_when_enabled() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::default());
    let hub = hub(&dir, Arc::clone(&backend));
    hub.start().await;

    hub.request_code("+7999").await.unwrap();
    hub.login("+7999", "1234", None).await.unwrap();
    hub.list_devices(false).await.unwrap();
    hub.set_auto_open_config(AutoOpenConfig {
        enabled: true,
        schedules: vec![],
    })
    .await;

    assert_eq!(hub.push_status().await, ListenerStatus::Stopped);
    hub.start_push().await.unwrap();
    assert_eq!(hub.push_status().await, ListenerStatus::Running);

    let mut events = hub.subscribe_events();
    hub.deliver_call(CallEvent {
        call_id: "call-7".to_string(),
        device_id: "door-1".to_string(),
        timestamp: Utc::now(),
        snapshot_url: None,
        metadata: Map::new(),
    })
    .await
    .unwrap();

    // call_received first, then the auto-open action.
    loop {
        let event = events.recv().await.unwrap();
        if event.kind == EventKind::AutoOpen {
            assert_eq!(event.metadata["call_id"], json!("call-7"));
            break;
        }
    }
    assert_eq!(backend.open_calls.load(Ordering::SeqCst), 1);

    hub.shutdown().await;
    assert_eq!(hub.push_status().await, ListenerStatus::Stopped);
}

//! Shared test doubles for the hub crate.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use domolink_client::api::IntercomApi;
use domolink_client::transport::TransportError;

/// Scriptable vendor API fake.
#[derive(Default)]
pub struct FakeApi {
    pub shared_relays: Mutex<Value>,
    pub fallback_relays: Mutex<Value>,
    pub fail_open: AtomicBool,
    pub list_calls: AtomicU32,
    pub open_calls: AtomicU32,
    /// The `shared` flag of each `list_relays` call, in order.
    pub list_shared_args: Mutex<Vec<bool>>,
}

impl FakeApi {
    pub fn with_shared_relays(relays: Value) -> Self {
        Self {
            shared_relays: Mutex::new(relays),
            fallback_relays: Mutex::new(json!([])),
            ..Self::default()
        }
    }

    pub fn set_shared_relays(&self, relays: Value) {
        if let Ok(mut guard) = self.shared_relays.lock() {
            *guard = relays;
        }
    }

    pub fn relay_fixture(id: &str, relay_id: i64, online: bool) -> Value {
        json!({
            "MAC_ADDR": id,
            "NAME": format!("Door {id}"),
            "OPENER": { "relay_id": relay_id, "relay_num": 1 },
            "STATUS_CODE": if online { "0" } else { "1" }
        })
    }
}

#[async_trait]
impl IntercomApi for FakeApi {
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
            "addresses": [{ "USER_ID": 100, "ADDRESS": "Lenina 1-42" }]
        }))
    }

    async fn issue_token(&self, _auth_id: &str, user_id: i64) -> Result<Value, TransportError> {
        Ok(json!({
            "TOKEN": "test-token",
            "USER_ID": user_id,
            "PROFILE_ID": 900,
            "ACCESS_END": "2030-01-01 00:00:00"
        }))
    }

    async fn list_relays(&self, shared: bool) -> Result<Value, TransportError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut args) = self.list_shared_args.lock() {
            args.push(shared);
        }
        let source = if shared {
            &self.shared_relays
        } else {
            &self.fallback_relays
        };
        Ok(source.lock().map(|v| v.clone()).unwrap_or(Value::Null))
    }

    async fn open_relay(&self, _relay_id: i64) -> Result<Value, TransportError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(TransportError::Decode("simulated open failure".to_string()));
        }
        Ok(json!({}))
    }

    async fn list_cameras(&self) -> Result<Value, TransportError> {
        Ok(json!([]))
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

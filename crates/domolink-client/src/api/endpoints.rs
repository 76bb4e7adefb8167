//! [`IntercomApi`] implementation against the real vendor endpoints.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};

use crate::transport::{ApiClient, Payload, TransportError};

use super::IntercomApi;

const AUTH_GET_CONFIRM: &str = "/mobile/auth/get-confirm";
const AUTH_CHECK_CONFIRM: &str = "/mobile/auth/check-confirm";
const AUTH_GET_TOKEN: &str = "/mobile/auth/get-token";
const RELAYS: &str = "/domofon/relays";
const CAMERAS_URL: &str = "https://cams.is74.ru/api/self-cams-with-group";

// Push registration goes through the vendor CRM, which issues its own JWT.
const CRM_AUTH_URL: &str = "https://td-crm.is74.ru/api/auth-lk";
const CRM_USER_DEVICE_URL: &str = "https://td-crm.is74.ru/api/user-device";
const CRM_SOURCE: &str = "com.intersvyaz.lk";
const CRM_APP_VERSION: &str = "1.30.1";
const PUSH_DEVICE_NAME: &str = "Domolink Hub";

#[async_trait]
impl IntercomApi for ApiClient {
    fn device_id(&self) -> &str {
        Self::device_id(self)
    }

    fn set_bearer(&self, token: &str) {
        Self::set_bearer(self, token);
    }

    fn clear_bearer(&self) {
        Self::clear_bearer(self);
    }

    async fn request_confirm_code(&self, phone: &str) -> Result<Value, TransportError> {
        self.post_json(
            AUTH_GET_CONFIRM,
            &[],
            json!({
                "deviceId": Self::device_id(self),
                "phone": phone,
            }),
        )
        .await
    }

    async fn check_confirm_code(
        &self,
        phone: &str,
        code: &str,
        auth_id: &str,
    ) -> Result<Value, TransportError> {
        self.post_form(
            AUTH_CHECK_CONFIRM,
            vec![
                ("phone".to_string(), phone.to_string()),
                ("confirmCode".to_string(), code.to_string()),
                ("authId".to_string(), auth_id.to_string()),
            ],
        )
        .await
    }

    async fn issue_token(&self, auth_id: &str, user_id: i64) -> Result<Value, TransportError> {
        self.post_form(
            AUTH_GET_TOKEN,
            vec![
                ("authId".to_string(), auth_id.to_string()),
                ("userId".to_string(), user_id.to_string()),
                ("uniqueDeviceId".to_string(), Self::device_id(self).to_string()),
            ],
        )
        .await
    }

    async fn list_relays(&self, shared: bool) -> Result<Value, TransportError> {
        let mut query = vec![
            ("pagination", "1"),
            ("pageSize", "30"),
            ("page", "1"),
        ];
        if shared {
            query.push(("isShared", "1"));
        } else {
            // The fallback set lists building-shared relays first.
            query.insert(0, ("mainFirst", "1"));
            query.push(("isShared", "0"));
        }
        self.get(RELAYS, &query).await
    }

    async fn open_relay(&self, relay_id: i64) -> Result<Value, TransportError> {
        self.post_json(
            &format!("{RELAYS}/{relay_id}/open"),
            &[("from", "app")],
            json!({}),
        )
        .await
    }

    async fn list_cameras(&self) -> Result<Value, TransportError> {
        self.get(CAMERAS_URL, &[]).await
    }

    async fn register_push_token(
        &self,
        push_token: &str,
        access_token: &str,
        profile_id: i64,
        user_id: i64,
    ) -> Result<(), TransportError> {
        let crm_headers = |jwt: Option<&str>| {
            let mut headers: Vec<(&'static str, String)> = vec![
                ("Platform", "Android".to_string()),
                ("X-Api-Profile-Id", profile_id.to_string()),
                ("X-Api-Source", CRM_SOURCE.to_string()),
                ("X-Api-User-Id", user_id.to_string()),
                ("X-App-version", CRM_APP_VERSION.to_string()),
            ];
            if let Some(jwt) = jwt {
                headers.push(("Authorization", format!("Bearer {jwt}")));
            }
            headers
        };

        // Step 1: exchange the access token for a CRM JWT.
        let response = self
            .request(
                Method::POST,
                CRM_AUTH_URL,
                &[],
                &crm_headers(None),
                &Payload::Form(vec![
                    ("token".to_string(), access_token.to_string()),
                    ("buyerId".to_string(), "1".to_string()),
                ]),
            )
            .await?;
        let crm_jwt = response
            .get("TOKEN")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                TransportError::Decode("CRM auth response has no TOKEN".to_string())
            })?
            .to_string();

        // Step 2: register this install as a push-capable device.
        self.request(
            Method::PUT,
            CRM_USER_DEVICE_URL,
            &[],
            &crm_headers(Some(&crm_jwt)),
            &Payload::Json(json!({
                "alertType": "push",
                "appId": CRM_SOURCE,
                "deviceId": Self::device_id(self),
                "deviceName": PUSH_DEVICE_NAME,
                "platform": "google",
                "pushToken": push_token,
                "sendingPush": true,
            })),
        )
        .await?;
        Ok(())
    }
}

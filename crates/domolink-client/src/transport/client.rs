//! Retrying HTTP client for the vendor REST API.

use std::sync::RwLock;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::mask::mask_sensitive;

/// Vendor mobile-app identity; the backend rejects unknown agents.
const VENDOR_USER_AGENT: &str = "4.12.0 com.intersvyaz.lk/1.30.1.2024040812";
const VENDOR_ACCEPT: &str = "application/json; version=v2";

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection-level failure. Retried transparently up to 3 attempts.
    #[error("Network error: {0}")]
    Network(reqwest::Error),

    /// Request timed out. Retried transparently up to 3 attempts.
    #[error("Request timeout: {0}")]
    Timeout(reqwest::Error),

    /// Any HTTP status >= 400. Never retried.
    #[error("API request failed: HTTP {status}: {body}")]
    Status { status: u16, body: Value },

    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl TransportError {
    /// Only network/timeout failures are transient; everything else is
    /// surfaced to the caller on the first occurrence.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else {
            Self::Network(err)
        }
    }
}

/// Request body shapes the vendor API uses.
#[derive(Debug, Clone)]
pub enum Payload {
    Empty,
    Json(Value),
    /// `application/x-www-form-urlencoded` key/value pairs.
    Form(Vec<(String, String)>),
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Vendor API base URL.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Per-install device identifier. Generated (16 hex chars) when absent
    /// and then pinned for the lifetime of the install.
    pub device_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.is74.ru".to_string(),
            timeout: Duration::from_secs(30),
            device_id: None,
        }
    }
}

/// HTTP client with masking, retry and a pinned device identifier.
#[derive(Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    device_id: String,
    bearer: RwLock<Option<String>>,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        if config.base_url.is_empty() {
            return Err(TransportError::Config("base_url is empty".into()));
        }

        let device_id = config
            .device_id
            .clone()
            .unwrap_or_else(generate_device_id);

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(VENDOR_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(VENDOR_ACCEPT));
        let device_val = HeaderValue::from_str(&device_id)
            .map_err(|_| TransportError::Config("Invalid device id".into()))?;
        headers.insert(HeaderName::from_static("x-device-id"), device_val);

        // Ensure a TLS crypto provider is installed (reqwest uses
        // rustls-no-provider). Err here means one is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Config(format!("failed to build client: {e}")))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            device_id,
            bearer: RwLock::new(None),
        })
    }

    /// The pinned per-install device identifier.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Set the bearer token attached to subsequent requests.
    pub fn set_bearer(&self, token: &str) {
        if let Ok(mut bearer) = self.bearer.write() {
            *bearer = Some(token.to_string());
        }
    }

    /// Drop the bearer token.
    pub fn clear_bearer(&self) {
        if let Ok(mut bearer) = self.bearer.write() {
            *bearer = None;
        }
    }

    /// Resolve a path against the base URL; absolute URLs pass through
    /// (the camera and push backends live on different hosts).
    pub(crate) fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    pub async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, TransportError> {
        self.request(Method::GET, path, query, &[], &Payload::Empty)
            .await
    }

    pub async fn post_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: Value,
    ) -> Result<Value, TransportError> {
        self.request(Method::POST, path, query, &[], &Payload::Json(body))
            .await
    }

    pub async fn post_form(
        &self,
        path: &str,
        form: Vec<(String, String)>,
    ) -> Result<Value, TransportError> {
        self.request(Method::POST, path, &[], &[], &Payload::Form(form))
            .await
    }

    /// Make a request with bounded retry.
    ///
    /// Network/timeout failures are retried up to 3 attempts with
    /// exponential backoff (1s doubling, capped at 10s). HTTP error
    /// statuses are returned immediately.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        headers: &[(&'static str, String)],
        payload: &Payload,
    ) -> Result<Value, TransportError> {
        let url = self.resolve_url(path);
        let mut delay = INITIAL_BACKOFF;
        let mut attempt = 1u32;
        loop {
            match self.execute(method.clone(), &url, query, headers, payload).await {
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!(
                        %method,
                        url = %url,
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        error = %e,
                        "transient transport failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, MAX_BACKOFF);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&'static str, String)],
        payload: &Payload,
    ) -> Result<Value, TransportError> {
        let mut builder = self.http.request(method.clone(), url);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(token) = self.bearer.read().ok().and_then(|b| b.clone()) {
            builder = builder.bearer_auth(token);
        }
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }

        // Masked request body is built up-front so sensitive values never
        // reach a sink, whether or not a subscriber is attached.
        let masked_body = match payload {
            Payload::Empty => String::new(),
            Payload::Json(body) => {
                builder = builder.json(body);
                mask_sensitive(&body.to_string())
            }
            Payload::Form(pairs) => {
                builder = builder.form(pairs);
                let raw = pairs
                    .iter()
                    .map(|(k, v)| format!("\"{k}\": \"{v}\""))
                    .collect::<Vec<_>>()
                    .join(", ");
                mask_sensitive(&raw)
            }
        };
        debug!(%method, url = %url, body = %masked_body, "api request");

        let response = builder.send().await.map_err(TransportError::from_send)?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Decode(format!("failed to read body: {e}")))?;

        let masked_response = mask_sensitive(&text);
        debug!(
            status = status.as_u16(),
            body = %truncate(&masked_response, 1000),
            "api response"
        );

        if status.as_u16() >= 400 {
            let body = serde_json::from_str(&text)
                .unwrap_or_else(|_| serde_json::json!({ "detail": text }));
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| TransportError::Decode(format!("invalid JSON response: {e}")))
    }
}

/// Generate a fresh 16-hex-char per-install device identifier.
fn generate_device_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    hex[..16].to_string()
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

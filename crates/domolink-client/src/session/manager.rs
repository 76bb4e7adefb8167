//! Authentication state machine, rate limiting and token refresh.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use domolink_core::clock::Clock;
use domolink_core::store::JsonStore;

use crate::api::{AddressCandidate, IntercomApi, adapt};
use crate::transport::TransportError;

use super::tokens::{PushRegistration, TokenSet};

const MAX_FAILED_ATTEMPTS: u32 = 3;
const LOCKOUT_SECS: i64 = 300;
const REFRESH_THRESHOLD_SECS: i64 = 300;
const TOKEN_EXPIRY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FALLBACK_TOKEN_TTL_DAYS: i64 = 365;

const PUSH_TOKEN_TTL_DAYS: i64 = 90;
const PUSH_REFRESH_THRESHOLD_DAYS: i64 = 7;
const PUSH_RETRY_ATTEMPTS: u32 = 3;
const PUSH_RETRY_INITIAL_BACKOFF: StdDuration = StdDuration::from_secs(1);
const PUSH_RETRY_MAX_BACKOFF: StdDuration = StdDuration::from_secs(10);

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Lockout active; carries the exact remaining whole seconds.
    #[error("Too many failed authentication attempts. Try again in {retry_after} seconds.")]
    RateLimited { retry_after: i64 },

    #[error("Failed to request confirmation code: {0}")]
    CodeRequest(#[source] TransportError),

    #[error("Failed to verify confirmation code: {0}")]
    CodeVerify(#[source] TransportError),

    #[error("Failed to obtain access token: {0}")]
    TokenRequest(#[source] TransportError),

    #[error("Invalid authentication response: {0}")]
    InvalidResponse(String),

    #[error("No addresses found in verification response")]
    NoAddresses,

    #[error("No address found for user id {0}")]
    UnknownUserId(i64),

    #[error("Cannot refresh token: continuation id not available")]
    MissingContinuation,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Authentication step out of order: {0}")]
    InvalidState(&'static str),

    #[error("Failed to register push token: {0}")]
    PushRegistration(#[source] TransportError),

    #[error("Failed to persist credentials: {0}")]
    Store(#[from] domolink_core::Error),
}

/// Where the login flow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    Unauthenticated,
    CodeRequested,
    Verified,
    Authenticated,
}

struct AuthState {
    stage: SessionStage,
    /// Continuation id from the most recent auth step.
    auth_id: Option<String>,
    /// Candidates returned by code verification, pending selection.
    candidates: Vec<AddressCandidate>,
    /// Phone of the in-flight login, kept for push re-registration.
    pending_phone: Option<String>,
    tokens: Option<TokenSet>,
    failed_attempts: u32,
    lockout_until: Option<DateTime<Utc>>,
}

/// Manages the vendor session: SMS login, rate limiting, refresh and the
/// push-token lifecycle.
pub struct SessionManager {
    api: Arc<dyn IntercomApi>,
    clock: Arc<dyn Clock>,
    token_store: JsonStore,
    push_store: JsonStore,
    state: Mutex<AuthState>,
}

impl SessionManager {
    pub fn new(
        api: Arc<dyn IntercomApi>,
        clock: Arc<dyn Clock>,
        token_store: JsonStore,
        push_store: JsonStore,
    ) -> Self {
        Self {
            api,
            clock,
            token_store,
            push_store,
            state: Mutex::new(AuthState {
                stage: SessionStage::Unauthenticated,
                auth_id: None,
                candidates: Vec::new(),
                pending_phone: None,
                tokens: None,
                failed_attempts: 0,
                lockout_until: None,
            }),
        }
    }

    /// Adopt tokens persisted by a previous run.
    ///
    /// An expired set that still carries a continuation id is kept as
    /// current and refreshed lazily on next use; an expired set without
    /// one is useless and ignored.
    pub async fn restore(&self) -> bool {
        let loaded: Option<TokenSet> = match self.token_store.load().await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "failed to load persisted tokens");
                return false;
            }
        };
        let Some(tokens) = loaded else {
            debug!("no persisted tokens found");
            return false;
        };

        let now = self.clock.now();
        if tokens.is_expired(now) && tokens.authid.is_none() {
            warn!("persisted tokens are expired and carry no continuation id");
            return false;
        }

        if tokens.is_expired(now) {
            info!("persisted tokens are expired, will refresh on next use");
        } else {
            self.api.set_bearer(&tokens.access_token);
        }

        let mut state = self.state.lock().await;
        state.auth_id = tokens.authid.clone();
        state.pending_phone = tokens.phone.clone();
        state.tokens = Some(tokens);
        state.stage = SessionStage::Authenticated;
        info!("session restored from persisted tokens");
        true
    }

    /// Step 1: request an SMS confirmation code for `phone`.
    pub async fn request_code(&self, phone: &str) -> Result<(), AuthError> {
        let mut state = self.state.lock().await;
        self.check_rate_limit(&state)?;

        match self.api.request_confirm_code(phone).await {
            Ok(response) => {
                if let Some(auth_id) = response.get("authId").and_then(Value::as_str) {
                    state.auth_id = Some(auth_id.to_string());
                }
                state.pending_phone = Some(phone.to_string());
                state.stage = SessionStage::CodeRequested;
                info!("confirmation code requested");
                Ok(())
            }
            Err(e) => {
                self.record_failure(&mut state);
                Err(AuthError::CodeRequest(e))
            }
        }
    }

    /// Step 2: verify the SMS code. Returns the candidate addresses; the
    /// caller selects one via [`Self::complete`] (or lets it default to
    /// the first).
    pub async fn verify(
        &self,
        phone: &str,
        code: &str,
    ) -> Result<Vec<AddressCandidate>, AuthError> {
        let mut state = self.state.lock().await;
        self.check_rate_limit(&state)?;

        let auth_id = state.auth_id.clone().unwrap_or_default();
        let response = match self.api.check_confirm_code(phone, code, &auth_id).await {
            Ok(response) => response,
            Err(e) => {
                self.record_failure(&mut state);
                return Err(AuthError::CodeVerify(e));
            }
        };

        if let Some(auth_id) = response.get("authId").and_then(Value::as_str) {
            state.auth_id = Some(auth_id.to_string());
        }
        if state.auth_id.is_none() {
            return Err(AuthError::InvalidResponse(
                "verification response has no continuation id".into(),
            ));
        }

        let candidates = adapt::candidates_from_response(&response);
        if candidates.is_empty() {
            return Err(AuthError::NoAddresses);
        }

        state.pending_phone = Some(phone.to_string());
        state.candidates = candidates.clone();
        state.stage = SessionStage::Verified;
        info!(candidates = candidates.len(), "confirmation code verified");
        Ok(candidates)
    }

    /// Step 3: exchange the continuation id and selected identity for an
    /// access token. With `user_id = None` the first candidate is used.
    ///
    /// On success the token set is persisted and a push token is acquired
    /// best-effort; push failure never fails the login.
    pub async fn complete(&self, user_id: Option<i64>) -> Result<TokenSet, AuthError> {
        let mut state = self.state.lock().await;
        self.check_rate_limit(&state)?;

        if state.stage != SessionStage::Verified {
            return Err(AuthError::InvalidState("complete() requires a verified code"));
        }
        let selected = match user_id {
            Some(wanted) => state
                .candidates
                .iter()
                .find(|c| c.user_id == wanted)
                .ok_or(AuthError::UnknownUserId(wanted))?
                .user_id,
            None => {
                state
                    .candidates
                    .first()
                    .ok_or(AuthError::NoAddresses)?
                    .user_id
            }
        };
        info!(candidates = state.candidates.len(), "identity selected");

        let tokens = self.issue_tokens(&mut state, selected).await?;

        // Best-effort secondary credential; login succeeds without it.
        if let Err(e) = self.acquire_push_token(&mut state).await {
            warn!(error = %e, "push token acquisition failed (non-critical)");
        }

        // Push acquisition mutates the stored set; return that one so the
        // caller sees the push credential too.
        Ok(state.tokens.clone().unwrap_or(tokens))
    }

    /// Convenience: verify the code and complete in one call.
    pub async fn login(
        &self,
        phone: &str,
        code: &str,
        user_id: Option<i64>,
    ) -> Result<TokenSet, AuthError> {
        self.verify(phone, code).await?;
        self.complete(user_id).await
    }

    /// Refresh the access token when it is within 300 s of expiry.
    ///
    /// Returns `Ok(false)` when no refresh was needed. Subject to the same
    /// rate limiter as the login steps.
    pub async fn refresh_if_needed(&self) -> Result<bool, AuthError> {
        let mut state = self.state.lock().await;
        let Some(tokens) = state.tokens.clone() else {
            return Err(AuthError::NotAuthenticated);
        };

        let now = self.clock.now();
        if !tokens.expires_soon(now, Duration::seconds(REFRESH_THRESHOLD_SECS)) {
            debug!("token does not need refresh yet");
            return Ok(false);
        }

        self.check_rate_limit(&state)?;
        if tokens.authid.is_none() {
            return Err(AuthError::MissingContinuation);
        }

        info!("token expires soon, refreshing");
        self.issue_tokens(&mut state, tokens.user_id).await?;
        Ok(true)
    }

    /// Refresh the push token when it is within 7 days of expiry.
    pub async fn refresh_push_token_if_needed(&self) -> Result<bool, AuthError> {
        let mut state = self.state.lock().await;
        let Some(tokens) = &state.tokens else {
            return Err(AuthError::NotAuthenticated);
        };

        let now = self.clock.now();
        if !tokens.push_token_expires_soon(now, Duration::days(PUSH_REFRESH_THRESHOLD_DAYS)) {
            debug!("push token does not need refresh yet");
            return Ok(false);
        }

        info!("push token expires soon, refreshing");
        self.acquire_push_token(&mut state).await?;
        Ok(true)
    }

    /// Whether a current, unexpired token set exists.
    pub async fn is_authenticated(&self) -> bool {
        let state = self.state.lock().await;
        let now = self.clock.now();
        state.tokens.as_ref().is_some_and(|t| !t.is_expired(now))
    }

    /// Snapshot of the current token set.
    pub async fn tokens(&self) -> Option<TokenSet> {
        self.state.lock().await.tokens.clone()
    }

    /// Current access token, when authenticated.
    pub async fn access_token(&self) -> Option<String> {
        let state = self.state.lock().await;
        let now = self.clock.now();
        state
            .tokens
            .as_ref()
            .filter(|t| !t.is_expired(now))
            .map(|t| t.access_token.clone())
    }

    pub async fn stage(&self) -> SessionStage {
        self.state.lock().await.stage
    }

    /// Clear the session: in-memory tokens, the transport bearer and the
    /// persisted token record.
    pub async fn logout(&self) {
        let mut state = self.state.lock().await;
        state.tokens = None;
        state.auth_id = None;
        state.candidates.clear();
        state.pending_phone = None;
        state.stage = SessionStage::Unauthenticated;
        self.api.clear_bearer();
        if let Err(e) = self.token_store.delete().await {
            warn!(error = %e, "failed to delete persisted tokens");
        }
        info!("session cleared");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Call the token endpoint and install the result as the current set.
    async fn issue_tokens(
        &self,
        state: &mut AuthState,
        user_id: i64,
    ) -> Result<TokenSet, AuthError> {
        let auth_id = state
            .auth_id
            .clone()
            .ok_or(AuthError::MissingContinuation)?;

        let response = match self.api.issue_token(&auth_id, user_id).await {
            Ok(response) => response,
            Err(e) => {
                self.record_failure(state);
                return Err(AuthError::TokenRequest(e));
            }
        };

        let mut tokens = self.parse_token_response(&response, &auth_id)?;
        tokens.phone = state.pending_phone.clone();
        // Push credential validity is independent of the access token;
        // carry it across refreshes.
        if let Some(previous) = &state.tokens {
            tokens.push_token = previous.push_token.clone();
            tokens.push_expires_at = previous.push_expires_at;
        }

        self.api.set_bearer(&tokens.access_token);
        self.reset_failures(state);
        state.tokens = Some(tokens.clone());
        state.stage = SessionStage::Authenticated;

        if let Err(e) = self.token_store.save(&tokens).await {
            warn!(error = %e, "failed to persist tokens");
        }
        info!(expires_at = %tokens.expires_at, "access token obtained");
        Ok(tokens)
    }

    fn parse_token_response(
        &self,
        response: &Value,
        auth_id: &str,
    ) -> Result<TokenSet, AuthError> {
        let access_token = response
            .get("TOKEN")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::InvalidResponse("token response missing TOKEN".into()))?;
        let user_id = response
            .get("USER_ID")
            .and_then(Value::as_i64)
            .ok_or_else(|| AuthError::InvalidResponse("token response missing USER_ID".into()))?;
        let profile_id = response.get("PROFILE_ID").and_then(Value::as_i64).ok_or_else(|| {
            AuthError::InvalidResponse("token response missing PROFILE_ID".into())
        })?;

        let expires_at = response
            .get("ACCESS_END")
            .and_then(Value::as_str)
            .and_then(|raw| {
                NaiveDateTime::parse_from_str(raw, TOKEN_EXPIRY_FORMAT)
                    .map(|naive| naive.and_utc())
                    .ok()
            })
            .unwrap_or_else(|| {
                warn!("could not parse token expiry, defaulting to one year");
                self.clock.now() + Duration::days(FALLBACK_TOKEN_TTL_DAYS)
            });

        Ok(TokenSet {
            access_token: access_token.to_string(),
            user_id,
            profile_id,
            expires_at,
            authid: Some(auth_id.to_string()),
            push_token: None,
            push_expires_at: None,
            device_id: Some(self.api.device_id().to_string()),
            phone: None,
        })
    }

    /// Register a fresh push token with bounded retry (3 attempts, same
    /// backoff curve as the transport). Updates the token set and both
    /// durable records on success.
    async fn acquire_push_token(&self, state: &mut AuthState) -> Result<(), AuthError> {
        let Some(tokens) = state.tokens.clone() else {
            return Err(AuthError::NotAuthenticated);
        };

        let registration = PushRegistration {
            instance_id: Uuid::new_v4().to_string(),
            instance_token: Uuid::new_v4().to_string(),
            registered_at: self.clock.now(),
        };

        let mut delay = PUSH_RETRY_INITIAL_BACKOFF;
        let mut attempt = 1u32;
        loop {
            let result = self
                .api
                .register_push_token(
                    &registration.instance_token,
                    &tokens.access_token,
                    tokens.profile_id,
                    tokens.user_id,
                )
                .await;
            match result {
                Ok(()) => break,
                Err(e) if attempt < PUSH_RETRY_ATTEMPTS => {
                    warn!(
                        attempt,
                        max_attempts = PUSH_RETRY_ATTEMPTS,
                        error = %e,
                        "push token registration failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, PUSH_RETRY_MAX_BACKOFF);
                    attempt += 1;
                }
                Err(e) => return Err(AuthError::PushRegistration(e)),
            }
        }

        if let Some(tokens) = state.tokens.as_mut() {
            tokens.push_token = Some(registration.instance_token.clone());
            tokens.push_expires_at = Some(self.clock.now() + Duration::days(PUSH_TOKEN_TTL_DAYS));
            if let Err(e) = self.token_store.save(tokens).await {
                warn!(error = %e, "failed to persist tokens with push credential");
            }
        }
        if let Err(e) = self.push_store.save(&registration).await {
            warn!(error = %e, "failed to persist push registration");
        }
        info!("push token registered");
        Ok(())
    }

    fn check_rate_limit(&self, state: &AuthState) -> Result<(), AuthError> {
        if let Some(until) = state.lockout_until {
            let now = self.clock.now();
            if now < until {
                let millis = (until - now).num_milliseconds();
                // Ceiling so a sub-second remainder still reports 1.
                let retry_after = (millis + 999) / 1000;
                return Err(AuthError::RateLimited { retry_after });
            }
        }
        Ok(())
    }

    fn record_failure(&self, state: &mut AuthState) {
        state.failed_attempts += 1;
        warn!(
            attempts = state.failed_attempts,
            max = MAX_FAILED_ATTEMPTS,
            "failed authentication attempt"
        );
        if state.failed_attempts >= MAX_FAILED_ATTEMPTS {
            let until = self.clock.now() + Duration::seconds(LOCKOUT_SECS);
            state.lockout_until = Some(until);
            warn!(until = %until, "rate limit triggered");
        }
    }

    fn reset_failures(&self, state: &mut AuthState) {
        state.failed_attempts = 0;
        state.lockout_until = None;
    }
}

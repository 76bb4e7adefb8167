//! Token set and push-registration records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The process-wide authentication state. Exactly one token set is
/// "current" at a time; it is created on login, mutated in place on
/// refresh and cleared on logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub user_id: i64,
    pub profile_id: i64,
    pub expires_at: DateTime<Utc>,
    /// Opaque continuation id; required to refresh without re-entering a
    /// confirmation code.
    pub authid: Option<String>,
    /// Push-channel credential. Validity is tracked independently of the
    /// access token.
    pub push_token: Option<String>,
    pub push_expires_at: Option<DateTime<Utc>>,
    /// The per-install device identifier the token was issued against.
    pub device_id: Option<String>,
    /// Phone number, kept for push re-registration.
    pub phone: Option<String>,
}

impl TokenSet {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn expires_soon(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        now >= self.expires_at - threshold
    }

    pub fn push_token_expired(&self, now: DateTime<Utc>) -> bool {
        match (&self.push_token, self.push_expires_at) {
            (Some(_), Some(expires_at)) => now >= expires_at,
            _ => true,
        }
    }

    pub fn push_token_expires_soon(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        match (&self.push_token, self.push_expires_at) {
            (Some(_), Some(expires_at)) => now >= expires_at - threshold,
            _ => true,
        }
    }
}

/// Durable push-registration credential (the second of the two persisted
/// records).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRegistration {
    /// App-instance id reported to the push backend.
    pub instance_id: String,
    /// The registered push token itself.
    pub instance_token: String,
    pub registered_at: DateTime<Utc>,
}

//! Vendor API surface.
//!
//! [`IntercomApi`] is the seam between components and the wire: the session
//! manager, device control and camera directory all talk to this trait, so
//! tests can substitute a fake with zero network. [`ApiClient`] implements
//! it against the real endpoints.
//!
//! All defensive field-fallback parsing of the loosely-typed vendor
//! responses is isolated in [`adapt`]; everything downstream sees only the
//! typed [`Device`]/[`Camera`] models.

pub mod adapt;
mod endpoints;
mod types;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use serde_json::Value;

use crate::transport::TransportError;

pub use types::{AddressCandidate, Camera, Device, DeviceStatusKind};

/// Operations the vendor backend offers.
#[async_trait]
pub trait IntercomApi: Send + Sync {
    /// The pinned per-install device identifier.
    fn device_id(&self) -> &str;

    /// Attach a bearer token to subsequent requests.
    fn set_bearer(&self, token: &str);

    /// Drop the bearer token.
    fn clear_bearer(&self);

    /// Step 1 of phone auth: request an SMS confirmation code.
    async fn request_confirm_code(&self, phone: &str) -> Result<Value, TransportError>;

    /// Step 2: verify the SMS code; returns the continuation id and the
    /// candidate addresses.
    async fn check_confirm_code(
        &self,
        phone: &str,
        code: &str,
        auth_id: &str,
    ) -> Result<Value, TransportError>;

    /// Step 3: exchange the continuation id + selected user id for an
    /// access token. Also used for refresh.
    async fn issue_token(&self, auth_id: &str, user_id: i64) -> Result<Value, TransportError>;

    /// Enumerate intercom relays. `shared` selects the primary
    /// (`isShared=1`) or the fallback (`isShared=0`) set.
    async fn list_relays(&self, shared: bool) -> Result<Value, TransportError>;

    /// Fire the door-open relay command.
    async fn open_relay(&self, relay_id: i64) -> Result<Value, TransportError>;

    /// Enumerate cameras (grouped response shape).
    async fn list_cameras(&self) -> Result<Value, TransportError>;

    /// Register a push token with the vendor push backend.
    async fn register_push_token(
        &self,
        push_token: &str,
        access_token: &str,
        profile_id: i64,
        user_id: i64,
    ) -> Result<(), TransportError>;
}

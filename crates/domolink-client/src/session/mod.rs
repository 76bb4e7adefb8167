//! Phone-based session management.
//!
//! Drives the vendor's three-step SMS authentication flow, enforces the
//! failed-attempt rate limiter, refreshes tokens near expiry and keeps the
//! secondary push-token credential alive. All authentication calls are
//! serialized through one async mutex so the failure counter and lockout
//! deadline update atomically.

mod manager;
mod tokens;


pub use manager::{AuthError, SessionManager, SessionStage};
pub use tokens::{PushRegistration, TokenSet};

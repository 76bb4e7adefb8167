//! Domolink vendor API client.
//!
//! Talks to the cloud intercom backend:
//! - Retrying HTTP transport with sensitive-field masking and a pinned
//!   per-install device identifier
//! - Phone-based session management (SMS code flow, rate limiting,
//!   token refresh, push-token lifecycle)
//! - Typed device/camera models with defensive response adapters
//! - Camera enumeration and HLS stream URL resolution

pub mod api;
pub mod session;
pub mod streams;
pub mod transport;

pub use api::{AddressCandidate, Camera, Device, DeviceStatusKind, IntercomApi};
pub use session::{AuthError, SessionManager, TokenSet};
pub use streams::{CameraDirectory, StreamError};
pub use transport::{ApiClient, ClientConfig, TransportError};

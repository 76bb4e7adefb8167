//! Vendor REST transport.
//!
//! A reqwest-based client with bounded retry for network failures,
//! sensitive-field masking on every logged payload, and a pinned
//! per-install device identifier attached to each request.

mod client;
mod mask;


pub use client::{ApiClient, ClientConfig, Payload, TransportError};
pub use mask::mask_sensitive;

//! Domolink Core Library
//!
//! Shared functionality for Domolink components:
//! - Hub and auto-open configuration
//! - Durable credential store (JSON records under the config dir)
//! - Injectable wall clock for time-dependent logic
//! - Common error types

pub mod clock;
pub mod config;
pub mod error;
pub mod store;
pub mod tracing_init;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AutoOpenConfig, DayOfWeek, HubConfig, Schedule};
pub use error::{Error, Result};
pub use store::JsonStore;

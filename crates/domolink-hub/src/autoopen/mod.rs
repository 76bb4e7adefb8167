//! Auto-open decision engine.
//!
//! Decides whether an incoming intercom call should open the door, based
//! on the user's enabled flag and optional day/time schedules, and acts
//! on it best-effort.

mod decider;
mod manager;

#[cfg(test)]
mod tests;

pub use decider::should_open;
pub use manager::AutoOpenManager;

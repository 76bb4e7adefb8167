//! Bounded event history with broadcast fan-out.
//!
//! Every notable hub occurrence (door transitions, incoming calls,
//! auto-open actions, errors) lands here. The log keeps the most recent
//! 100 entries and pushes each new event to broadcast subscribers without
//! ever blocking on them.

mod log;


pub use log::{Event, EventKind, EventLog};

use chrono::{DateTime, Datelike, Utc};

use domolink_core::config::AutoOpenConfig;

/// Whether a call arriving at `at` should open the door.
///
/// Disabled wins outright. Enabled with no schedules means always open;
/// otherwise any schedule whose day set and inclusive time window match
/// activates it.
pub fn should_open(config: &AutoOpenConfig, at: DateTime<Utc>) -> bool {
    if !config.enabled {
        return false;
    }
    if config.schedules.is_empty() {
        return true;
    }
    let day = at.weekday();
    let time = at.time();
    config.schedules.iter().any(|s| s.contains(day, time))
}

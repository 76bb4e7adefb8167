//! Hub configuration.
//!
//! Two kinds of settings live here:
//! - [`HubConfig`]: process-level tunables (vendor base URL, timeouts,
//!   cache/monitor intervals) with built-in defaults.
//! - [`AutoOpenConfig`]: the user-facing auto-open switch plus optional
//!   day-of-week/time-of-day schedules. Held in process memory only; the
//!   hub exposes get/set and does not persist it durably.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Process-level hub configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Vendor API base URL.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Device/camera enumeration cache TTL in seconds.
    pub cache_ttl_secs: u64,
    /// Delay before a door reverts to "locked" after an open command.
    pub lock_reset_delay_secs: u64,
    /// Silence threshold before a device is considered offline.
    pub offline_timeout_secs: u64,
    /// Interval between offline-monitor checks.
    pub monitor_interval_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.is74.ru".to_string(),
            request_timeout_secs: 30,
            cache_ttl_secs: 30,
            lock_reset_delay_secs: 5,
            offline_timeout_secs: 30,
            monitor_interval_secs: 10,
        }
    }
}

impl HubConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn lock_reset_delay(&self) -> Duration {
        Duration::from_secs(self.lock_reset_delay_secs)
    }

    pub fn offline_timeout(&self) -> Duration {
        Duration::from_secs(self.offline_timeout_secs)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }
}

/// Directory for durable hub state (credentials), created on demand.
pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| Error::Config("Could not determine config directory".into()))?;
    Ok(base.join("domolink"))
}

/// Day of week for schedule configuration.
///
/// Serialized as lowercase English names, matching the host-facing JSON
/// shape (`"monday"` .. `"sunday"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
            Weekday::Sun => Self::Sunday,
        }
    }
}

/// One auto-open window: a set of days and an inclusive time-of-day range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub days: BTreeSet<DayOfWeek>,
    #[serde(with = "hhmm")]
    pub time_start: NaiveTime,
    #[serde(with = "hhmm")]
    pub time_end: NaiveTime,
}

impl Schedule {
    /// Whether `day`/`time` falls inside this window (bounds inclusive).
    pub fn contains(&self, day: Weekday, time: NaiveTime) -> bool {
        self.days.contains(&DayOfWeek::from(day))
            && self.time_start <= time
            && time <= self.time_end
    }
}

/// Auto-open configuration.
///
/// With `enabled` and no schedules, auto-open is always active; with
/// schedules, any matching window activates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoOpenConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
}

/// `HH:MM` (de)serialization for schedule bounds. Accepts `HH:MM:SS` on
/// input for leniency.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(time: &NaiveTime, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(de)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|_| de::Error::custom(format!("invalid time of day: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn default_hub_config_matches_vendor_contract() {
        let config = HubConfig::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(30));
        assert_eq!(config.lock_reset_delay(), Duration::from_secs(5));
        assert_eq!(config.offline_timeout(), Duration::from_secs(30));
        assert_eq!(config.monitor_interval(), Duration::from_secs(10));
    }

    #[test]
    fn schedule_contains_is_inclusive_on_both_bounds() {
        let schedule = Schedule {
            days: BTreeSet::from([DayOfWeek::Monday]),
            time_start: t(9, 0),
            time_end: t(18, 0),
        };
        assert!(schedule.contains(Weekday::Mon, t(9, 0)));
        assert!(schedule.contains(Weekday::Mon, t(18, 0)));
        assert!(!schedule.contains(Weekday::Mon, t(18, 1)));
        assert!(!schedule.contains(Weekday::Tue, t(12, 0)));
    }

    #[test]
    fn auto_open_config_round_trips_through_json() {
        let config = AutoOpenConfig {
            enabled: true,
            schedules: vec![Schedule {
                days: BTreeSet::from([DayOfWeek::Monday, DayOfWeek::Friday]),
                time_start: t(9, 30),
                time_end: t(18, 0),
            }],
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"monday\""));
        assert!(json.contains("\"09:30\""));

        let parsed: AutoOpenConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn schedule_times_accept_seconds_on_input() {
        let json = r#"{"days":["sunday"],"time_start":"08:00:00","time_end":"20:00:00"}"#;
        let schedule: Schedule = serde_json::from_str(json).unwrap();
        assert_eq!(schedule.time_start, t(8, 0));
        assert_eq!(schedule.time_end, t(20, 0));
    }

    #[test]
    fn empty_auto_open_config_deserializes_with_defaults() {
        let config: AutoOpenConfig = serde_json::from_str("{}").unwrap();
        assert!(!config.enabled);
        assert!(config.schedules.is_empty());
    }
}

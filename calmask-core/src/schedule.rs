//! Weekly availability schedule and candidate filtering.
//!
//! The schedule maps each weekday to zero or more `[start, end)`
//! local-time windows. A candidate passes only if its *start* time,
//! converted to the schedule's timezone, falls inside at least one
//! window on its local weekday. End times are deliberately not checked
//! against the window, and events crossing midnight are judged by the
//! weekday of their start alone.

use chrono::{Datelike, NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer};

use crate::event::SyncCandidate;

/// A single `[start, end)` local-time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TimeWindow {
    #[serde(deserialize_with = "de_local_time")]
    pub start: NaiveTime,
    #[serde(deserialize_with = "de_local_time")]
    pub end: NaiveTime,
}

impl TimeWindow {
    fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }
}

/// Weekly availability windows. A weekday with no windows rejects every
/// candidate on that day.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AvailabilitySchedule {
    pub monday: Vec<TimeWindow>,
    pub tuesday: Vec<TimeWindow>,
    pub wednesday: Vec<TimeWindow>,
    pub thursday: Vec<TimeWindow>,
    pub friday: Vec<TimeWindow>,
    pub saturday: Vec<TimeWindow>,
    pub sunday: Vec<TimeWindow>,
}

impl AvailabilitySchedule {
    pub fn windows_for(&self, weekday: Weekday) -> &[TimeWindow] {
        match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }

    /// Whether a candidate's local start time falls inside a window.
    pub fn allows(&self, candidate: &SyncCandidate, tz: Tz) -> bool {
        let local = candidate.start.with_timezone(&tz);
        let windows = self.windows_for(local.weekday());
        let time = local.time();
        windows.iter().any(|w| w.contains(time))
    }
}

/// Parse "HH:MM" (also accepts "HH:MM:SS") from config files.
fn de_local_time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(&s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
        .map_err(|_| serde::de::Error::custom(format!("invalid time of day: {s:?}")))
}

//! Source event types and identity derivation.
//!
//! A `SourceEvent` is one occurrence from the personal feed, already
//! converted into a typed value by the feed adapter. The core never
//! works with the parser's native shapes.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One occurrence from the personal calendar feed.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEvent {
    /// Identifier assigned by the source system. May repeat across
    /// recurring instances, or be absent/malformed in noisy feeds.
    pub uid: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: EventStatus,
}

/// Busy/free indicator for a source event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Busy,
    Free,
    Tentative,
    Cancelled,
}

/// A deduplicated, filtered source event ready for reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncCandidate {
    pub identity: Identity,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The stable key correlating a source event with its target event
/// across runs.
///
/// Derived from the source UID when present and well-formed, otherwise
/// from a fingerprint of `(start, end)` rounded down to a configured
/// precision. The fingerprint path handles feeds that omit or corrupt
/// UIDs: two exports of the same meeting with slightly jittered times
/// still collapse to one identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Derive the identity for an event.
    ///
    /// `rounding` is the fingerprint precision; timestamps are rounded
    /// down to a multiple of it before being formatted.
    pub fn derive(
        uid: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        rounding: Duration,
    ) -> Identity {
        if let Some(uid) = uid {
            let trimmed = uid.trim();
            if is_well_formed_uid(trimmed) {
                return Identity(format!("uid:{trimmed}"));
            }
        }

        let start = round_down(start, rounding);
        let end = round_down(end, rounding);
        Identity(format!(
            "fp:{}/{}",
            start.format("%Y%m%dT%H%M%SZ"),
            end.format("%Y%m%dT%H%M%SZ")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A UID is usable as an identity if it has visible content and no
/// control characters (some feeds emit literal newlines inside UIDs).
fn is_well_formed_uid(uid: &str) -> bool {
    !uid.is_empty() && !uid.chars().any(|c| c.is_control())
}

/// Round a timestamp down to a multiple of `step` (from the Unix epoch).
fn round_down(dt: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    let step_secs = step.num_seconds().max(1);
    let secs = dt.timestamp();
    let rounded = secs - secs.rem_euclid(step_secs);
    DateTime::from_timestamp(rounded, 0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 18, h, m, 0).unwrap()
    }

    #[test]
    fn test_identity_prefers_uid() {
        let id = Identity::derive(Some("abc-123@feed"), at(9, 0), at(10, 0), Duration::minutes(5));
        assert_eq!(id.as_str(), "uid:abc-123@feed");
    }

    #[test]
    fn test_identity_trims_uid_whitespace() {
        let a = Identity::derive(Some("  meeting-1 "), at(9, 0), at(10, 0), Duration::minutes(5));
        let b = Identity::derive(Some("meeting-1"), at(9, 0), at(10, 0), Duration::minutes(5));
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_uid_falls_back_to_fingerprint() {
        let id = Identity::derive(None, at(9, 0), at(10, 0), Duration::minutes(5));
        assert_eq!(id.as_str(), "fp:20250818T090000Z/20250818T100000Z");
    }

    #[test]
    fn test_malformed_uid_falls_back_to_fingerprint() {
        for bad in ["", "   ", "line\nbreak"] {
            let id = Identity::derive(Some(bad), at(9, 0), at(10, 0), Duration::minutes(5));
            assert!(id.as_str().starts_with("fp:"), "uid {bad:?} should be rejected");
        }
    }

    #[test]
    fn test_fingerprint_rounding_collapses_jitter() {
        let rounding = Duration::minutes(5);
        let a = Identity::derive(None, at(9, 0), at(10, 0), rounding);
        let b = Identity::derive(None, at(9, 2), at(10, 4), rounding);
        assert_eq!(a, b);

        // Outside the rounding bucket stays distinct
        let c = Identity::derive(None, at(9, 5), at(10, 0), rounding);
        assert_ne!(a, c);
    }
}

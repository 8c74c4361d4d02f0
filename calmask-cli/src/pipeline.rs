//! The per-run pipeline shared by `sync` and `status`.
//!
//! fetch → normalize → availability filter → sync window → reconcile.
//! The state store is loaded first so a corrupt store fails the run
//! before anything is fetched or mutated.

use anyhow::Result;
use calmask_core::{
    AvailabilitySchedule, FeedSource, NormalizeOptions, Operation, StateStore, SyncCandidate,
    TrackedMapping, normalize, plan,
};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::config::{self, Config};
use crate::feed::IcsFeed;

pub struct PlanOutcome {
    pub operations: Vec<Operation>,
    pub store: StateStore,
    /// Candidates that entered reconciliation
    pub candidates: usize,
    /// Events dropped before reconciliation: malformed, outside the
    /// sync window, or outside the availability schedule
    pub skipped: usize,
}

pub async fn compute_plan(cfg: &Config) -> Result<PlanOutcome> {
    let store = StateStore::load(config::state_path()?)?;

    let feed = IcsFeed::new(cfg.feed_url.clone());
    let snapshot = feed.fetch().await?;

    let options = NormalizeOptions {
        fingerprint_rounding: Duration::minutes(cfg.fingerprint_rounding_minutes.max(1)),
    };
    let normalized = normalize(&snapshot.events, &options);

    let now = Utc::now();
    let window_end = now + Duration::days(cfg.sync_days);
    let (eligible, dropped) = select_candidates(
        normalized.candidates,
        &cfg.availability,
        cfg.timezone,
        now,
        window_end,
    );

    let mappings = mappings_in_window(&store, now, window_end);
    let operations = plan(&eligible, &mappings);

    Ok(PlanOutcome {
        operations,
        store,
        candidates: eligible.len(),
        skipped: snapshot.skipped + normalized.skipped + dropped,
    })
}

/// Keep candidates that start inside the sync window and pass the
/// availability schedule; return the kept set and the dropped count.
fn select_candidates(
    candidates: Vec<SyncCandidate>,
    availability: &AvailabilitySchedule,
    tz: Tz,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> (Vec<SyncCandidate>, usize) {
    let total = candidates.len();
    let kept: Vec<SyncCandidate> = candidates
        .into_iter()
        .filter(|c| c.start >= window_start && c.start < window_end)
        .filter(|c| availability.allows(c, tz))
        .collect();
    let dropped = total - kept.len();
    (kept, dropped)
}

/// Mappings whose events start inside the sync window. Rows outside it
/// (already-past events, far-future leftovers) are left untouched in
/// the store rather than deleted as orphans.
fn mappings_in_window(
    store: &StateStore,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<TrackedMapping> {
    store
        .all()
        .filter(|m| m.start >= window_start && m.start < window_end)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use calmask_core::Identity;
    use chrono::TimeZone;

    fn candidate(uid: &str, start: DateTime<Utc>) -> SyncCandidate {
        SyncCandidate {
            identity: Identity::derive(Some(uid), start, start + Duration::hours(1), Duration::minutes(5)),
            start,
            end: start + Duration::hours(1),
        }
    }

    fn open_schedule() -> AvailabilitySchedule {
        toml::from_str(
            r#"
            monday = [{ start = "00:00", end = "23:59" }]
            tuesday = [{ start = "00:00", end = "23:59" }]
            wednesday = [{ start = "00:00", end = "23:59" }]
            thursday = [{ start = "00:00", end = "23:59" }]
            friday = [{ start = "00:00", end = "23:59" }]
            saturday = [{ start = "00:00", end = "23:59" }]
            sunday = [{ start = "00:00", end = "23:59" }]
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_window_drops_past_and_far_future_candidates() {
        let now = Utc.with_ymd_and_hms(2025, 8, 18, 12, 0, 0).unwrap();
        let window_end = now + Duration::days(30);

        let candidates = vec![
            candidate("past", now - Duration::days(1)),
            candidate("soon", now + Duration::days(1)),
            candidate("far", now + Duration::days(45)),
        ];

        let (kept, dropped) =
            select_candidates(candidates, &open_schedule(), Tz::UTC, now, window_end);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].identity.as_str(), "uid:soon");
        assert_eq!(dropped, 2);
    }

    #[test]
    fn test_availability_filter_applies_inside_window() {
        let now = Utc.with_ymd_and_hms(2025, 8, 18, 6, 0, 0).unwrap();
        let window_end = now + Duration::days(30);
        let schedule: AvailabilitySchedule =
            toml::from_str(r#"tuesday = [{ start = "09:00", end = "17:00" }]"#).unwrap();

        let candidates = vec![
            // Tuesday 2025-08-19 10:00 UTC: allowed
            candidate("ok", Utc.with_ymd_and_hms(2025, 8, 19, 10, 0, 0).unwrap()),
            // Wednesday: no windows configured
            candidate("wed", Utc.with_ymd_and_hms(2025, 8, 20, 10, 0, 0).unwrap()),
        ];

        let (kept, dropped) = select_candidates(candidates, &schedule, Tz::UTC, now, window_end);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].identity.as_str(), "uid:ok");
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_out_of_window_mappings_are_not_orphaned() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = StateStore::load(dir.path().join("state.json")).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 8, 18, 12, 0, 0).unwrap();

        let past = now - Duration::days(2);
        let soon = now + Duration::days(2);
        for (uid, start) in [("past", past), ("soon", soon)] {
            store.put(TrackedMapping {
                identity: Identity::derive(Some(uid), start, start, Duration::minutes(5)),
                target_event_id: uid.to_string(),
                start,
                end: start + Duration::hours(1),
                last_synced_at: now,
            });
        }

        let windowed = mappings_in_window(&store, now, now + Duration::days(30));
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed[0].target_event_id, "soon");

        // An empty candidate set only deletes the in-window mapping
        let ops = plan(&[], &windowed);
        assert_eq!(ops.len(), 1);
    }
}

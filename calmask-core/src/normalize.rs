//! Event normalization: busy filtering and deterministic deduplication.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::Duration;

use crate::event::{EventStatus, Identity, SourceEvent, SyncCandidate};

/// Options for the normalizer.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Precision for fingerprint identities of events without a usable UID.
    pub fingerprint_rounding: Duration,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        NormalizeOptions {
            fingerprint_rounding: Duration::minutes(5),
        }
    }
}

/// Result of normalizing a raw feed snapshot.
#[derive(Debug)]
pub struct NormalizeOutcome {
    /// Candidates with unique identities, ordered by identity.
    pub candidates: Vec<SyncCandidate>,
    /// Events dropped as malformed (end not after start).
    pub skipped: usize,
}

/// Convert raw source events into a deduplicated set of sync candidates.
///
/// Only busy events become candidates. When several events share an
/// identity, the representative is the one with the earliest start;
/// on a further tie, the one earliest in the input. The outcome is
/// independent of input ordering jitter.
pub fn normalize(events: &[SourceEvent], options: &NormalizeOptions) -> NormalizeOutcome {
    let mut skipped = 0;
    // identity -> (start, input position, candidate)
    let mut by_identity: BTreeMap<Identity, (usize, SyncCandidate)> = BTreeMap::new();

    for (position, event) in events.iter().enumerate() {
        if event.status != EventStatus::Busy {
            continue;
        }
        if event.end <= event.start {
            skipped += 1;
            continue;
        }

        let identity = Identity::derive(
            event.uid.as_deref(),
            event.start,
            event.end,
            options.fingerprint_rounding,
        );
        let candidate = SyncCandidate {
            identity: identity.clone(),
            start: event.start,
            end: event.end,
        };

        match by_identity.entry(identity) {
            Entry::Occupied(mut slot) => {
                // Earliest start wins; on equal starts the earliest
                // input position wins, so the result is stable under
                // input ordering jitter.
                let (held_position, held) = slot.get();
                let replace = candidate.start < held.start
                    || (candidate.start == held.start && position < *held_position);
                if replace {
                    slot.insert((position, candidate));
                }
            }
            Entry::Vacant(slot) => {
                slot.insert((position, candidate));
            }
        }
    }

    NormalizeOutcome {
        candidates: by_identity.into_values().map(|(_, c)| c).collect(),
        skipped,
    }
}

//! The reconciliation engine: diff desired state against last-applied state.
//!
//! Desired state is the filtered candidate set from the current feed
//! snapshot; last-applied state is the tracked mappings. The target
//! calendar itself is never re-read: the store is trusted as its proxy,
//! which is what makes repeated unattended runs idempotent and cheap.

use std::collections::BTreeMap;

use crate::event::{Identity, SyncCandidate};
use crate::state::TrackedMapping;

/// One remote mutation to perform, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Create(SyncCandidate),
    Update(TrackedMapping, SyncCandidate),
    Delete(TrackedMapping),
}

impl Operation {
    pub fn identity(&self) -> &Identity {
        match self {
            Operation::Create(candidate) => &candidate.identity,
            Operation::Update(_, candidate) => &candidate.identity,
            Operation::Delete(mapping) => &mapping.identity,
        }
    }
}

/// Compute the ordered operation list for one run.
///
/// Decision rule per identity:
/// - candidate only → Create
/// - both, times differ → Update
/// - both, times equal → nothing (already in sync)
/// - mapping only → Delete
///
/// Deletes come first so that a removed source event replaced by an
/// unrelated new one in the same slot cannot transiently double-book
/// the target calendar. Within each group, output is ordered by
/// identity, so the same inputs always produce the same list.
pub fn plan(candidates: &[SyncCandidate], mappings: &[TrackedMapping]) -> Vec<Operation> {
    let desired: BTreeMap<&Identity, &SyncCandidate> =
        candidates.iter().map(|c| (&c.identity, c)).collect();
    let applied: BTreeMap<&Identity, &TrackedMapping> =
        mappings.iter().map(|m| (&m.identity, m)).collect();

    let mut operations = Vec::new();

    for (identity, mapping) in &applied {
        if !desired.contains_key(*identity) {
            operations.push(Operation::Delete((*mapping).clone()));
        }
    }

    for (identity, candidate) in &desired {
        match applied.get(*identity) {
            None => operations.push(Operation::Create((*candidate).clone())),
            Some(mapping) => {
                if mapping.start != candidate.start || mapping.end != candidate.end {
                    operations.push(Operation::Update((*mapping).clone(), (*candidate).clone()));
                }
            }
        }
    }

    operations
}

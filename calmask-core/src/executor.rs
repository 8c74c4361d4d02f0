//! Applies an operation list against the target calendar.
//!
//! Each operation is attempted independently; a failing event never
//! aborts the batch. The state store is mutated only after a confirmed
//! remote success and persisted exactly once at the end, so a run
//! interrupted mid-batch leaves a store the next run's reconciliation
//! will correct on its own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{CalMaskResult, RemoteError};
use crate::event::Identity;
use crate::reconcile::Operation;
use crate::state::{StateStore, TrackedMapping};

/// The content-free payload written to the target calendar: a time
/// range and the identity marker, nothing from the source event.
#[derive(Debug, Clone, PartialEq)]
pub struct BusyBlock {
    pub identity: Identity,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The target calendar service.
///
/// Implementations own their transport, auth headers, and timeout
/// policy; the executor only cares about success or a classified
/// [`RemoteError`].
#[async_trait]
pub trait CalendarClient {
    /// Create a busy block, returning the target-assigned event id.
    async fn create_event(&self, block: &BusyBlock) -> Result<String, RemoteError>;

    /// Move an existing busy block to a new time range.
    async fn update_event(&self, target_event_id: &str, block: &BusyBlock)
    -> Result<(), RemoteError>;

    /// Delete a busy block previously created by this tool.
    async fn delete_event(&self, target_event_id: &str) -> Result<(), RemoteError>;
}

/// A single operation that failed during execution.
#[derive(Debug, Clone)]
pub struct SyncFailure {
    pub identity: Identity,
    pub action: &'static str,
    pub error: RemoteError,
}

/// Counts reported at the end of every run.
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failures: Vec<SyncFailure>,
}

impl SyncSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

fn block_for(identity: &Identity, start: DateTime<Utc>, end: DateTime<Utc>) -> BusyBlock {
    BusyBlock {
        identity: identity.clone(),
        start,
        end,
    }
}

/// Apply the operation list, then persist the store.
///
/// Only the store save is fatal; remote failures are collected into the
/// summary and the corresponding mappings are left untouched so the
/// next run retries them via re-diff.
pub async fn apply<C: CalendarClient + Sync>(
    operations: Vec<Operation>,
    client: &C,
    store: &mut StateStore,
) -> CalMaskResult<SyncSummary> {
    let mut summary = SyncSummary::default();

    for operation in operations {
        match operation {
            Operation::Create(candidate) => {
                let block = block_for(&candidate.identity, candidate.start, candidate.end);
                match client.create_event(&block).await {
                    Ok(target_event_id) => {
                        store.put(TrackedMapping {
                            identity: candidate.identity,
                            target_event_id,
                            start: candidate.start,
                            end: candidate.end,
                            last_synced_at: Utc::now(),
                        });
                        summary.created += 1;
                    }
                    Err(error) => summary.failures.push(SyncFailure {
                        identity: candidate.identity,
                        action: "create",
                        error,
                    }),
                }
            }
            Operation::Update(mapping, candidate) => {
                let block = block_for(&candidate.identity, candidate.start, candidate.end);
                match client.update_event(&mapping.target_event_id, &block).await {
                    Ok(()) => {
                        store.put(TrackedMapping {
                            identity: candidate.identity,
                            target_event_id: mapping.target_event_id,
                            start: candidate.start,
                            end: candidate.end,
                            last_synced_at: Utc::now(),
                        });
                        summary.updated += 1;
                    }
                    Err(error) => summary.failures.push(SyncFailure {
                        identity: candidate.identity,
                        action: "update",
                        error,
                    }),
                }
            }
            Operation::Delete(mapping) => {
                match client.delete_event(&mapping.target_event_id).await {
                    Ok(()) => {
                        store.remove(&mapping.identity);
                        summary.deleted += 1;
                    }
                    Err(error) => summary.failures.push(SyncFailure {
                        identity: mapping.identity,
                        action: "delete",
                        error,
                    }),
                }
            }
        }
    }

    store.save()?;

    Ok(summary)
}

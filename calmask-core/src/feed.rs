//! The feed source seam.
//!
//! Fetching and parsing the personal calendar feed lives outside the
//! core; implementations hand the run a typed snapshot and nothing
//! else. A fetch failure is fatal for the run (there is nothing to
//! reconcile against) but non-corrupting: no state is mutated.

use async_trait::async_trait;

use crate::error::CalMaskResult;
use crate::event::SourceEvent;

/// One download of the personal feed.
#[derive(Debug, Default)]
pub struct FeedSnapshot {
    pub events: Vec<SourceEvent>,
    /// Entries dropped at the boundary (unparseable timestamps,
    /// unsupported shapes). Recorded, never fatal.
    pub skipped: usize,
}

/// A source of personal calendar events.
#[async_trait]
pub trait FeedSource {
    /// Fetch the current snapshot, or `FeedUnavailable` on network or
    /// calendar-format failure.
    async fn fetch(&self) -> CalMaskResult<FeedSnapshot>;
}

//! Core types and reconciliation engine for calmask.
//!
//! calmask mirrors a personal calendar feed into a work calendar as
//! content-free busy blocks. This crate holds everything that does not
//! touch the network: the event model, the normalizer, the availability
//! filter, the state store, the reconciliation engine, and the executor
//! that drives a [`CalendarClient`] implementation.

pub mod error;
pub mod event;
pub mod executor;
pub mod feed;
pub mod normalize;
pub mod reconcile;
pub mod schedule;
pub mod state;

pub use error::{CalMaskError, CalMaskResult, RemoteError, RemoteErrorKind};
pub use event::{EventStatus, Identity, SourceEvent, SyncCandidate};
pub use executor::{BusyBlock, CalendarClient, SyncFailure, SyncSummary, apply};
pub use feed::{FeedSnapshot, FeedSource};
pub use normalize::{NormalizeOptions, NormalizeOutcome, normalize};
pub use reconcile::{Operation, plan};
pub use schedule::{AvailabilitySchedule, TimeWindow};
pub use state::{StateStore, TrackedMapping};

//! Error types for calmask.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during a sync run.
#[derive(Error, Debug)]
pub enum CalMaskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Calendar feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("Authentication required. Run `calmask auth` to sign in.")]
    AuthRequired,

    #[error("Authentication expired: {0}. Run `calmask auth` to sign in again.")]
    AuthExpired(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("State store at {path} is corrupt: {reason}")]
    StateCorrupt { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for calmask operations.
pub type CalMaskResult<T> = Result<T, CalMaskError>;

/// A failure reported by the target calendar service.
///
/// Transient failures (throttling, server errors, network hiccups) are
/// retried naturally on the next run because the state store is only
/// updated after a confirmed success. Permanent failures keep retrying
/// on every run until the source data changes; they are recorded rather
/// than silently swallowed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    Transient,
    Permanent,
}

impl RemoteError {
    pub fn transient(message: impl Into<String>) -> Self {
        RemoteError {
            kind: RemoteErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        RemoteError {
            kind: RemoteErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == RemoteErrorKind::Transient
    }
}

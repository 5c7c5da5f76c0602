//! Core Error Types
//!
//! Degraded translations and failed background jobs are deliberately absent:
//! they are reported through [`FieldOutcome`](crate::translate::FieldOutcome)
//! and [`DispatchStats`](crate::dispatch::DispatchStats) instead of failing
//! the operation that triggered them.

use derive_more::{Display, Error};

/// A core error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The resource does not exist (or the delete affected nothing).
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The resource exists but belongs to someone else.
    #[display("permission denied: {_0}")]
    PermissionDenied(#[error(not(source))] String),
    /// Malformed caller input: cursors, numeric ids, page sizes.
    #[display("invalid input: {_0}")]
    Validation(#[error(not(source))] String),
    #[display("store error")]
    Store,
    #[display("blob storage error")]
    Storage,
    #[display("translation error")]
    Translation,
    /// The background dispatcher has shut down.
    #[display("dispatcher unavailable")]
    Dispatch,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store | Self::Storage | Self::Translation)
    }
}

/// Parse a numeric identifier that arrived as a string.
pub fn parse_id(raw: &str, what: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| exn::Exn::from(ErrorKind::Validation(format!("{what} id `{raw}` is not a positive integer"))))
}

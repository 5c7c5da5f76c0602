//! Store Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. The underlying `sqlx` error is always kept as the
//! source so the full cause survives up to the service layer.

use derive_more::{Display, Error};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A uniqueness or foreign key constraint rejected the write.
    #[display("constraint violation")]
    Constraint,
    /// A stored value could not be converted into its domain type.
    #[display("invalid stored data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// SQLite reports lock contention as a generic database error, so that is
    /// the only category worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }
}

/// Wrap a failed write, separating constraint violations from everything
/// else while keeping the `sqlx` error as a child in the error tree.
#[track_caller]
pub(crate) fn write_error(err: sqlx::Error) -> Error {
    let kind = classify(&err);
    exn::Exn::from(err).raise(kind)
}

fn classify(err: &sqlx::Error) -> ErrorKind {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() || db.is_foreign_key_violation() => ErrorKind::Constraint,
        _ => ErrorKind::Database,
    }
}

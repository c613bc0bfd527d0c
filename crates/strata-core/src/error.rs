//! Error types for strata operations.

use thiserror::Error;

/// Result type alias for strata operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while consolidating and persisting day snapshots.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// Snapshot payload could not be encoded or decoded.
    #[error("snapshot codec error: {message}")]
    Snapshot {
        /// Description of the codec failure.
        message: String,
    },

    /// A day's merge could not complete.
    ///
    /// The prior snapshot file for the day is left untouched.
    #[error("merge failed for day {day}: {message}")]
    Merge {
        /// Calendar day (`YYYY-MM-DD`) whose merge failed.
        day: String,
        /// Description of the underlying failure.
        message: String,
    },
}

// ── Core error types ──
//
// Errors raised inside one synchronization cycle. None of them ever
// escapes a cycle: the synchronizer logs them per station and folds the
// outcome into the connectivity flag.

use thiserror::Error;

/// Failures reported by a [`StateTree`](crate::store::StateTree) backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing store cannot be reached or refused the operation.
    #[error("state store unavailable: {reason}")]
    Unavailable { reason: String },

    /// A value was written to a node that was never created.
    #[error("node {path} does not exist")]
    NotFound { path: String },
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No active station is configured; the cycle still publishes
    /// `info.connection = false`.
    #[error("no active stations configured")]
    ConfigAbsent,

    /// Fetching one station's status failed.
    #[error("failed to fetch station {station_id}: {source}")]
    Fetch {
        station_id: String,
        #[source]
        source: chargepoint_api::Error,
    },

    /// Creating or writing a node in the state tree failed.
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// A fetch failure the next cycle may well recover from.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch { source, .. } if source.is_transient())
    }
}

use thiserror::Error;

use crate::Timestamp;

/// Data-integrity faults that abort a reconcile run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Negative session duration for user '{user_id}': close at {closed_at} precedes open at {opened_at}")]
    NegativeDuration {
        user_id: String,
        opened_at: Timestamp,
        closed_at: Timestamp,
    },

    #[error("Session duration for user '{user_id}' from {opened_at} to {closed_at} overflows")]
    DurationOverflow {
        user_id: String,
        opened_at: Timestamp,
        closed_at: Timestamp,
    },

    #[error("Out-of-order event for user '{user_id}': {timestamp} follows {previous}")]
    OutOfOrder {
        user_id: String,
        previous: Timestamp,
        timestamp: Timestamp,
    },
}

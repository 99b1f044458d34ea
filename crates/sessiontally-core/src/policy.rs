use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ReconcileError, Session, StrayEvent, StrayReason, Timestamp};

/// How an `open` is resolved when the user already has an open slot.
///
/// Has no `Default`; every run names its policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// The earlier open becomes a stray and the new open takes the slot
    KeepLatestOpen,
    /// The new open becomes a stray and the earlier open keeps the slot
    KeepEarliestOpen,
    /// The new open closes the earlier one, then takes the slot itself
    CloseOnReopen,
}

/// What a conflict resolution leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Open timestamp that occupies the slot afterwards
    pub slot: Timestamp,
    pub stray: Option<StrayEvent>,
    pub session: Option<Session>,
}

impl ConflictPolicy {
    pub const ALL: [ConflictPolicy; 3] = [
        ConflictPolicy::KeepLatestOpen,
        ConflictPolicy::KeepEarliestOpen,
        ConflictPolicy::CloseOnReopen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::KeepLatestOpen => "keep-latest-open",
            ConflictPolicy::KeepEarliestOpen => "keep-earliest-open",
            ConflictPolicy::CloseOnReopen => "close-on-reopen",
        }
    }

    /// Resolve an `open` at `incoming` against the occupied slot at `existing`.
    pub fn resolve(
        &self,
        user_id: &str,
        existing: Timestamp,
        incoming: Timestamp,
    ) -> Result<Resolution, ReconcileError> {
        debug!(
            user_id,
            %existing,
            %incoming,
            policy = self.as_str(),
            "Resolving conflicting open"
        );

        match self {
            ConflictPolicy::KeepLatestOpen => Ok(keep_latest(user_id, existing, incoming)),
            ConflictPolicy::KeepEarliestOpen => Ok(keep_earliest(user_id, existing, incoming)),
            ConflictPolicy::CloseOnReopen => close_on_reopen(user_id, existing, incoming),
        }
    }
}

fn keep_latest(user_id: &str, existing: Timestamp, incoming: Timestamp) -> Resolution {
    Resolution {
        slot: incoming,
        stray: Some(StrayEvent::open(user_id, existing, StrayReason::SupersededOpen)),
        session: None,
    }
}

fn keep_earliest(user_id: &str, existing: Timestamp, incoming: Timestamp) -> Resolution {
    Resolution {
        slot: existing,
        stray: Some(StrayEvent::open(user_id, incoming, StrayReason::RejectedOpen)),
        session: None,
    }
}

fn close_on_reopen(
    user_id: &str,
    existing: Timestamp,
    incoming: Timestamp,
) -> Result<Resolution, ReconcileError> {
    let session = Session::between(user_id, existing, incoming)?;
    Ok(Resolution {
        slot: incoming,
        stray: None,
        session: Some(session),
    })
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep-latest-open" => Ok(ConflictPolicy::KeepLatestOpen),
            "keep-earliest-open" => Ok(ConflictPolicy::KeepEarliestOpen),
            "close-on-reopen" => Ok(ConflictPolicy::CloseOnReopen),
            _ => Err(format!("Unknown conflict policy: {}", s)),
        }
    }
}

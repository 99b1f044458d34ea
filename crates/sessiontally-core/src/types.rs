use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ReconcileError;

/// An instant in whole epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub fn as_secs(self) -> i64 {
        self.0
    }
}

impl From<i64> for Timestamp {
    fn from(secs: i64) -> Self {
        Self(secs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The action recorded by a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Open,
    Close,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Open => "open",
            Action::Close => "close",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A single decoded log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub user_id: String,
    pub timestamp: Timestamp,
    pub action: Action,
}

impl Event {
    pub fn new(user_id: impl Into<String>, secs: i64, action: Action) -> Self {
        Self {
            user_id: user_id.into(),
            timestamp: Timestamp(secs),
            action,
        }
    }

    pub fn open(user_id: impl Into<String>, secs: i64) -> Self {
        Self::new(user_id, secs, Action::Open)
    }

    pub fn close(user_id: impl Into<String>, secs: i64) -> Self {
        Self::new(user_id, secs, Action::Close)
    }
}

/// An open that was still unmatched when a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOpen {
    pub user_id: String,
    pub opened_at: Timestamp,
}

/// A completed open/close pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub opened_at: Timestamp,
    pub closed_at: Timestamp,
    pub duration_secs: i64,
}

impl Session {
    /// Build a session, rejecting a close that precedes its open.
    /// A zero-length session is valid.
    pub fn between(
        user_id: impl Into<String>,
        opened_at: Timestamp,
        closed_at: Timestamp,
    ) -> Result<Self, ReconcileError> {
        let user_id = user_id.into();
        if closed_at < opened_at {
            return Err(ReconcileError::NegativeDuration {
                user_id,
                opened_at,
                closed_at,
            });
        }

        let Some(duration_secs) = closed_at.0.checked_sub(opened_at.0) else {
            return Err(ReconcileError::DurationOverflow {
                user_id,
                opened_at,
                closed_at,
            });
        };

        Ok(Self {
            user_id,
            opened_at,
            closed_at,
            duration_secs,
        })
    }
}

/// Why an event could not be paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrayReason {
    /// A close with no open in the slot
    UnmatchedClose,
    /// An earlier open replaced by a newer one
    SupersededOpen,
    /// A newer open refused because one was already pending
    RejectedOpen,
}

impl fmt::Display for StrayReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrayReason::UnmatchedClose => "unmatched close",
            StrayReason::SupersededOpen => "superseded open",
            StrayReason::RejectedOpen => "rejected open",
        };
        f.write_str(s)
    }
}

/// An event that was not consumed into any session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrayEvent {
    pub user_id: String,
    pub timestamp: Timestamp,
    pub action: Action,
    pub reason: StrayReason,
}

impl StrayEvent {
    pub fn unmatched_close(user_id: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            user_id: user_id.into(),
            timestamp,
            action: Action::Close,
            reason: StrayReason::UnmatchedClose,
        }
    }

    pub fn open(user_id: impl Into<String>, timestamp: Timestamp, reason: StrayReason) -> Self {
        Self {
            user_id: user_id.into(),
            timestamp,
            action: Action::Open,
            reason,
        }
    }
}

/// Pending opens that bridge two successive runs, at most one per user.
///
/// Ordered by user id so that persisted files are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CarryOver {
    pending: BTreeMap<String, Timestamp>,
}

impl CarryOver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pending open. Returns the previous open for that user, if any.
    pub fn insert(&mut self, user_id: impl Into<String>, opened_at: Timestamp) -> Option<Timestamp> {
        self.pending.insert(user_id.into(), opened_at)
    }

    /// Consume the pending open for a user.
    pub fn take(&mut self, user_id: &str) -> Option<Timestamp> {
        self.pending.remove(user_id)
    }

    pub fn get(&self, user_id: &str) -> Option<Timestamp> {
        self.pending.get(user_id).copied()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.pending.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PendingOpen> + '_ {
        self.pending.iter().map(|(user_id, opened_at)| PendingOpen {
            user_id: user_id.clone(),
            opened_at: *opened_at,
        })
    }
}

impl FromIterator<PendingOpen> for CarryOver {
    fn from_iter<I: IntoIterator<Item = PendingOpen>>(iter: I) -> Self {
        let pending = iter
            .into_iter()
            .map(|p| (p.user_id, p.opened_at))
            .collect();
        Self { pending }
    }
}

impl IntoIterator for CarryOver {
    type Item = PendingOpen;
    type IntoIter = std::iter::Map<
        std::collections::btree_map::IntoIter<String, Timestamp>,
        fn((String, Timestamp)) -> PendingOpen,
    >;

    fn into_iter(self) -> Self::IntoIter {
        fn to_pending((user_id, opened_at): (String, Timestamp)) -> PendingOpen {
            PendingOpen { user_id, opened_at }
        }
        self.pending
            .into_iter()
            .map(to_pending as fn((String, Timestamp)) -> PendingOpen)
    }
}

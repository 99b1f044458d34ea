use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{Action, CarryOver, ConflictPolicy, Event, ReconcileError, Session, StrayEvent, Timestamp};

/// Everything one reconcile run produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub sessions: Vec<Session>,
    /// Opens still unmatched at the end of the run, to seed the next one
    pub carry_over: CarryOver,
    pub strays: Vec<StrayEvent>,
}

/// Pair one run's events against the opens carried over from the previous run.
///
/// Events for the same user must arrive in non-decreasing timestamp order;
/// interleaving across users does not matter since every user owns an
/// independent slot. The slot map starts as `carry_over` and is returned as
/// the outcome's carry-over, so a user with no events in this run keeps
/// their pending open untouched.
///
/// Fails on the first data-integrity fault: a timestamp going backwards for
/// one user, counting a carried open as that user's first timestamp, or a
/// duration that does not fit in an `i64`. No partial outcome is returned.
pub fn reconcile<I>(
    carry_over: CarryOver,
    events: I,
    policy: ConflictPolicy,
) -> Result<ReconcileOutcome, ReconcileError>
where
    I: IntoIterator<Item = Event>,
{
    let mut reconciler = Reconciler::new(carry_over, policy);
    for event in events {
        reconciler.apply(event)?;
    }
    Ok(reconciler.finish())
}

struct Reconciler {
    policy: ConflictPolicy,
    slots: CarryOver,
    last_seen: HashMap<String, Timestamp>,
    sessions: Vec<Session>,
    strays: Vec<StrayEvent>,
}

impl Reconciler {
    fn new(carry_over: CarryOver, policy: ConflictPolicy) -> Self {
        debug!(
            pending = carry_over.len(),
            policy = policy.as_str(),
            "Starting reconcile run"
        );
        // A carried open is the first point on its user's timeline.
        let last_seen = carry_over
            .iter()
            .map(|pending| (pending.user_id, pending.opened_at))
            .collect();
        Self {
            policy,
            slots: carry_over,
            last_seen,
            sessions: Vec::new(),
            strays: Vec::new(),
        }
    }

    fn apply(&mut self, event: Event) -> Result<(), ReconcileError> {
        trace!(user_id = %event.user_id, timestamp = %event.timestamp, action = %event.action, "Applying event");
        self.check_order(&event)?;

        match event.action {
            Action::Open => self.open(event.user_id, event.timestamp),
            Action::Close => self.close(event.user_id, event.timestamp),
        }
    }

    fn check_order(&mut self, event: &Event) -> Result<(), ReconcileError> {
        if let Some(previous) = self.last_seen.get(&event.user_id).copied() {
            if event.timestamp < previous {
                return Err(ReconcileError::OutOfOrder {
                    user_id: event.user_id.clone(),
                    previous,
                    timestamp: event.timestamp,
                });
            }
        }
        self.last_seen.insert(event.user_id.clone(), event.timestamp);
        Ok(())
    }

    fn open(&mut self, user_id: String, timestamp: Timestamp) -> Result<(), ReconcileError> {
        let Some(existing) = self.slots.get(&user_id) else {
            self.slots.insert(user_id, timestamp);
            return Ok(());
        };

        let resolution = self.policy.resolve(&user_id, existing, timestamp)?;
        if let Some(session) = resolution.session {
            self.sessions.push(session);
        }
        if let Some(stray) = resolution.stray {
            debug!(user_id = %stray.user_id, timestamp = %stray.timestamp, reason = %stray.reason, "Stray open");
            self.strays.push(stray);
        }
        self.slots.insert(user_id, resolution.slot);
        Ok(())
    }

    fn close(&mut self, user_id: String, timestamp: Timestamp) -> Result<(), ReconcileError> {
        match self.slots.take(&user_id) {
            Some(opened_at) => {
                let session = Session::between(user_id, opened_at, timestamp)?;
                self.sessions.push(session);
            }
            None => {
                debug!(user_id = %user_id, %timestamp, "Close without a matching open");
                self.strays.push(StrayEvent::unmatched_close(user_id, timestamp));
            }
        }
        Ok(())
    }

    fn finish(self) -> ReconcileOutcome {
        debug!(
            sessions = self.sessions.len(),
            strays = self.strays.len(),
            pending = self.slots.len(),
            "Reconcile run finished"
        );
        ReconcileOutcome {
            sessions: self.sessions,
            carry_over: self.slots,
            strays: self.strays,
        }
    }
}

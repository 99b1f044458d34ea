//! # sessiontally-core
//!
//! Pairs `open`/`close` action events into user sessions and averages their
//! durations.
//!
//! ## Key Types
//!
//! - [`reconcile`] - Pairs one run's events against the carried-over opens
//! - [`ConflictPolicy`] - How a second `open` for an already-open user is resolved
//! - [`CarryOver`] - Pending opens handed from one run to the next
//! - [`ReconcileOutcome`] - Sessions, strays and the refreshed carry-over
//! - [`DurationTally`] - Per-user mean duration across any number of runs
//!
//! ## Usage
//!
//! ```rust
//! use sessiontally_core::{reconcile, Action, CarryOver, ConflictPolicy, Event};
//!
//! let events = vec![
//!     Event::new("u1", 100, Action::Open),
//!     Event::new("u1", 150, Action::Close),
//!     Event::new("u2", 120, Action::Open),
//! ];
//!
//! let outcome = reconcile(CarryOver::new(), events, ConflictPolicy::KeepLatestOpen).unwrap();
//! assert_eq!(outcome.sessions[0].duration_secs, 50);
//! assert_eq!(outcome.carry_over.len(), 1);
//! ```

mod aggregate;
mod error;
mod policy;
mod reconciler;
mod types;

pub use aggregate::{average_durations, DurationTally, UserAverage};
pub use error::ReconcileError;
pub use policy::{ConflictPolicy, Resolution};
pub use reconciler::{reconcile, ReconcileOutcome};
pub use types::{Action, CarryOver, Event, PendingOpen, Session, StrayEvent, StrayReason, Timestamp};

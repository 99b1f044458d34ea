use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Session;

/// Mean session duration for a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAverage {
    pub user_id: String,
    pub sessions: usize,
    pub mean_duration_secs: f64,
}

/// Running per-user duration totals.
///
/// Feed it the sessions of every run in turn and read the averages at the
/// end; users that never completed a session do not appear.
#[derive(Debug, Clone, Default)]
pub struct DurationTally {
    totals: BTreeMap<String, (usize, i128)>,
}

impl DurationTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, session: &Session) {
        let entry = self.totals.entry(session.user_id.clone()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += i128::from(session.duration_secs);
    }

    pub fn extend<'a>(&mut self, sessions: impl IntoIterator<Item = &'a Session>) {
        for session in sessions {
            self.record(session);
        }
    }

    /// Total number of sessions recorded.
    pub fn session_count(&self) -> usize {
        self.totals.values().map(|(count, _)| count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Averages sorted by user id.
    pub fn averages(&self) -> Vec<UserAverage> {
        self.totals
            .iter()
            .map(|(user_id, (count, total))| UserAverage {
                user_id: user_id.clone(),
                sessions: *count,
                mean_duration_secs: *total as f64 / *count as f64,
            })
            .collect()
    }
}

/// One-shot mean duration per user.
pub fn average_durations(sessions: &[Session]) -> Vec<UserAverage> {
    let mut tally = DurationTally::new();
    tally.extend(sessions);
    tally.averages()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timestamp;

    fn session(user: &str, open: i64, close: i64) -> Session {
        Session::between(user, Timestamp(open), Timestamp(close)).unwrap()
    }

    #[test]
    fn test_average_durations_groups_by_user() {
        let sessions = vec![
            session("u2", 0, 30),
            session("u1", 100, 150),
            session("u1", 200, 300),
        ];

        let averages = average_durations(&sessions);

        assert_eq!(averages.len(), 2);
        assert_eq!(averages[0].user_id, "u1");
        assert_eq!(averages[0].sessions, 2);
        assert!((averages[0].mean_duration_secs - 75.0).abs() < f64::EPSILON);
        assert_eq!(averages[1].user_id, "u2");
        assert!((averages[1].mean_duration_secs - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tally_totals_do_not_overflow() {
        let mut tally = DurationTally::new();
        tally.record(&session("u1", 0, i64::MAX));
        tally.record(&session("u1", 0, i64::MAX));

        let averages = tally.averages();
        assert_eq!(averages[0].sessions, 2);
        assert_eq!(averages[0].mean_duration_secs, i64::MAX as f64);
    }

    #[test]
    fn test_average_durations_empty() {
        assert!(average_durations(&[]).is_empty());
    }

    #[test]
    fn test_tally_accumulates_across_runs() {
        let mut tally = DurationTally::new();
        tally.extend(&[session("u1", 0, 10)]);
        tally.extend(&[session("u1", 20, 50), session("u3", 5, 5)]);

        assert_eq!(tally.session_count(), 3);
        let averages = tally.averages();
        assert_eq!(averages[0].user_id, "u1");
        assert!((averages[0].mean_duration_secs - 20.0).abs() < f64::EPSILON);
        assert_eq!(averages[1].user_id, "u3");
        assert_eq!(averages[1].mean_duration_secs, 0.0);
    }
}

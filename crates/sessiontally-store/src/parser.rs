use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::DateTime;
use thiserror::Error;

use sessiontally_core::{Action, Event, Timestamp};

/// Faults in a single log line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Expected 3 comma-separated fields, found {0}")]
    FieldCount(usize),

    #[error("Empty user id")]
    EmptyUserId,

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),
}

/// What to do with lines that fail to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedLines {
    /// Fail the whole read
    #[default]
    Reject,
    /// Warn and move on
    Skip,
}

/// The events decoded from one log file.
#[derive(Debug, Default)]
pub struct EventLog {
    pub events: Vec<Event>,
    /// Malformed lines dropped under [`MalformedLines::Skip`]
    pub skipped: usize,
}

/// Parse an epoch-seconds integer or a whole-second RFC 3339 instant.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, ParseError> {
    if let Ok(secs) = raw.parse::<i64>() {
        return Ok(Timestamp(secs));
    }

    let parsed = DateTime::parse_from_rfc3339(raw)
        .map_err(|_| ParseError::InvalidTimestamp(raw.to_string()))?;

    // Sub-second precision would not survive the carry-over file.
    if parsed.timestamp_subsec_nanos() != 0 {
        return Err(ParseError::InvalidTimestamp(raw.to_string()));
    }

    Ok(Timestamp(parsed.timestamp()))
}

/// Parse one `user_id,timestamp,action` line.
pub fn parse_event_line(line: &str) -> Result<Event, ParseError> {
    let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    let [user_id, timestamp, action] = fields.as_slice() else {
        return Err(ParseError::FieldCount(fields.len()));
    };

    if user_id.is_empty() {
        return Err(ParseError::EmptyUserId);
    }

    let timestamp = parse_timestamp(timestamp)?;
    let action = match action.to_lowercase().as_str() {
        "open" => Action::Open,
        "close" => Action::Close,
        _ => return Err(ParseError::UnknownAction(action.to_string())),
    };

    Ok(Event {
        user_id: user_id.to_string(),
        timestamp,
        action,
    })
}

/// Read a log file line by line into events. Blank lines are ignored.
pub fn read_event_log(path: &Path, malformed: MalformedLines) -> Result<EventLog> {
    let file = File::open(path).with_context(|| format!("Failed to open log file: {:?}", path))?;
    let reader = BufReader::new(file);

    let mut log = EventLog::default();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.with_context(|| format!("Failed to read line {} of {:?}", line_number, path))?;
        if line.trim().is_empty() {
            continue;
        }

        match parse_event_line(&line) {
            Ok(event) => log.events.push(event),
            Err(e) => match malformed {
                MalformedLines::Reject => {
                    return Err(e).with_context(|| {
                        format!("Malformed record on line {} of {:?}", line_number, path)
                    });
                }
                MalformedLines::Skip => {
                    tracing::warn!("Skipping malformed line {} of {:?}: {}", line_number, path, e);
                    log.skipped += 1;
                }
            },
        }
    }

    tracing::debug!(
        path = %path.display(),
        events = log.events.len(),
        skipped = log.skipped,
        "Read event log"
    );

    Ok(log)
}

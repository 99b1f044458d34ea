//! # sessiontally-store
//!
//! File-facing side of sessiontally: turns `user_id,timestamp,action` log
//! lines into events, and persists the carry-over set between runs.
//!
//! ## Key Types
//!
//! - [`read_event_log`] - Read and validate one log file
//! - [`CarryOverFile`] - Load, atomically save and lock the carry-over file
//! - [`StrayReportWriter`] - JSONL report of events that could not be paired
//!
//! ## File Formats
//!
//! Log files and the carry-over file share one line format:
//!
//! ```text
//! u42,1700000000,open
//! u42,2023-11-14T22:20:00Z,close
//! ```
//!
//! Timestamps are epoch seconds or RFC 3339 instants. The carry-over file is
//! always written with epoch seconds and only ever holds `open` lines.

mod carry_over;
mod parser;
mod report;

pub use carry_over::{CarryOverError, CarryOverFile, CarryOverLock};
pub use parser::{parse_event_line, parse_timestamp, read_event_log, EventLog, MalformedLines, ParseError};
pub use report::StrayReportWriter;

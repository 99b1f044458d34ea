use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Structured progress events for a reconcile run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        files: usize,
        policy: String,
    },
    CarryOverLoaded {
        path: PathBuf,
        pending: usize,
    },
    FileProcessed {
        path: PathBuf,
        events: usize,
        skipped: usize,
        sessions: usize,
        strays: usize,
        pending: usize,
    },
    /// An event that could not be paired
    StrayDetected {
        user_id: String,
        timestamp: i64,
        action: String,
        reason: String,
    },
    CarryOverWritten {
        path: PathBuf,
        pending: usize,
    },
    RunCompleted {
        files: usize,
        sessions: usize,
        users: usize,
        strays: usize,
        pending: usize,
    },
}

impl RunEvent {
    /// Stamp the event with the current UTC time for the JSON file mirror
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// How run progress is rendered on stderr
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Coloured, one event per line with a label
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
    /// Terse `key=value` lines
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Renders run progress on stderr, optionally mirrored to a JSON lines file
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Also append every event as JSON to `log_path`
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &RunEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &RunEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &RunEvent) {
        let mut stderr = std::io::stderr();
        match event {
            RunEvent::RunStarted { files, policy } => {
                let _ = writeln!(
                    stderr,
                    "{} {} {}",
                    "▶".bright_cyan(),
                    "sessiontally".bold().bright_white(),
                    format!("({} file(s), policy {})", files, policy).dimmed()
                );
            }
            RunEvent::CarryOverLoaded { path, pending } => {
                let _ = writeln!(
                    stderr,
                    "  {} Loaded {} pending open(s) from {}",
                    "↺".bright_blue(),
                    pending,
                    path.display().to_string().dimmed()
                );
            }
            RunEvent::FileProcessed {
                path,
                events,
                skipped,
                sessions,
                strays,
                pending,
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "✓".bright_green(),
                    path.display().to_string().bold()
                );
                let mut detail = format!(
                    "{} events, {} sessions, {} strays, {} pending",
                    events, sessions, strays, pending
                );
                if *skipped > 0 {
                    detail.push_str(&format!(", {} malformed skipped", skipped));
                }
                let _ = writeln!(stderr, "    {}", detail.dimmed());
            }
            RunEvent::StrayDetected {
                user_id,
                timestamp,
                action,
                reason,
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} stray {} for {} at {} ({})",
                    "!".bright_yellow(),
                    action,
                    user_id.bold(),
                    timestamp,
                    reason.dimmed()
                );
            }
            RunEvent::CarryOverWritten { path, pending } => {
                let _ = writeln!(
                    stderr,
                    "  {} Wrote {} pending open(s) to {}",
                    "↻".bright_blue(),
                    pending,
                    path.display().to_string().dimmed()
                );
            }
            RunEvent::RunCompleted {
                files,
                sessions,
                users,
                strays,
                pending,
            } => {
                let _ = writeln!(
                    stderr,
                    "{} {} session(s) for {} user(s) across {} file(s); {} stray, {} pending",
                    "■".bright_green(),
                    sessions,
                    users,
                    files,
                    strays,
                    pending
                );
            }
        }
    }

    fn log_compact(&self, event: &RunEvent) {
        let mut stderr = std::io::stderr();
        let line = match event {
            RunEvent::RunStarted { files, policy } => {
                format!("[start] files={} policy={}", files, policy)
            }
            RunEvent::CarryOverLoaded { path, pending } => {
                format!("[carry-in] {} pending={}", path.display(), pending)
            }
            RunEvent::FileProcessed {
                path,
                events,
                skipped,
                sessions,
                strays,
                pending,
            } => format!(
                "[file] {} events={} skipped={} sessions={} strays={} pending={}",
                path.display(),
                events,
                skipped,
                sessions,
                strays,
                pending
            ),
            RunEvent::StrayDetected {
                user_id,
                timestamp,
                action,
                reason,
            } => format!("[stray] {} {} {} {}", user_id, timestamp, action, reason),
            RunEvent::CarryOverWritten { path, pending } => {
                format!("[carry-out] {} pending={}", path.display(), pending)
            }
            RunEvent::RunCompleted {
                files,
                sessions,
                users,
                strays,
                pending,
            } => format!(
                "[done] files={} sessions={} users={} strays={} pending={}",
                files, sessions, users, strays, pending
            ),
        };
        let _ = writeln!(stderr, "{}", line);
    }
}

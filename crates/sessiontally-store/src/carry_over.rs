use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use sessiontally_core::{Action, CarryOver};

use crate::parser::{parse_event_line, ParseError};

#[derive(Error, Debug)]
pub enum CarryOverError {
    #[error("Carry-over file not found: {0:?}")]
    Missing(PathBuf),

    #[error("Failed to read carry-over file {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Malformed carry-over entry on line {line}: {source}")]
    Malformed { line: usize, source: ParseError },

    #[error("Carry-over entry on line {line} is a '{action}' event, expected 'open'")]
    NotAnOpen { line: usize, action: Action },

    #[error("Duplicate pending open for user '{user_id}' on line {line}")]
    DuplicateUser { line: usize, user_id: String },

    #[error("User id '{0}' cannot be stored in the carry-over file")]
    UnstorableUserId(String),

    #[error("Failed to write carry-over file {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Carry-over file {0:?} is locked by another run")]
    Locked(PathBuf),

    #[error("Could not determine data directory")]
    NoDataDir,
}

/// The carry-over set on disk: one `user_id,timestamp,open` line per pending open.
pub struct CarryOverFile {
    path: PathBuf,
}

impl CarryOverFile {
    /// Use the default location under the user's data directory.
    pub fn new() -> Result<Self, CarryOverError> {
        Ok(Self {
            path: Self::default_path()?,
        })
    }

    /// Use a custom path (useful for testing).
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// `~/.local/share/sessiontally/incomplete_sessions.txt` on Linux.
    pub fn default_path() -> Result<PathBuf, CarryOverError> {
        let data_dir = dirs::data_dir().ok_or(CarryOverError::NoDataDir)?;
        Ok(data_dir.join("sessiontally").join("incomplete_sessions.txt"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the carry-over set. A missing file is an error, never an empty set.
    pub fn load(&self) -> Result<CarryOver, CarryOverError> {
        if !self.path.exists() {
            return Err(CarryOverError::Missing(self.path.clone()));
        }

        let content = fs::read_to_string(&self.path).map_err(|source| CarryOverError::Read {
            path: self.path.clone(),
            source,
        })?;

        let mut carry_over = CarryOver::new();
        for (index, raw) in content.lines().enumerate() {
            let line = index + 1;
            if raw.trim().is_empty() {
                continue;
            }

            let event =
                parse_event_line(raw).map_err(|source| CarryOverError::Malformed { line, source })?;
            if event.action != Action::Open {
                return Err(CarryOverError::NotAnOpen {
                    line,
                    action: event.action,
                });
            }
            if carry_over.contains(&event.user_id) {
                return Err(CarryOverError::DuplicateUser {
                    line,
                    user_id: event.user_id,
                });
            }
            carry_over.insert(event.user_id, event.timestamp);
        }

        tracing::debug!(path = %self.path.display(), pending = carry_over.len(), "Loaded carry-over");
        Ok(carry_over)
    }

    /// Replace the file with `carry_over`.
    ///
    /// Writes to a temp file in the same directory, syncs it, then renames it
    /// over the target, so readers see either the old set or the new one.
    pub fn save(&self, carry_over: &CarryOver) -> Result<(), CarryOverError> {
        for pending in carry_over.iter() {
            // Fields are trimmed on load, so padded ids would not read back.
            let id = pending.user_id.as_str();
            if id.contains([',', '\n', '\r']) || id.trim().is_empty() || id != id.trim() {
                return Err(CarryOverError::UnstorableUserId(pending.user_id));
            }
        }

        let dir = self.parent_dir();
        fs::create_dir_all(&dir).map_err(|source| self.write_error(source))?;

        let tmp = NamedTempFile::new_in(&dir).map_err(|source| self.write_error(source))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            for pending in carry_over.iter() {
                writeln!(writer, "{},{},{}", pending.user_id, pending.opened_at, Action::Open)
                    .map_err(|source| self.write_error(source))?;
            }
            writer.flush().map_err(|source| self.write_error(source))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|source| self.write_error(source))?;
        tmp.persist(&self.path)
            .map_err(|e| self.write_error(e.error))?;

        tracing::debug!(path = %self.path.display(), pending = carry_over.len(), "Saved carry-over");
        Ok(())
    }

    /// Take the exclusive lock guarding this file for the duration of a run.
    pub fn lock(&self) -> Result<CarryOverLock, CarryOverError> {
        let mut lock_path = self.path.clone().into_os_string();
        lock_path.push(".lock");
        let lock_path = PathBuf::from(lock_path);

        fs::create_dir_all(self.parent_dir()).map_err(|source| self.write_error(source))?;

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(CarryOverError::Locked(self.path.clone()));
            }
            Err(source) => {
                return Err(CarryOverError::Write {
                    path: lock_path,
                    source,
                });
            }
        };
        let lock = CarryOverLock { path: lock_path };
        writeln!(file, "{}", std::process::id()).map_err(|source| CarryOverError::Write {
            path: lock.path.clone(),
            source,
        })?;

        Ok(lock)
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn write_error(&self, source: io::Error) -> CarryOverError {
        CarryOverError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

/// Held while a run owns the carry-over file; removes the sentinel on drop.
#[derive(Debug)]
pub struct CarryOverLock {
    path: PathBuf,
}

impl CarryOverLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CarryOverLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Failed to release carry-over lock {:?}: {}", self.path, e);
        }
    }
}

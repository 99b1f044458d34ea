use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use sessiontally_core::StrayEvent;

/// Writes stray events as JSON lines.
pub struct StrayReportWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    written: usize,
}

impl StrayReportWriter {
    /// Create (or truncate) the report file, creating parent directories.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, stray: &StrayEvent) -> io::Result<()> {
        let json = serde_json::to_string(stray)?;
        writeln!(self.writer, "{}", json)?;
        self.written += 1;
        Ok(())
    }

    pub fn write_all<'a>(&mut self, strays: impl IntoIterator<Item = &'a StrayEvent>) -> io::Result<()> {
        for stray in strays {
            self.write(stray)?;
        }
        Ok(())
    }

    /// Flush buffered lines and return how many were written.
    pub fn finish(mut self) -> io::Result<usize> {
        self.writer.flush()?;
        Ok(self.written)
    }
}

// src/log/sink.rs

//! Durable destinations for formatted log lines.

use std::fmt::Debug;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use time::macros::format_description;

/// Append-only, line-oriented log destination.
pub trait LogSink: Send + Debug {
    /// Append one already-formatted line (without trailing newline).
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Backing file, if any.
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// Log file opened in append mode. Every line is written through to the OS.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }
}

impl LogSink for FileSink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        self.file.write_all(&buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Discards everything. Used when no log file can be opened at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn write_line(&mut self, _line: &str) -> io::Result<()> {
        Ok(())
    }
}

/// Default log directory: `<tmp>/setup-runner/logs`.
pub fn default_log_dir() -> PathBuf {
    std::env::temp_dir().join("setup-runner").join("logs")
}

/// `setup_YYYYMMDD_HHMMSS.log`
pub fn log_file_name(now: OffsetDateTime) -> String {
    let stamp = now
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .unwrap_or_else(|_| "unknown".to_string());
    format!("setup_{stamp}.log")
}

/// Open a timestamped log file in `dir`.
///
/// If `dir` cannot be created the temp directory is used instead; the second
/// element of the result then carries the reason, so the caller can log it.
pub fn open_log_file(dir: &Path, now: OffsetDateTime) -> io::Result<(FileSink, Option<String>)> {
    let name = log_file_name(now);
    match fs::create_dir_all(dir).and_then(|_| FileSink::open(dir.join(&name))) {
        Ok(sink) => Ok((sink, None)),
        Err(err) => {
            let fallback = default_log_dir();
            if fallback == dir {
                return Err(err);
            }
            let sink = FileSink::open(fallback.join(&name))?;
            let reason = format!(
                "Using temporary log directory {} ({} unavailable: {err})",
                fallback.display(),
                dir.display()
            );
            Ok((sink, Some(reason)))
        }
    }
}

//! Triggers.

use std::fmt;
use std::path::Path;

pub mod time;

/// A handle to the active log file, passed to triggers on every append.
#[derive(Debug)]
pub struct LogFile<'a> {
    path: &'a Path,
    len: u64,
}

impl<'a> LogFile<'a> {
    pub fn new(path: &'a Path, len: u64) -> LogFile<'a> {
        LogFile { path, len }
    }

    /// Returns the path to the file.
    pub fn path(&self) -> &Path {
        self.path
    }

    /// Returns an estimate of the log file's current size.
    ///
    /// This is calculated by the writer as the file's initial size plus the
    /// bytes appended since; it may diverge from the actual size if the file
    /// is modified externally.
    pub fn len_estimate(&self) -> u64 {
        self.len
    }
}

/// A trait which identifies if the active log file should be rolled over.
///
/// The check runs inline on the caller's logging path, potentially from
/// many threads at once, and must neither block nor perform I/O.
pub trait Trigger: fmt::Debug + Send + Sync + 'static {
    /// Determines if the active log file should be rolled over.
    fn trigger(&self, file: &LogFile) -> anyhow::Result<bool>;
}

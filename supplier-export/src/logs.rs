//! Run log for the export pipeline.
//!
//! Every stage reports progress through the `log_*` helpers. Entries go to
//! stderr so that stdout only carries the path of the written file.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;

/// Log level for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Indentation level (for nested logs)
    pub indent: u8,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into(), indent: 0 }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Success, message: message.into(), indent: 0 }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Warning, message: message.into(), indent: 0 }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, message: message.into(), indent: 0 }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    /// Render the entry as a single display line.
    pub fn render(&self) -> String {
        let prefix = match self.level {
            LogLevel::Info => "  ",
            LogLevel::Success => "  ✓",
            LogLevel::Warning => "  !",
            LogLevel::Error => "  ✗",
        };
        let indent = "   ".repeat(self.indent as usize);
        format!("{}{} {}", indent, prefix, self.message)
    }
}

/// Global run logger
pub static RUN_LOG: Lazy<RunLog> = Lazy::new(RunLog::new);

/// Writes log entries to stderr unless silenced.
pub struct RunLog {
    quiet: AtomicBool,
}

impl RunLog {
    pub fn new() -> Self {
        Self { quiet: AtomicBool::new(false) }
    }

    /// Silence (or re-enable) the log.
    pub fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::Relaxed);
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet.load(Ordering::Relaxed)
    }

    /// Write a log entry
    pub fn log(&self, entry: LogEntry) {
        if self.is_quiet() {
            return;
        }
        // A closed stderr must not abort the run.
        let _ = writeln!(std::io::stderr().lock(), "{}", entry.render());
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    RUN_LOG.log(LogEntry::info(msg).with_indent(indent));
}

//! The user-visible activity log and notice queue.
//!
//! Distinct from `tracing` diagnostics: this is what the operator sees.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;

/// Who produced a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOrigin {
    /// The controller itself (user actions, lifecycle, errors).
    Local,
    /// A line read from the device.
    Device,
}

/// A timestamped, immutable activity line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    timestamp: DateTime<Local>,
    origin: LogOrigin,
    message: String,
}

impl LogEntry {
    pub fn local(message: impl Into<String>) -> Self {
        Self::new(LogOrigin::Local, message)
    }

    pub fn device(line: impl Into<String>) -> Self {
        Self::new(LogOrigin::Device, line)
    }

    fn new(origin: LogOrigin, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            origin,
            message: message.into(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn origin(&self) -> LogOrigin {
        self.origin
    }

    /// The message without timestamp or origin prefix.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The message as displayed, with the device prefix when applicable.
    pub fn text(&self) -> String {
        match self.origin {
            LogOrigin::Local => self.message.clone(),
            LogOrigin::Device => format!("Device: {}", self.message),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.text())
    }
}

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A blocking, user-facing notice (the dialog box of a GUI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// Append-only activity feed plus the pending notices.
///
/// Entries are never edited or removed. Presentation layers keep a cursor
/// and call [`ActivityLog::since`] to pick up what is new.
#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: Vec<LogEntry>,
    notices: VecDeque<Notice>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    /// Shorthand for pushing a [`LogOrigin::Local`] entry.
    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogEntry::local(message));
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    /// Entries appended after `cursor` (a previous `len()`).
    pub fn since(&self, cursor: usize) -> &[LogEntry] {
        self.entries.get(cursor..).unwrap_or(&[])
    }

    pub fn notify(&mut self, notice: Notice) {
        self.notices.push_back(notice);
    }

    /// Remove and return the oldest unseen notice.
    pub fn next_notice(&mut self) -> Option<Notice> {
        self.notices.pop_front()
    }

    pub fn pending_notices(&self) -> usize {
        self.notices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_entries_are_prefixed() {
        let entry = LogEntry::device("READY");
        assert_eq!(entry.origin(), LogOrigin::Device);
        assert_eq!(entry.message(), "READY");
        assert_eq!(entry.text(), "Device: READY");

        let rendered = entry.to_string();
        assert!(rendered.starts_with('['));
        assert!(rendered.ends_with("] Device: READY"));
        // "[HH:MM:SS] "
        assert_eq!(rendered.find(']'), Some(9));
    }

    #[test]
    fn test_since_cursor() {
        let mut log = ActivityLog::new();
        log.info("one");
        let cursor = log.len();
        log.info("two");
        log.push(LogEntry::device("three"));

        let fresh: Vec<_> = log.since(cursor).iter().map(|e| e.text()).collect();
        assert_eq!(fresh, vec!["two", "Device: three"]);
        assert!(log.since(10).is_empty());
    }

    #[test]
    fn test_notices_are_fifo() {
        let mut log = ActivityLog::new();
        log.notify(Notice::warning("Warning", "first"));
        log.notify(Notice::error("Error", "second"));
        assert_eq!(log.pending_notices(), 2);

        assert_eq!(log.next_notice().unwrap().message, "first");
        let second = log.next_notice().unwrap();
        assert_eq!(second.level, NoticeLevel::Error);
        assert_eq!(second.to_string(), "Error: second");
        assert!(log.next_notice().is_none());
    }
}

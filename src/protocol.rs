//! Wire protocol spoken to the keyboard firmware.
//!
//! Host to device, no trailing newline:
//!
//! ```text
//! TYPE:<N>:<text>   N = UTF-8 byte count of <text>
//! STOP:
//! STATUS:
//! ```
//!
//! Device to host is free-form newline-terminated text, split by
//! [`LineBuffer`].

use std::fmt;

/// Longest partial line kept before it is flushed as-is.
pub const MAX_LINE_BYTES: usize = 4096;

/// An outgoing command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Inject `text` as keystrokes.
    Type { text: String },
    /// Abort any typing in progress.
    Stop,
    /// Ask the device for a status line.
    Status,
}

impl Command {
    pub fn type_text(text: impl Into<String>) -> Self {
        Self::Type { text: text.into() }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Type { .. } => "TYPE",
            Self::Stop => "STOP",
            Self::Status => "STATUS",
        }
    }

    /// Payload length in encoded bytes, not characters.
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Type { text } => text.len(),
            Self::Stop | Self::Status => 0,
        }
    }

    /// Serialize to the exact bytes put on the wire.
    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type { text } => write!(f, "TYPE:{}:{}", text.len(), text),
            Self::Stop | Self::Status => write!(f, "{}:", self.tag()),
        }
    }
}

/// Splits a serial byte stream into text lines.
///
/// Lines end at `\n`. Surrounding whitespace (including the `\r` of CRLF) is
/// trimmed, blank lines are dropped and invalid UTF-8 is replaced rather than
/// rejected.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every line completed by them.
    pub fn push(&mut self, mut bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        while let Some(pos) = memchr::memchr(b'\n', bytes) {
            self.pending.extend_from_slice(&bytes[..pos]);
            self.emit(&mut lines);
            bytes = &bytes[pos + 1..];
        }
        self.pending.extend_from_slice(bytes);

        // A device that never sends a newline must not grow us without bound.
        if self.pending.len() >= MAX_LINE_BYTES {
            self.emit(&mut lines);
        }

        lines
    }

    /// Bytes held back waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn emit(&mut self, lines: &mut Vec<String>) {
        let line = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        if !line.is_empty() {
            lines.push(line);
        }
    }
}

//! Connection and command errors.
//!
//! Every error here is terminal to the operation that raised it, never to the
//! process. The controller turns them into a log line and, where the user
//! must react, a [`Notice`](crate::log::Notice).

use thiserror::Error;

/// Failures of the connection lifecycle and the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// No port was selected.
    #[error("Please select a serial port")]
    InvalidPort,

    /// The transport refused to open; carries the native error text.
    #[error("Failed to connect to {port}: {reason}")]
    OpenFailed { port: String, reason: String },

    /// Writing a command failed; the session has been torn down.
    #[error("Send error: {0}")]
    WriteFailed(String),

    /// The background reader hit an I/O error; the session has been torn down.
    #[error("Serial port disconnected or read error: {0}")]
    ReadFailed(String),

    /// The operation needs an established connection.
    #[error("Not connected")]
    NotConnected,
}

impl ConnectionError {
    pub fn open_failed(port: impl Into<String>, reason: impl ToString) -> Self {
        Self::OpenFailed {
            port: port.into(),
            reason: reason.to_string(),
        }
    }
}

/// Rejections from the command session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Nothing to type.
    #[error("Please enter some text to type")]
    EmptyInput,

    /// Commands are only accepted while connected.
    #[error("Not connected to a device")]
    NotConnected,

    /// A delayed TYPE is already waiting to fire.
    #[error("A typing request is already pending")]
    TypePending,

    /// The command was handed to the transport and the write failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Result type for connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Result type for command operations.
pub type CommandResult<T> = Result<T, CommandError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_failed_preserves_native_text() {
        let err = ConnectionError::open_failed("COM7", "Access is denied.");
        assert_eq!(err.to_string(), "Failed to connect to COM7: Access is denied.");
    }

    #[test]
    fn test_command_error_wraps_connection_error() {
        let err: CommandError = ConnectionError::WriteFailed("broken pipe".into()).into();
        assert_eq!(err.to_string(), "Send error: broken pipe");
        assert_eq!(CommandError::EmptyInput.to_string(), "Please enter some text to type");
    }
}

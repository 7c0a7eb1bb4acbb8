//! Serial Keyboard Controller Library
//!
//! Host-side controller for a microcontroller that emulates a USB keyboard.
//! It opens the device's serial port, sends `TYPE`, `STOP` and `STATUS`
//! commands, and collects the lines the device reports into an activity log.
//!
//! # Modules
//!
//! - `port`: Transport seam over the `serialport` crate, plus a mock
//! - `protocol`: Command encoding and device line splitting
//! - `log`: Activity log and user-facing notices
//! - `connection`: Connection lifecycle and the background reader
//! - `command`: Command session with the deferred TYPE
//! - `scheduler`: Timed continuations fed back to the control loop
//! - `config`: Configuration management with TOML support
//! - `error`: Connection and command errors
//! - `console`: Line-oriented stdin front end
//! - `tui`: Terminal UI (when the `tui` feature is enabled)

pub mod command;
pub mod config;
pub mod connection;
pub mod console;
pub mod error;
pub mod log;
pub mod port;
pub mod protocol;
pub mod scheduler;

#[cfg(feature = "tui")]
pub mod tui;

pub use command::{CommandSession, PendingType};
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
pub use connection::{
    event_channel, ConnectionManager, ConnectionSettings, ConnectionState, ControllerEvent,
    EventReceiver, EventSender, SessionId,
};
pub use error::{CommandError, CommandResult, ConnectionError, ConnectionResult};
pub use log::{ActivityLog, LogEntry, LogOrigin, Notice, NoticeLevel};
pub use port::{
    MockSerialPort, PortConfiguration, PortError, PortOpener, SerialPortAdapter,
    SyncSerialPort, SystemPortOpener,
};
pub use protocol::{Command, LineBuffer};
pub use scheduler::{ManualScheduler, Scheduler, TokioScheduler};

//! Connection manager: owns the serial handle, the session lifecycle and the
//! background reader.
//!
//! All public methods run on the control thread. The reader thread never
//! touches controller state; it sends [`ControllerEvent`]s over a channel and
//! the control loop feeds them back through [`ConnectionManager::handle`].
//!
//! ```text
//! Disconnected ──connect()──> Connecting ──settle──> Connected
//!      ^                           │                     │
//!      └──── open/clone failure ───┘   disconnect() / I/O error
//! ```

use crate::config::Config;
use crate::error::{ConnectionError, ConnectionResult};
use crate::log::{ActivityLog, LogEntry, Notice};
use crate::port::{PortConfiguration, PortError, PortOpener, SerialPortAdapter};
use crate::protocol::LineBuffer;
use crate::scheduler::Scheduler;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::command::PendingType;

/// Sending half of the control channel.
pub type EventSender = mpsc::UnboundedSender<ControllerEvent>;
/// Receiving half of the control channel, drained by the control loop.
pub type EventReceiver = mpsc::UnboundedReceiver<ControllerEvent>;

/// Create the channel the reader and the scheduler report into.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Identifies one connect-to-disconnect lifespan.
///
/// Events carry the id of the session that produced them so anything a dead
/// session left in the channel is recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn first() -> Self {
        Self(1)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Messages delivered to the control loop from other threads or timers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// A complete line read from the device.
    DeviceLine { session: SessionId, entry: LogEntry },
    /// The reader hit an I/O error (or panicked) and has exited.
    ReaderFailed { session: SessionId, reason: String },
    /// The post-open settle delay is over.
    SettleElapsed { session: SessionId },
    /// The grace period before a TYPE command is over.
    TypeDue(PendingType),
}

/// Connection state as shown by the status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
        };
        f.write_str(s)
    }
}

/// Timing and transport parameters for the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub port: PortConfiguration,
    /// Sleep between reads when the line is idle.
    pub poll_interval: Duration,
    /// Pause after opening before the device is treated as ready.
    pub settle_delay: Duration,
    /// Upper bound on waiting for the reader to exit during teardown.
    pub join_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: PortConfiguration::default(),
            poll_interval: Duration::from_millis(100),
            settle_delay: Duration::from_secs(2),
            join_timeout: Duration::from_secs(1),
        }
    }
}

impl ConnectionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            port: PortConfiguration {
                baud_rate: config.serial.baud_rate,
                timeout: config.serial.read_timeout(),
            },
            poll_interval: config.serial.poll_interval(),
            settle_delay: config.session.settle_delay(),
            join_timeout: config.session.reader_join_timeout(),
        }
    }
}

struct Session {
    id: SessionId,
    port_name: String,
    port: Box<dyn SerialPortAdapter>,
    state: ConnectionState,
    reader: Option<ReaderHandle>,
    connected_at: Option<Instant>,
}

/// Owns the active session, if any.
pub struct ConnectionManager {
    opener: Box<dyn PortOpener>,
    settings: ConnectionSettings,
    scheduler: Arc<dyn Scheduler>,
    events: EventSender,
    log: ActivityLog,
    session: Option<Session>,
    last_session: Option<SessionId>,
}

impl ConnectionManager {
    pub fn new(
        opener: Box<dyn PortOpener>,
        settings: ConnectionSettings,
        scheduler: Arc<dyn Scheduler>,
        events: EventSender,
    ) -> Self {
        Self {
            opener,
            settings,
            scheduler,
            events,
            log: ActivityLog::new(),
            session: None,
            last_session: None,
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub(crate) fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    pub fn state(&self) -> ConnectionState {
        self.session
            .as_ref()
            .map_or(ConnectionState::Disconnected, |s| s.state)
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Port of the active session, connected or still settling.
    pub fn port_name(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.port_name.as_str())
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn connected_since(&self) -> Option<Instant> {
        self.session.as_ref().and_then(|s| s.connected_at)
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    pub(crate) fn log_mut(&mut self) -> &mut ActivityLog {
        &mut self.log
    }

    /// Open `port_id` and start a new session, replacing any current one.
    ///
    /// The open itself is synchronous. With a non-zero settle delay the
    /// session stays `Connecting` until the scheduled `SettleElapsed` event
    /// is handled; with a zero delay it is `Connected` on return.
    pub fn connect(&mut self, port_id: &str) -> ConnectionResult<()> {
        let port_name = port_id.trim();
        if port_name.is_empty() {
            let err = ConnectionError::InvalidPort;
            self.report_connect_failure(&err);
            return Err(err);
        }

        self.disconnect();

        info!(port = port_name, baud = self.settings.port.baud_rate, "opening serial port");
        let port = match self.opener.open(port_name, &self.settings.port) {
            Ok(port) => port,
            Err(e) => {
                let err = ConnectionError::open_failed(port_name, e);
                self.report_connect_failure(&err);
                return Err(err);
            }
        };

        let id = self.last_session.map_or(SessionId::first(), SessionId::next);
        self.last_session = Some(id);
        self.session = Some(Session {
            id,
            port_name: port_name.to_string(),
            port,
            state: ConnectionState::Connecting,
            reader: None,
            connected_at: None,
        });

        if self.settings.settle_delay.is_zero() {
            return self.finish_connect(id);
        }

        self.log
            .info(format!("Connecting to {port_name}, please wait..."));
        self.scheduler.schedule(
            self.settings.settle_delay,
            ControllerEvent::SettleElapsed { session: id },
        );
        Ok(())
    }

    /// Tear down the active session. A no-op when already disconnected.
    ///
    /// Stops the reader (waiting at most `join_timeout`), closes the port and
    /// logs the disconnect. Safe to call in response to the reader's own
    /// failure event since the reader has already exited by then.
    pub fn disconnect(&mut self) {
        let Some(Session {
            id,
            port_name,
            port,
            reader,
            ..
        }) = self.session.take()
        else {
            return;
        };

        if let Some(reader) = reader {
            reader.stop(self.settings.join_timeout);
        }
        drop(port);

        info!(session = %id, port = %port_name, "session closed");
        self.log.info(format!("Disconnected from {port_name}"));
    }

    /// Write `bytes` to the device. `false` when not connected or on failure.
    pub fn send_raw(&mut self, bytes: &[u8]) -> bool {
        self.try_send(bytes).is_ok()
    }

    /// Like [`send_raw`](Self::send_raw) but says why a send did not happen.
    ///
    /// A write failure is logged and tears the session down before returning.
    pub fn try_send(&mut self, bytes: &[u8]) -> ConnectionResult<()> {
        let session = match self.session.as_mut() {
            Some(s) if s.state.is_connected() => s,
            _ => return Err(ConnectionError::NotConnected),
        };

        match session.port.write_all_bytes(bytes) {
            Ok(()) => {
                debug!(session = %session.id, bytes = bytes.len(), "command written");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "write failed; tearing down session");
                let err = ConnectionError::WriteFailed(e.to_string());
                self.log.info(err.to_string());
                self.disconnect();
                Err(err)
            }
        }
    }

    /// Apply an event received on the control channel.
    pub fn handle(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::DeviceLine { session, entry } => {
                if self.is_live(session) {
                    self.log.push(entry);
                } else {
                    debug!(%session, "dropping line from inactive session");
                }
            }
            ControllerEvent::ReaderFailed { session, reason } => {
                if !self.is_live(session) {
                    debug!(%session, %reason, "reader failure after teardown; ignoring");
                    return;
                }
                warn!(%session, %reason, "serial read failed");
                self.log.info("Serial port disconnected or read error.");
                self.disconnect();
            }
            ControllerEvent::SettleElapsed { session } => {
                // failures are already logged and surfaced as a notice
                let _ = self.finish_connect(session);
            }
            ControllerEvent::TypeDue(pending) => {
                debug!(request = pending.request(), "TYPE continuation has no command session; ignoring");
            }
        }
    }

    fn is_live(&self, session: SessionId) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.id == session && s.state.is_connected())
    }

    fn finish_connect(&mut self, id: SessionId) -> ConnectionResult<()> {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|s| s.id == id && s.state == ConnectionState::Connecting)
        else {
            debug!(session = %id, "settle elapsed for inactive session");
            return Ok(());
        };

        let started = session
            .port
            .try_clone_box()
            .and_then(|reader_port| {
                ReaderHandle::spawn(id, reader_port, self.events.clone(), self.settings.poll_interval)
                    .map_err(PortError::Io)
            });

        match started {
            Ok(reader) => {
                session.reader = Some(reader);
                session.state = ConnectionState::Connected;
                session.connected_at = Some(Instant::now());
                info!(session = %id, port = %session.port_name, "connected");
                let message = format!("Connected to {}.", session.port_name);
                self.log.info(message);
                Ok(())
            }
            Err(e) => {
                let port_name = session.port_name.clone();
                self.session = None;
                let err = ConnectionError::open_failed(port_name, e);
                self.report_connect_failure(&err);
                Err(err)
            }
        }
    }

    fn report_connect_failure(&mut self, err: &ConnectionError) {
        error!(error = %err, "connect failed");
        self.log.info(format!("Connection failed: {err}"));
        let title = match err {
            ConnectionError::InvalidPort => "Error",
            _ => "Connection Error",
        };
        self.log.notify(Notice::error(title, err.to_string()));
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("port", &self.port_name())
            .field("log_len", &self.log.len())
            .finish()
    }
}

/// Control side of a running reader thread.
struct ReaderHandle {
    stop: Arc<AtomicBool>,
    exited: std_mpsc::Receiver<()>,
    thread: JoinHandle<()>,
}

/// Signals the control thread when the reader thread unwinds, however it ends.
struct ExitAck(std_mpsc::Sender<()>);

impl Drop for ExitAck {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

impl ReaderHandle {
    fn spawn(
        session: SessionId,
        port: Box<dyn SerialPortAdapter>,
        events: EventSender,
        poll_interval: Duration,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let (exit_tx, exited) = std_mpsc::channel();
        let thread_stop = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name(format!("serial-reader-{}", session.0))
            .spawn(move || {
                let _ack = ExitAck(exit_tx);
                debug!(%session, "reader started");

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    read_loop(session, port, &thread_stop, &events, poll_interval)
                }));
                let failure = match outcome {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(_) => Some("reader thread panicked".to_string()),
                };

                if let Some(reason) = failure {
                    // a stop request means teardown is already under way
                    if !thread_stop.load(Ordering::Acquire) {
                        let _ = events.send(ControllerEvent::ReaderFailed { session, reason });
                    }
                }
                debug!(%session, "reader exited");
            })?;

        Ok(Self {
            stop,
            exited,
            thread,
        })
    }

    /// Request a stop and wait up to `timeout` for the thread to exit.
    fn stop(self, timeout: Duration) {
        self.stop.store(true, Ordering::Release);
        match self.exited.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.thread.join().is_err() {
                    warn!("reader thread ended abnormally");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "reader did not stop in time; detaching");
            }
        }
    }
}

fn read_loop(
    session: SessionId,
    mut port: Box<dyn SerialPortAdapter>,
    stop: &AtomicBool,
    events: &EventSender,
    poll_interval: Duration,
) -> Result<(), PortError> {
    let mut lines = LineBuffer::new();
    let mut buf = [0u8; 512];

    while !stop.load(Ordering::Acquire) {
        if port.bytes_to_read()? == Some(0) {
            thread::sleep(poll_interval);
            continue;
        }
        match port.read_bytes(&mut buf) {
            Ok(0) => thread::sleep(poll_interval),
            Ok(n) => {
                for line in lines.push(&buf[..n]) {
                    if stop.load(Ordering::Acquire) {
                        return Ok(());
                    }
                    let event = ControllerEvent::DeviceLine {
                        session,
                        entry: LogEntry::device(line),
                    };
                    if events.send(event).is_err() {
                        // control loop is gone
                        return Ok(());
                    }
                }
            }
            Err(e) if e.is_idle() => thread::sleep(poll_interval),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

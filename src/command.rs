//! Command session: turns user requests into protocol commands.
//!
//! `TYPE` is deferred by a grace period so the operator can focus the target
//! window. The text is snapshotted together with the session it was requested
//! in, and the decision to send is made when the continuation fires.

use crate::config::Config;
use crate::connection::{
    ConnectionManager, ConnectionSettings, ConnectionState, ControllerEvent, EventSender,
    SessionId,
};
use crate::error::{CommandError, CommandResult, ConnectionError};
use crate::log::{ActivityLog, Notice};
use crate::port::PortOpener;
use crate::protocol::Command;
use crate::scheduler::Scheduler;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default grace period before a TYPE command is sent.
pub const DEFAULT_TYPE_DELAY: Duration = Duration::from_secs(5);

/// Snapshot of a TYPE request waiting for its delay to elapse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingType {
    request: u64,
    session: SessionId,
    text: String,
}

impl PendingType {
    pub fn request(&self) -> u64 {
        self.request
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The controller facade the presentation layers talk to.
#[derive(Debug)]
pub struct CommandSession {
    connection: ConnectionManager,
    type_delay: Duration,
    pending: Option<u64>,
    next_request: u64,
}

impl CommandSession {
    pub fn new(connection: ConnectionManager, type_delay: Duration) -> Self {
        Self {
            connection,
            type_delay,
            pending: None,
            next_request: 1,
        }
    }

    /// Wire up a controller from configuration.
    pub fn from_config(
        config: &Config,
        opener: Box<dyn PortOpener>,
        scheduler: Arc<dyn Scheduler>,
        events: EventSender,
    ) -> Self {
        let connection = ConnectionManager::new(
            opener,
            ConnectionSettings::from_config(config),
            scheduler,
            events,
        );
        Self::new(connection, config.session.type_delay())
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut ConnectionManager {
        &mut self.connection
    }

    pub fn type_delay(&self) -> Duration {
        self.type_delay
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.connection.port_name()
    }

    pub fn connected_since(&self) -> Option<Instant> {
        self.connection.connected_since()
    }

    pub fn log(&self) -> &ActivityLog {
        self.connection.log()
    }

    /// Pop the oldest user-facing notice.
    pub fn next_notice(&mut self) -> Option<Notice> {
        self.connection.log_mut().next_notice()
    }

    pub fn connect(&mut self, port_id: &str) -> Result<(), ConnectionError> {
        self.connection.connect(port_id)
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Whether a TYPE request would currently be accepted.
    pub fn can_request_type(&self) -> bool {
        self.connection.is_connected() && self.pending.is_none()
    }

    /// Whether a TYPE request is waiting for its delay.
    pub fn type_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Schedule `text` to be typed after the grace period.
    ///
    /// Only one request may be pending; further calls are rejected until it
    /// fires.
    pub fn request_type(&mut self, text: &str) -> CommandResult<()> {
        if text.is_empty() {
            let err = CommandError::EmptyInput;
            self.log_mut().notify(Notice::warning("Warning", err.to_string()));
            return Err(err);
        }
        let Some(session) = self
            .connection
            .session_id()
            .filter(|_| self.connection.is_connected())
        else {
            return Err(CommandError::NotConnected);
        };
        if self.pending.is_some() {
            return Err(CommandError::TypePending);
        }

        let request = self.next_request;
        self.next_request += 1;
        self.pending = Some(request);

        let delay = self.type_delay;
        self.log_mut().info(format!(
            "Request received. Typing will start in {} seconds...",
            format_secs(delay)
        ));
        info!(request, bytes = text.len(), ?delay, "TYPE scheduled");

        self.connection.scheduler().schedule(
            delay,
            ControllerEvent::TypeDue(PendingType {
                request,
                session,
                text: text.to_string(),
            }),
        );
        Ok(())
    }

    /// Send `STOP:` right away.
    pub fn request_stop(&mut self) -> CommandResult<()> {
        self.send_now(Command::Stop)
    }

    /// Send `STATUS:` right away.
    pub fn request_status(&mut self) -> CommandResult<()> {
        self.send_now(Command::Status)
    }

    /// Apply an event from the control channel.
    pub fn handle(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::TypeDue(pending) => self.fire_type(pending),
            other => self.connection.handle(other),
        }
    }

    fn fire_type(&mut self, due: PendingType) {
        if self.pending != Some(due.request) {
            debug!(request = due.request, "stale TYPE continuation");
            return;
        }
        self.pending = None;

        let same_session = self.connection.session_id() == Some(due.session);
        if !(same_session && self.connection.is_connected()) {
            info!(request = due.request, "TYPE cancelled by disconnect");
            let log = self.log_mut();
            log.info("Typing cancelled. Disconnected during the delay.");
            log.notify(Notice::warning(
                "Cancelled",
                "Typing was cancelled because the device was disconnected.",
            ));
            return;
        }

        let command = Command::type_text(due.text);
        self.log_mut().info(format!(
            "Sending TYPE command with length {}.",
            command.byte_len()
        ));
        // failures are already logged and surfaced
        let _ = self.send(command);
    }

    fn send_now(&mut self, command: Command) -> CommandResult<()> {
        if !self.connection.is_connected() {
            return Err(CommandError::NotConnected);
        }
        self.log_mut()
            .info(format!("Sending {} command.", command.tag()));
        self.send(command)
    }

    fn send(&mut self, command: Command) -> CommandResult<()> {
        match self.connection.try_send(&command.encode()) {
            Ok(()) => Ok(()),
            Err(ConnectionError::NotConnected) => Err(CommandError::NotConnected),
            Err(e) => {
                self.log_mut().notify(Notice::error(
                    "Error",
                    "Failed to send command to the device",
                ));
                Err(e.into())
            }
        }
    }

    fn log_mut(&mut self) -> &mut ActivityLog {
        self.connection.log_mut()
    }
}

fn format_secs(delay: Duration) -> String {
    let millis = delay.as_millis();
    if millis % 1000 == 0 {
        (millis / 1000).to_string()
    } else {
        format!("{:.1}", delay.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::event_channel;
    use crate::log::NoticeLevel;
    use crate::port::{MockSerialPort, PortConfiguration, PortError, SerialPortAdapter};
    use crate::scheduler::ManualScheduler;

    fn session_with(mock: &MockSerialPort) -> (CommandSession, ManualScheduler) {
        let mock = mock.clone();
        let opener = move |_name: &str,
                           _config: &PortConfiguration|
              -> Result<Box<dyn SerialPortAdapter>, PortError> {
            Ok(Box::new(mock.clone()))
        };
        let scheduler = ManualScheduler::new();
        let (tx, _rx) = event_channel();
        let settings = ConnectionSettings {
            settle_delay: Duration::ZERO,
            poll_interval: Duration::from_millis(2),
            ..ConnectionSettings::default()
        };
        let connection =
            ConnectionManager::new(Box::new(opener), settings, Arc::new(scheduler.clone()), tx);
        (CommandSession::new(connection, DEFAULT_TYPE_DELAY), scheduler)
    }

    fn fire_all(session: &mut CommandSession, scheduler: &ManualScheduler) {
        for (_, event) in scheduler.take() {
            session.handle(event);
        }
    }

    fn last_message(session: &CommandSession) -> String {
        session.log().last().map(|e| e.text()).unwrap_or_default()
    }

    #[test]
    fn test_type_waits_for_delay_then_sends() {
        let mock = MockSerialPort::new("MOCK0");
        let (mut session, scheduler) = session_with(&mock);
        session.connect("MOCK0").unwrap();

        session.request_type("hi").unwrap();
        assert_eq!(
            last_message(&session),
            "Request received. Typing will start in 5 seconds..."
        );
        assert!(mock.get_write_log().is_empty());
        assert!(!session.can_request_type());

        let scheduled = scheduler.take();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].0, Duration::from_secs(5));
        session.handle(scheduled[0].1.clone());

        assert_eq!(mock.written_bytes(), b"TYPE:2:hi");
        assert_eq!(last_message(&session), "Sending TYPE command with length 2.");
        assert!(session.can_request_type());
    }

    #[test]
    fn test_type_length_counts_utf8_bytes() {
        let mock = MockSerialPort::new("MOCK0");
        let (mut session, scheduler) = session_with(&mock);
        session.connect("MOCK0").unwrap();

        session.request_type("héllo").unwrap();
        fire_all(&mut session, &scheduler);

        assert_eq!(mock.written_bytes(), "TYPE:6:héllo".as_bytes());
    }

    #[test]
    fn test_empty_text_never_schedules() {
        let mock = MockSerialPort::new("MOCK0");
        let (mut session, scheduler) = session_with(&mock);
        session.connect("MOCK0").unwrap();
        let before = session.log().len();

        assert_eq!(session.request_type(""), Err(CommandError::EmptyInput));
        assert!(scheduler.is_empty());
        assert_eq!(session.log().len(), before);
        let notice = session.next_notice().unwrap();
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(session.can_request_type());
    }

    #[test]
    fn test_second_type_rejected_while_pending() {
        let mock = MockSerialPort::new("MOCK0");
        let (mut session, scheduler) = session_with(&mock);
        session.connect("MOCK0").unwrap();

        session.request_type("one").unwrap();
        assert_eq!(session.request_type("two"), Err(CommandError::TypePending));
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_disconnect_during_delay_cancels() {
        let mock = MockSerialPort::new("MOCK0");
        let (mut session, scheduler) = session_with(&mock);
        session.connect("MOCK0").unwrap();

        session.request_type("hello").unwrap();
        session.disconnect();
        fire_all(&mut session, &scheduler);

        assert!(mock.get_write_log().is_empty());
        assert_eq!(
            last_message(&session),
            "Typing cancelled. Disconnected during the delay."
        );
        let notice = session.next_notice().unwrap();
        assert_eq!(notice.title, "Cancelled");
        assert!(!session.type_pending());
    }

    #[test]
    fn test_reconnect_during_delay_still_cancels() {
        let mock = MockSerialPort::new("MOCK0");
        let (mut session, scheduler) = session_with(&mock);
        session.connect("MOCK0").unwrap();

        session.request_type("hello").unwrap();
        session.connect("MOCK0").unwrap();
        fire_all(&mut session, &scheduler);

        assert!(mock.get_write_log().is_empty());
        assert!(session.can_request_type());
    }

    #[test]
    fn test_stop_and_status_send_immediately() {
        let mock = MockSerialPort::new("MOCK0");
        let (mut session, scheduler) = session_with(&mock);
        session.connect("MOCK0").unwrap();

        session.request_stop().unwrap();
        session.request_status().unwrap();

        assert!(scheduler.is_empty());
        assert_eq!(
            mock.get_write_log(),
            vec![b"STOP:".to_vec(), b"STATUS:".to_vec()]
        );
        assert_eq!(last_message(&session), "Sending STATUS command.");
    }

    #[test]
    fn test_requests_rejected_when_disconnected() {
        let mock = MockSerialPort::new("MOCK0");
        let (mut session, scheduler) = session_with(&mock);

        assert_eq!(session.request_type("x"), Err(CommandError::NotConnected));
        assert_eq!(session.request_stop(), Err(CommandError::NotConnected));
        assert_eq!(session.request_status(), Err(CommandError::NotConnected));
        assert!(scheduler.is_empty());
        assert!(session.log().is_empty());
        assert!(mock.get_write_log().is_empty());
    }

    #[test]
    fn test_send_failure_notifies_and_disconnects() {
        let mut mock = MockSerialPort::new("MOCK0");
        let (mut session, _scheduler) = session_with(&mock);
        session.connect("MOCK0").unwrap();

        mock.fail_next_write();
        let err = session.request_stop().unwrap_err();
        assert!(matches!(
            err,
            CommandError::Connection(ConnectionError::WriteFailed(_))
        ));
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(session.next_notice().unwrap().level, NoticeLevel::Error);
    }

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(Duration::from_secs(5)), "5");
        assert_eq!(format_secs(Duration::from_millis(1500)), "1.5");
    }
}

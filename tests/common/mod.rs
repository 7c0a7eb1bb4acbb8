//! Shared test utilities for the keyboard controller tests.
//!
//! - A mockall double for the `PortOpener` seam
//! - A harness wiring a `CommandSession` to a `MockSerialPort`
//! - Helpers for draining the control channel

#![allow(dead_code)]

use mockall::mock;
use serial_keyboard_controller::config::Config;
use serial_keyboard_controller::connection::{
    event_channel, ControllerEvent, EventReceiver, EventSender,
};
use serial_keyboard_controller::log::LogOrigin;
use serial_keyboard_controller::port::{
    MockSerialPort, PortConfiguration, PortError, PortOpener, SerialPortAdapter,
};
use serial_keyboard_controller::scheduler::{ManualScheduler, Scheduler, TokioScheduler};
use serial_keyboard_controller::CommandSession;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Opener {}

    impl PortOpener for Opener {
        fn open(
            &self,
            port_name: &str,
            config: &PortConfiguration,
        ) -> Result<Box<dyn SerialPortAdapter>, PortError>;
    }
}

/// Opener that hands out clones of `port` for any name.
pub fn opener_for(port: &MockSerialPort) -> MockOpener {
    let port = port.clone();
    let mut opener = MockOpener::new();
    opener
        .expect_open()
        .returning(move |_, _| Ok(Box::new(port.clone()) as Box<dyn SerialPortAdapter>));
    opener
}

/// Config with the given delays and a fast reader poll.
pub fn config_with(settle: Duration, type_delay: Duration) -> Config {
    let mut config = Config::default();
    config.serial.poll_interval_ms = 2;
    config.session.settle_delay_ms = settle.as_millis() as u64;
    config.session.type_delay_ms = type_delay.as_millis() as u64;
    config
}

/// A controller over a mock device plus the channel it reports into.
pub struct Harness {
    pub controller: CommandSession,
    pub events: EventReceiver,
    pub mock: MockSerialPort,
}

impl Harness {
    /// Build with a tokio-timer scheduler. Must be called inside a runtime.
    pub fn tokio(config: &Config) -> Self {
        let (tx, rx) = event_channel();
        let scheduler = TokioScheduler::try_current(tx.clone()).expect("inside a tokio runtime");
        Self::build(config, Arc::new(scheduler), tx, rx)
    }

    /// Build with a manual scheduler the test drains itself.
    pub fn manual(config: &Config) -> (Self, ManualScheduler) {
        let (tx, rx) = event_channel();
        let scheduler = ManualScheduler::new();
        let harness = Self::build(config, Arc::new(scheduler.clone()), tx, rx);
        (harness, scheduler)
    }

    fn build(
        config: &Config,
        scheduler: Arc<dyn Scheduler>,
        tx: EventSender,
        rx: EventReceiver,
    ) -> Self {
        let mock = MockSerialPort::new("MOCK0");
        let controller =
            CommandSession::from_config(config, Box::new(opener_for(&mock)), scheduler, tx);
        Self {
            controller,
            events: rx,
            mock,
        }
    }

    /// Receive the next event and apply it.
    pub async fn step(&mut self) -> ControllerEvent {
        let event = self.events.recv().await.expect("control channel open");
        self.controller.handle(event.clone());
        event
    }

    /// Apply events until `done` holds, giving up after `limit` of real time.
    ///
    /// Only for events produced by the reader thread; under paused time use
    /// [`Harness::step`].
    pub fn pump_until(&mut self, limit: Duration, done: impl Fn(&CommandSession) -> bool) -> bool {
        let deadline = std::time::Instant::now() + limit;
        while !done(&self.controller) {
            if std::time::Instant::now() >= deadline {
                return false;
            }
            match self.events.try_recv() {
                Ok(event) => self.controller.handle(event),
                Err(_) => std::thread::sleep(Duration::from_millis(2)),
            }
        }
        true
    }

    pub fn log_texts(&self) -> Vec<String> {
        self.controller
            .log()
            .entries()
            .iter()
            .map(|e| e.text())
            .collect()
    }

    pub fn device_lines(&self) -> Vec<String> {
        self.controller
            .log()
            .entries()
            .iter()
            .filter(|e| e.origin() == LogOrigin::Device)
            .map(|e| e.message().to_string())
            .collect()
    }
}

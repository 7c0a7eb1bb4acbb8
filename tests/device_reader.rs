//! Background reader behaviour against a mock device.
//!
//! These run on real time: the reader is an OS thread polling the mock.

mod common;

use common::{config_with, Harness, MockOpener};
use pretty_assertions::assert_eq;
use serial_keyboard_controller::config::Config;
use serial_keyboard_controller::connection::{
    event_channel, ConnectionManager, ConnectionSettings, ConnectionState,
};
use serial_keyboard_controller::port::{MockSerialPort, PortError, SerialPortAdapter};
use serial_keyboard_controller::scheduler::ManualScheduler;
use serial_keyboard_controller::ConnectionError;
use std::sync::Arc;
use std::time::Duration;

const LIMIT: Duration = Duration::from_secs(5);

fn connected() -> Harness {
    let (mut harness, _scheduler) = Harness::manual(&config_with(Duration::ZERO, Duration::ZERO));
    harness.controller.connect("MOCK0").unwrap();
    assert_eq!(harness.controller.state(), ConnectionState::Connected);
    harness
}

#[test]
fn test_lines_arrive_in_order() {
    let mut harness = connected();

    harness.mock.enqueue_read(b"READY\r\nTyping started\n");
    harness.mock.enqueue_read(b"  Typing complete  \r\n");

    assert!(harness.pump_until(LIMIT, |c| c.log().len() >= 4));
    assert_eq!(
        harness.device_lines(),
        vec!["READY", "Typing started", "Typing complete"]
    );
    assert_eq!(
        harness.log_texts().last().map(String::as_str),
        Some("Device: Typing complete")
    );
}

#[test]
fn test_partial_line_waits_for_newline() {
    let mut harness = connected();

    harness.mock.enqueue_read(b"STAT");
    std::thread::sleep(Duration::from_millis(50));
    harness.mock.enqueue_read(b"US: idle\n\n\n");

    assert!(harness.pump_until(LIMIT, |c| c.log().len() >= 2));
    std::thread::sleep(Duration::from_millis(50));
    harness.pump_until(Duration::from_millis(50), |_| false);

    assert_eq!(harness.device_lines(), vec!["STATUS: idle"]);
}

#[test]
fn test_invalid_utf8_is_replaced() {
    let mut harness = connected();

    harness.mock.enqueue_read(b"bad \xff byte\n");

    assert!(harness.pump_until(LIMIT, |c| c.log().len() >= 2));
    assert_eq!(harness.device_lines(), vec!["bad \u{fffd} byte"]);
}

#[test]
fn test_unplugged_device_tears_down_once() {
    let mut harness = connected();

    harness.mock.set_disconnected(true);
    assert!(harness.pump_until(LIMIT, |c| c.state() == ConnectionState::Disconnected));

    // anything still queued must not produce more entries
    harness.pump_until(Duration::from_millis(50), |_| false);
    assert_eq!(
        harness.log_texts(),
        vec![
            "Connected to MOCK0.",
            "Serial port disconnected or read error.",
            "Disconnected from MOCK0",
        ]
    );
    assert_eq!(
        harness.controller.request_status(),
        Err(serial_keyboard_controller::CommandError::NotConnected)
    );
}

#[test]
fn test_no_entries_after_disconnect() {
    let mut harness = connected();

    harness.controller.disconnect();
    harness.mock.enqueue_read(b"late line\n");
    std::thread::sleep(Duration::from_millis(30));
    harness.pump_until(Duration::from_millis(50), |_| false);

    assert_eq!(
        harness.log_texts().last().map(String::as_str),
        Some("Disconnected from MOCK0")
    );
    assert!(harness.device_lines().is_empty());
}

#[test]
fn test_opener_receives_configured_baud_rate() {
    let mock = MockSerialPort::new("COM7");
    let port = mock.clone();
    let mut opener = MockOpener::new();
    opener
        .expect_open()
        .withf(|name, config| name.to_string() == "COM7" && config.baud_rate == 115_200)
        .times(1)
        .returning(move |_, _| Ok(Box::new(port.clone()) as Box<dyn SerialPortAdapter>));

    let (tx, _rx) = event_channel();
    let settings = ConnectionSettings {
        settle_delay: Duration::ZERO,
        ..ConnectionSettings::from_config(&Config::default())
    };
    let mut manager = ConnectionManager::new(
        Box::new(opener),
        settings,
        Arc::new(ManualScheduler::new()),
        tx,
    );

    manager.connect("  COM7 ").unwrap();
    assert_eq!(manager.port_name(), Some("COM7"));
}

#[test]
fn test_open_error_text_is_preserved() {
    let mut opener = MockOpener::new();
    opener
        .expect_open()
        .returning(|_, _| Err(PortError::config("Access is denied.")));

    let (tx, _rx) = event_channel();
    let mut manager = ConnectionManager::new(
        Box::new(opener),
        ConnectionSettings::default(),
        Arc::new(ManualScheduler::new()),
        tx,
    );

    let err = manager.connect("COM3").unwrap_err();
    assert!(matches!(err, ConnectionError::OpenFailed { .. }));
    assert!(err.to_string().contains("Access is denied."));
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[test]
fn test_connecting_twice_uses_a_fresh_port() {
    let mock = MockSerialPort::new("MOCK0");
    let (tx, _rx) = event_channel();
    let mut opener = MockOpener::new();
    let port = mock.clone();
    opener
        .expect_open()
        .times(2)
        .returning(move |_, _| Ok(Box::new(port.clone()) as Box<dyn SerialPortAdapter>));

    let settings = ConnectionSettings {
        settle_delay: Duration::ZERO,
        poll_interval: Duration::from_millis(2),
        ..ConnectionSettings::default()
    };
    let mut manager =
        ConnectionManager::new(Box::new(opener), settings, Arc::new(ManualScheduler::new()), tx);

    manager.connect("MOCK0").unwrap();
    manager.connect("MOCK0").unwrap();
    assert!(manager.is_connected());
}

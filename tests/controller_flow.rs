//! End-to-end controller behaviour with the tokio scheduler.
//!
//! Time is paused, so the settle and typing delays are observed on the tokio
//! clock without the tests actually waiting.

mod common;

use common::{config_with, Harness};
use pretty_assertions::assert_eq;
use serial_keyboard_controller::connection::{ConnectionState, ControllerEvent};
use serial_keyboard_controller::log::NoticeLevel;
use serial_keyboard_controller::CommandError;
use std::time::Duration;
use tokio::time::Instant;

const SETTLE: Duration = Duration::from_secs(2);
const TYPE_DELAY: Duration = Duration::from_secs(5);

async fn connected_harness() -> Harness {
    let mut harness = Harness::tokio(&config_with(SETTLE, TYPE_DELAY));
    harness.controller.connect("MOCK0").unwrap();
    assert_eq!(harness.controller.state(), ConnectionState::Connecting);

    let started = Instant::now();
    let event = harness.step().await;
    assert!(matches!(event, ControllerEvent::SettleElapsed { .. }));
    assert!(started.elapsed() >= SETTLE);
    assert_eq!(harness.controller.state(), ConnectionState::Connected);
    harness
}

#[tokio::test(start_paused = true)]
async fn test_connect_waits_for_settle() {
    let harness = connected_harness().await;
    assert_eq!(
        harness.log_texts(),
        vec!["Connecting to MOCK0, please wait...", "Connected to MOCK0."]
    );
}

#[tokio::test(start_paused = true)]
async fn test_type_is_sent_after_delay() {
    let mut harness = connected_harness().await;

    harness.controller.request_type("hi").unwrap();
    let requested = Instant::now();
    assert!(harness.mock.get_write_log().is_empty());

    let event = harness.step().await;
    assert!(matches!(event, ControllerEvent::TypeDue(_)));
    assert!(requested.elapsed() >= TYPE_DELAY);

    assert_eq!(harness.mock.written_bytes(), b"TYPE:2:hi");
    let log = harness.log_texts();
    assert_eq!(
        &log[2..],
        &[
            "Request received. Typing will start in 5 seconds...",
            "Sending TYPE command with length 2.",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_delay_cancels_type() {
    let mut harness = connected_harness().await;

    harness.controller.request_type("hello").unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    harness.controller.disconnect();

    harness.step().await;

    assert!(harness.mock.get_write_log().is_empty());
    assert_eq!(
        harness.log_texts().last().map(String::as_str),
        Some("Typing cancelled. Disconnected during the delay.")
    );
    let notice = harness.controller.next_notice().unwrap();
    assert_eq!(notice.level, NoticeLevel::Warning);
    assert_eq!(notice.title, "Cancelled");
}

#[tokio::test(start_paused = true)]
async fn test_stop_and_status_bypass_delay() {
    let mut harness = connected_harness().await;

    harness.controller.request_type("long text").unwrap();
    harness.controller.request_stop().unwrap();
    harness.controller.request_status().unwrap();
    assert_eq!(harness.mock.written_bytes(), b"STOP:STATUS:");

    // the pending TYPE still fires afterwards
    harness.step().await;
    assert_eq!(
        harness.mock.get_write_log().last().map(Vec::as_slice),
        Some(&b"TYPE:9:long text"[..])
    );
}

#[tokio::test(start_paused = true)]
async fn test_only_one_type_pending() {
    let mut harness = connected_harness().await;

    harness.controller.request_type("a").unwrap();
    assert_eq!(
        harness.controller.request_type("b"),
        Err(CommandError::TypePending)
    );

    harness.step().await;
    assert_eq!(harness.mock.written_bytes(), b"TYPE:1:a");
    harness.controller.request_type("b").unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_connecting() {
    let mut harness = Harness::tokio(&config_with(SETTLE, TYPE_DELAY));
    harness.controller.connect("MOCK0").unwrap();
    harness.controller.disconnect();

    harness.step().await;

    assert_eq!(harness.controller.state(), ConnectionState::Disconnected);
    assert_eq!(
        harness.log_texts(),
        vec!["Connecting to MOCK0, please wait...", "Disconnected from MOCK0"]
    );
}

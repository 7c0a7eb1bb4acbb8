//! Terminal input for the TUI.
//!
//! crossterm's reader is blocking, so a dedicated thread polls it and feeds
//! a tokio channel that the app loop selects on next to the controller
//! channel.

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::warn;

/// Terminal events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Redraw tick (keeps the uptime display current)
    Tick,
    /// Key press
    Key(KeyEvent),
    /// Terminal resize
    Resize(u16, u16),
    /// Reading the terminal failed
    Error(String),
}

/// Polls crossterm on a background thread.
pub struct EventHandler {
    receiver: mpsc::UnboundedReceiver<Event>,
    stop: Arc<AtomicBool>,
    handler: Option<thread::JoinHandle<()>>,
}

impl EventHandler {
    /// Start polling, emitting a [`Event::Tick`] every `tick_rate`.
    pub fn new(tick_rate: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let handler = thread::Builder::new()
            .name("tui-input".into())
            .spawn(move || {
                let mut last_tick = Instant::now();
                while !thread_stop.load(Ordering::Relaxed) {
                    let timeout = tick_rate
                        .checked_sub(last_tick.elapsed())
                        .unwrap_or(Duration::ZERO);

                    if event::poll(timeout).unwrap_or(false) {
                        let forwarded = match event::read() {
                            // Windows reports releases too
                            Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                                Some(Event::Key(key))
                            }
                            Ok(CrosstermEvent::Resize(w, h)) => Some(Event::Resize(w, h)),
                            Ok(_) => None,
                            Err(e) => Some(Event::Error(e.to_string())),
                        };
                        if let Some(ev) = forwarded {
                            if sender.send(ev).is_err() {
                                break;
                            }
                        }
                    }

                    if last_tick.elapsed() >= tick_rate {
                        if sender.send(Event::Tick).is_err() {
                            break;
                        }
                        last_tick = Instant::now();
                    }
                }
            });

        let handler = match handler {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "failed to spawn terminal input thread");
                None
            }
        };

        Self {
            receiver,
            stop,
            handler,
        }
    }

    /// Wait for the next terminal event. `None` once the input thread is gone.
    pub async fn next(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handler.take() {
            let _ = handle.join();
        }
    }
}

//! Deferred continuations for the control thread.
//!
//! Delays (the post-open settle, the grace period before typing) are never
//! slept on the control thread. Instead an event is scheduled and comes back
//! through the same channel as the reader's output, so the control loop stays
//! responsive and every state change happens in one place.

use crate::connection::{ControllerEvent, EventSender};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Delivers a [`ControllerEvent`] back to the control loop after a delay.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, event: ControllerEvent);
}

/// Tokio-timer backed scheduler feeding the control channel.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    events: EventSender,
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    /// Bind to the runtime the caller is running on.
    ///
    /// Returns `None` outside a tokio runtime.
    pub fn try_current(events: EventSender) -> Option<Self> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        Some(Self { events, handle })
    }

    pub fn with_handle(events: EventSender, handle: tokio::runtime::Handle) -> Self {
        Self { events, handle }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, event: ControllerEvent) {
        debug!(?delay, ?event, "scheduling continuation");
        let events = self.events.clone();
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(event).is_err() {
                warn!("control loop gone before scheduled event fired");
            }
        });
    }
}

/// Scheduler that only records what was asked of it.
///
/// Tests pull the recorded events and feed them to the controller by hand,
/// which makes "after the delay" an explicit step.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    queue: Arc<Mutex<Vec<(Duration, ControllerEvent)>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything scheduled so far, in scheduling order.
    pub fn take(&self) -> Vec<(Duration, ControllerEvent)> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(Duration, ControllerEvent)>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, event: ControllerEvent) {
        self.lock().push((delay, event));
    }
}

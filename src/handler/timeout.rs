//! Per-request timeout
//!
//! `Unarmed -> Armed -> {Fired, Cancelled}`. Both terminal transitions are
//! compare-and-swap from `Armed`, so the timer and the response writer cannot
//! both win.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::dispatcher::TimeoutCallback;
use crate::http::{Request, ResponseWriter};

const UNARMED: u8 = 0;
const ARMED: u8 = 1;
const FIRED: u8 = 2;
const CANCELLED: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutState {
    Unarmed,
    Armed,
    Fired,
    Cancelled,
}

#[derive(Default)]
struct Inner {
    state: AtomicU8,
    deadline: Mutex<Option<Instant>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Shared timeout state; the response writer holds one to cancel on completion
#[derive(Clone, Default)]
pub struct TimeoutController {
    inner: Arc<Inner>,
}

impl TimeoutController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TimeoutState {
        match self.inner.state.load(Ordering::SeqCst) {
            UNARMED => TimeoutState::Unarmed,
            ARMED => TimeoutState::Armed,
            FIRED => TimeoutState::Fired,
            _ => TimeoutState::Cancelled,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        *self
            .inner
            .deadline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Unarmed -> Armed. Returns false if the controller was already armed.
    pub(crate) fn try_arm(&self, deadline: Instant) -> bool {
        if self.transition(UNARMED, ARMED) {
            *self
                .inner
                .deadline
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(deadline);
            true
        } else {
            false
        }
    }

    fn set_timer(&self, handle: JoinHandle<()>) {
        let mut timer = self
            .inner
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Completion may have slipped in between arming and spawning
        if self.state() == TimeoutState::Cancelled {
            handle.abort();
        } else {
            *timer = Some(handle);
        }
    }

    /// Armed -> Cancelled, de-scheduling the timer. No-op unless armed.
    pub fn cancel(&self) -> bool {
        if !self.transition(ARMED, CANCELLED) {
            return false;
        }
        if let Some(handle) = self
            .inner
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        true
    }

    /// Armed -> Fired
    fn try_fire(&self) -> bool {
        self.transition(ARMED, FIRED)
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.inner
            .state
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Handle given to route handlers for arming the request deadline
pub struct Timeout {
    controller: TimeoutController,
    request: Arc<Request>,
    writer: ResponseWriter,
    on_timeout: TimeoutCallback,
}

impl Timeout {
    pub(crate) fn new(
        request: Arc<Request>,
        writer: ResponseWriter,
        on_timeout: TimeoutCallback,
    ) -> Self {
        Self {
            controller: writer.timeout_controller().clone(),
            request,
            writer,
            on_timeout,
        }
    }

    /// Arm the deadline. Must be called from within the tokio runtime.
    ///
    /// A second call is ignored and the first deadline stays in force.
    pub fn arm(&self, duration: Duration) {
        if self.writer.is_complete() {
            tracing::debug!(path = self.request.path(), "response already complete, not arming timeout");
            return;
        }

        let deadline = tokio::time::Instant::now() + duration;
        if !self.controller.try_arm(deadline.into_std()) {
            let remaining = self
                .controller
                .deadline()
                .map(|first| first.saturating_duration_since(Instant::now()));
            tracing::warn!(
                path = self.request.path(),
                "timeout already armed ({remaining:?} left), ignoring second arm({duration:?})"
            );
            return;
        }
        // A send that completed between the check above and the arm saw nothing to cancel
        if self.writer.is_complete() {
            self.controller.cancel();
            return;
        }

        let controller = self.controller.clone();
        let request = Arc::clone(&self.request);
        let writer = self.writer.clone();
        let on_timeout = Arc::clone(&self.on_timeout);
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if controller.try_fire() {
                tracing::debug!(path = request.path(), "request timed out");
                on_timeout(request.as_ref(), &writer);
            }
        });
        self.controller.set_timer(handle);
    }

    #[cfg(test)]
    pub fn state(&self) -> TimeoutState {
        self.controller.state()
    }
}

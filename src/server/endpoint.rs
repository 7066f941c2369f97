// Endpoint module
// Bound state and load accounting for the listening socket

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::monitor::{LoadSnapshot, LoadSource};

/// The listening endpoint as seen by the load monitor
pub struct Endpoint {
    local_addr: Mutex<Option<SocketAddr>>,
    bound: AtomicBool,
    workers: usize,
    started: Instant,
    busy_nanos: AtomicU64,
    requests: AtomicU64,
}

impl Endpoint {
    pub fn new(workers: usize) -> Self {
        Self {
            local_addr: Mutex::new(None),
            bound: AtomicBool::new(false),
            workers: workers.max(1),
            started: Instant::now(),
            busy_nanos: AtomicU64::new(0),
            requests: AtomicU64::new(0),
        }
    }

    pub fn mark_bound(&self, addr: SocketAddr) {
        *self
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(addr);
        self.bound.store(true, Ordering::Release);
    }

    pub fn mark_unbound(&self) {
        self.bound.store(false, Ordering::Release);
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Account one dispatched request and the time its handler kept a worker busy
    pub fn record_request(&self, busy: Duration) {
        let nanos = u64::try_from(busy.as_nanos()).unwrap_or(u64::MAX);
        self.busy_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

impl LoadSource for Endpoint {
    fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Acquire)
    }

    fn request_load(&self, previous: &LoadSnapshot) -> LoadSnapshot {
        let now = Instant::now();
        let busy = Duration::from_nanos(self.busy_nanos.load(Ordering::Relaxed));
        let elapsed = now.duration_since(previous.at.unwrap_or(self.started));

        #[allow(clippy::cast_precision_loss)]
        let capacity = elapsed.as_secs_f64() * self.workers as f64;
        let global = if capacity > 0.0 {
            busy.saturating_sub(previous.busy).as_secs_f64() / capacity * 100.0
        } else {
            0.0
        };

        LoadSnapshot {
            at: Some(now),
            busy,
            requests: self.requests(),
            global,
        }
    }
}

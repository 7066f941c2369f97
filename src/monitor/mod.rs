//! Load monitor
//!
//! Periodically asks the endpoint for a load snapshot and logs the global load.
//! The monitor only holds a `Weak` reference, so it never keeps the endpoint
//! alive; once the endpoint is dropped the loop ends on its own.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::logger;
use crate::server::signal::Shutdown;

/// One load sample. `global` is a percentage of the worker pool's capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadSnapshot {
    pub at: Option<Instant>,
    /// Handler busy time accumulated since startup
    pub busy: Duration,
    /// Requests served since startup
    pub requests: u64,
    pub global: f64,
}

/// Read-only load query implemented by the transport engine
pub trait LoadSource: Send + Sync {
    fn is_bound(&self) -> bool;

    /// Compute a new snapshot relative to `previous`
    fn request_load(&self, previous: &LoadSnapshot) -> LoadSnapshot;
}

/// Render a load percentage for the log line
pub fn format_load(global: f64) -> String {
    if global.is_nan() || global <= 1.0 {
        "0%".to_string()
    } else {
        format!("{:.1}%", global.min(100.0))
    }
}

pub struct LoadMonitor {
    source: Weak<dyn LoadSource>,
    interval: Duration,
    shutdown: Arc<Shutdown>,
}

impl LoadMonitor {
    pub fn new(source: Weak<dyn LoadSource>, interval: Duration, shutdown: Arc<Shutdown>) -> Self {
        Self {
            source,
            interval,
            shutdown,
        }
    }

    /// Spawn the sampling loop. Await the handle after shutdown to join it.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut previous = LoadSnapshot::default();

        while !self.shutdown.is_requested() {
            let Some(source) = self.source.upgrade() else {
                tracing::debug!("load source dropped, stopping monitor");
                break;
            };

            if source.is_bound() {
                let load = source.request_load(&previous);
                logger::log_load(&format_load(load.global));
                previous = load;
            }
            drop(source);

            tokio::select! {
                () = tokio::time::sleep(self.interval) => {}
                () = self.shutdown.wait() => break,
            }
        }
        tracing::debug!("load monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockSource {
        bound: AtomicBool,
        samples: AtomicUsize,
    }

    impl LoadSource for MockSource {
        fn is_bound(&self) -> bool {
            self.bound.load(Ordering::SeqCst)
        }

        fn request_load(&self, previous: &LoadSnapshot) -> LoadSnapshot {
            self.samples.fetch_add(1, Ordering::SeqCst);
            LoadSnapshot {
                at: Some(Instant::now()),
                requests: previous.requests + 1,
                ..LoadSnapshot::default()
            }
        }
    }

    fn monitor_for(source: &Arc<MockSource>, shutdown: &Arc<Shutdown>) -> LoadMonitor {
        let as_dyn: Arc<dyn LoadSource> = source.clone();
        let weak = Arc::downgrade(&as_dyn);
        LoadMonitor::new(weak, Duration::from_millis(10), Arc::clone(shutdown))
    }

    #[test]
    fn test_format_load() {
        assert_eq!(format_load(0.0), "0%");
        assert_eq!(format_load(1.0), "0%");
        assert_eq!(format_load(f64::NAN), "0%");
        assert_eq!(format_load(42.5), "42.5%");
        assert_eq!(format_load(250.0), "100.0%");
    }

    #[tokio::test]
    async fn test_samples_while_bound_and_stops_on_shutdown() {
        let source = Arc::new(MockSource::default());
        source.bound.store(true, Ordering::SeqCst);
        let shutdown = Arc::new(Shutdown::new());
        let handle = monitor_for(&source, &shutdown).start();

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(source.samples.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_unbound_source_is_skipped() {
        let source = Arc::new(MockSource::default());
        let shutdown = Arc::new(Shutdown::new());
        let handle = monitor_for(&source, &shutdown).start();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(source.samples.load(Ordering::SeqCst), 0);
        shutdown.trigger();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_exits_when_source_dropped() {
        let source = Arc::new(MockSource::default());
        let shutdown = Arc::new(Shutdown::new());
        let handle = monitor_for(&source, &shutdown).start();
        drop(source);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(!shutdown.is_requested());
    }
}

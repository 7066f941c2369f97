//! Logger module
//!
//! Provides logging utilities for the HTTP server including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Error and warning logging
//!
//! Everything is emitted through `tracing`; `init` installs the fmt subscriber.

mod format;

pub use format::AccessLogEntry;

use crate::config::Config;
use std::io;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Initialize the logger with configuration
///
/// Should be called once at application startup. `RUST_LOG` takes precedence
/// over `logging.level`.
pub fn init(config: &Config) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e))
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!("======================================");
    tracing::info!("Stats server started successfully");
    tracing::info!("Listening on: http://{addr}");
    tracing::info!("Cores = {}", std::thread::available_parallelism().map_or(1, usize::from));
    tracing::info!("Using {} threads", config.server.workers);
    tracing::info!("Log level: {}", config.logging.level);
    if config.monitor.enabled {
        tracing::info!("Load monitor interval: {}s", config.monitor.interval_secs);
    }
    tracing::info!("======================================");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    tracing::debug!(peer = %peer_addr, "[Connection] Accepted");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!("[ERROR] Failed to serve connection: {err:?}");
}

pub fn log_error(message: &str) {
    tracing::error!("[ERROR] {message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("[WARN] {message}");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: "access", "{}", entry.format(format));
}

pub fn log_handler_failure(
    method: &str,
    path: &str,
    route: &str,
    peer: Option<SocketAddr>,
    err: &dyn std::fmt::Display,
) {
    let peer = peer.map_or_else(|| "-".to_string(), |addr| addr.to_string());
    tracing::error!(method, path, route, peer, "An error occurred in handler: {err}");
}

pub fn log_routes(count: usize) {
    tracing::info!("Registered {count} routes");
}

pub fn log_load(load: &str) {
    tracing::info!("Global load is {load}");
}

pub fn log_signal(name: &str) {
    tracing::info!("[SIGNAL] {name} received, initiating graceful shutdown");
}

pub fn log_shutdown(metric_count: usize) {
    tracing::info!("Shutting down server ({metric_count} metrics recorded)");
}

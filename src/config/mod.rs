// Configuration module entry point
// Layers the config file, environment and command line into one Config

mod state;
mod types;

use std::net::SocketAddr;
use std::time::Duration;

use crate::cli::Args;
use crate::error::ServerError;

// Re-export public types
pub use state::AppState;
pub use types::Config;

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            // STATS_SERVER__PORT -> server.port
            .add_source(
                config::Environment::with_prefix("STATS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 9080)?
            .set_default("server.workers", 2)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "common")?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "lys")?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("monitor.enabled", true)?
            .set_default("monitor.interval_secs", 1)?
            .set_default("routes.static_file", "README.md")?
            .set_default("routes.ping_timeout_secs", 2)?
            .set_default("routes.timeout_secs", 5)?
            .build()?;

        settings.try_deserialize()
    }

    /// Load the layered configuration, then apply the positional overrides.
    pub fn load(args: &Args) -> Result<Self, ServerError> {
        let mut cfg = Self::load_from(&args.config)?;
        cfg.apply_args(args);
        Ok(cfg)
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(threads) = args.threads {
            self.server.workers = threads;
        }
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, ServerError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ServerError::InvalidAddress(format!("{}:{} ({e})", self.server.host, self.server.port)))
    }

    /// Deadline applied to a whole connection
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(std::cmp::max(
            self.performance.read_timeout,
            self.performance.write_timeout,
        ))
    }

    pub const fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.interval_secs)
    }
}

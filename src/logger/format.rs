//! Access log format module
//!
//! Supported formats:
//! - `common` (Common Log Format - CLF)
//! - `combined` (CLF plus user agent)
//! - `json` (one JSON object per line)

use chrono::{DateTime, Local};
use serde::Serialize;

/// One served request, as written to the access log
#[derive(Debug, Clone, Serialize)]
pub struct AccessLogEntry {
    pub remote_addr: String,
    pub time: DateTime<Local>,
    pub method: String,
    pub path: String,
    /// Query string (without leading ?)
    pub query: Option<String>,
    pub status: u16,
    /// `None` for streamed bodies, whose size is not known up front
    pub body_bytes: Option<u64>,
    pub user_agent: Option<String>,
    pub request_time_us: u64,
}

impl AccessLogEntry {
    /// Create a new access log entry with current timestamp
    pub fn new(remote_addr: String, method: String, path: String) -> Self {
        Self {
            remote_addr,
            time: Local::now(),
            method,
            path,
            query: None,
            status: 200,
            body_bytes: None,
            user_agent: None,
            request_time_us: 0,
        }
    }

    /// Format the entry; unknown format names fall back to `common`
    pub fn format(&self, format: &str) -> String {
        match format {
            "combined" => self.format_combined(),
            "json" => self.format_json(),
            _ => self.format_common(),
        }
    }

    fn request_line(&self) -> String {
        match &self.query {
            Some(q) => format!("{} {}?{} HTTP/1.1", self.method, self.path, q),
            None => format!("{} {} HTTP/1.1", self.method, self.path),
        }
    }

    fn bytes_field(&self) -> String {
        self.body_bytes
            .map_or_else(|| "-".to_string(), |b| b.to_string())
    }

    /// `$remote_addr - - [$time_local] "$request" $status $body_bytes_sent`
    fn format_common(&self) -> String {
        format!(
            "{} - - [{}] \"{}\" {} {}",
            self.remote_addr,
            self.time.format("%d/%b/%Y:%H:%M:%S %z"),
            self.request_line(),
            self.status,
            self.bytes_field(),
        )
    }

    fn format_combined(&self) -> String {
        format!(
            "{} \"{}\" {}us",
            self.format_common(),
            self.user_agent.as_deref().unwrap_or("-"),
            self.request_time_us,
        )
    }

    fn format_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"error":"failed to encode access log entry: {e}"}}"#)
        })
    }
}

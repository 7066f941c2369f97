//! Error types shared across the service.

use thiserror::Error;

/// Misuse of a response writer or stream handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    #[error("response already complete")]
    AlreadyComplete,
    #[error("response is being streamed")]
    Streaming,
    #[error("stream already ended")]
    StreamEnded,
    #[error("headers already sent")]
    HeadersSent,
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("client disconnected")]
    Disconnected,
}

/// Failure raised by a route handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Response(#[from] ResponseError),
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("duplicate route: {method} {pattern}")]
    DuplicateRoute { method: String, pattern: String },
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },
}

/// Startup and serving failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

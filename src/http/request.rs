//! Decoded request handed to route handlers

use http_body_util::{BodyExt, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::{Method, Response};
use std::net::SocketAddr;

use super::response::{self, ResponseBody};
use crate::logger;
use crate::routing::Params;

/// Parsed query string; keys without `=` are flags with an empty value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn parse(raw: &str) -> Self {
        let pairs = raw
            .split('&')
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (part.to_string(), String::new()),
            })
            .collect();
        Self { pairs }
    }

    pub fn has(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Query,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    params: Params,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Query::default(),
            body: Bytes::new(),
            remote_addr: None,
            params: Params::default(),
        }
    }

    #[must_use]
    pub fn with_query(mut self, raw: &str) -> Self {
        self.query = Query::parse(raw);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub const fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Decode a hyper request, buffering at most `max_body_size` bytes of body.
    ///
    /// Returns the response to send instead when the body is rejected.
    pub async fn from_hyper(
        req: hyper::Request<Incoming>,
        remote_addr: SocketAddr,
        max_body_size: u64,
    ) -> Result<Self, Response<ResponseBody>> {
        if let Some(resp) = check_body_size(&req, max_body_size) {
            return Err(resp);
        }

        let (parts, body) = req.into_parts();
        let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
        let body = match Limited::new(body, limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                if e.is::<http_body_util::LengthLimitError>() {
                    logger::log_error(&format!(
                        "Request body too large (max: {max_body_size})"
                    ));
                    return Err(response::build_413_response());
                }
                logger::log_warning(&format!("Failed to read request body: {e}"));
                return Err(response::build_400_response());
            }
        };

        let mut request = Self::new(parts.method, parts.uri.path())
            .with_body(body)
            .with_remote_addr(remote_addr);
        if let Some(raw) = parts.uri.query() {
            request = request.with_query(raw);
        }
        Ok(request)
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn query(&self) -> &Query {
        &self.query
    }

    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Route parameter captured by the router
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub(crate) fn set_params(&mut self, params: Params) {
        self.params = params;
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(
    req: &hyper::Request<Incoming>,
    max_body_size: u64,
) -> Option<Response<ResponseBody>> {
    let content_length = req.headers().get(hyper::header::CONTENT_LENGTH)?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(response::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

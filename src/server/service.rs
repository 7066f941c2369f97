// Request service module
// Bridges hyper requests to the dispatcher and writes the access log

use hyper::body::{Body, Incoming};
use hyper::header::{HeaderValue, SERVER, USER_AGENT};
use hyper::Response;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use super::endpoint::Endpoint;
use crate::config::AppState;
use crate::handler::{DispatchOutcome, Dispatcher};
use crate::http::{build_404_response, build_500_response, Request, ResponseBody, ResponseWriter};
use crate::logger::{self, AccessLogEntry};

/// Everything a connection needs to serve requests
pub struct ServiceContext {
    pub state: Arc<AppState>,
    pub dispatcher: Dispatcher,
    pub endpoint: Arc<Endpoint>,
    server_header: Option<HeaderValue>,
}

impl ServiceContext {
    pub fn new(state: Arc<AppState>, dispatcher: Dispatcher, endpoint: Arc<Endpoint>) -> Self {
        let server_header = match HeaderValue::from_str(&state.config.http.server_name) {
            Ok(value) => Some(value),
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid server name '{}', Server header disabled",
                    state.config.http.server_name
                ));
                None
            }
        };
        Self {
            state,
            dispatcher,
            endpoint,
            server_header,
        }
    }
}

/// Serve one request
pub async fn handle_request(
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
    ctx: Arc<ServiceContext>,
) -> Result<Response<ResponseBody>, Infallible> {
    let start = Instant::now();
    let access_log = ctx.state.cached_access_log.load(Ordering::Relaxed);
    let mut entry = access_log.then(|| access_entry(&req, remote_addr));

    let mut response = match Request::from_hyper(req, remote_addr, ctx.state.config.http.max_body_size).await {
        Ok(request) => dispatch(&ctx, request).await,
        Err(rejected) => rejected,
    };

    if let Some(value) = &ctx.server_header {
        response
            .headers_mut()
            .entry(SERVER)
            .or_insert_with(|| value.clone());
    }

    if let Some(entry) = entry.as_mut() {
        entry.status = response.status().as_u16();
        entry.body_bytes = response.body().size_hint().exact();
        entry.request_time_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(entry, &ctx.state.config.logging.access_log_format);
    }

    Ok(response)
}

async fn dispatch(ctx: &ServiceContext, request: Request) -> Response<ResponseBody> {
    let (writer, rx) = ResponseWriter::channel();

    let busy = Instant::now();
    let outcome = ctx.dispatcher.dispatch(request, writer);
    ctx.endpoint.record_request(busy.elapsed());

    if outcome == DispatchOutcome::Unmatched {
        return build_404_response();
    }

    // Resolves once the handler, its background task or the timeout responds
    match rx.await {
        Ok(response) => response,
        Err(_) => {
            logger::log_error("Request finished without a response");
            build_500_response()
        }
    }
}

fn access_entry(req: &hyper::Request<Incoming>, remote_addr: SocketAddr) -> AccessLogEntry {
    let mut entry = AccessLogEntry::new(
        remote_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(str::to_string);
    entry.user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    entry
}

// Connection handling module
// Accepts a single TCP connection and serves it on its own task

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;

use super::service::{handle_request, ServiceContext};
use crate::logger;

/// Accept a connection, enforcing `performance.max_connections`.
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: &Arc<ServiceContext>,
    conn_counter: &Arc<AtomicUsize>,
) {
    // Increment first, then check, so concurrent accepts cannot both slip under the limit
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = ctx.state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
            ));
            drop(stream);
            return;
        }
    }

    if ctx.state.cached_access_log.load(Ordering::Relaxed) {
        logger::log_connection_accepted(&peer_addr);
    }

    handle_connection(stream, peer_addr, Arc::clone(ctx), Arc::clone(conn_counter));
}

/// Serve HTTP/1.1 on `stream` until the client goes away or the connection
/// deadline passes, then release the connection slot.
fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: Arc<ServiceContext>,
    conn_counter: Arc<AtomicUsize>,
) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);
        let timeout_duration = ctx.state.config.connection_timeout();

        let mut builder = http1::Builder::new();
        builder.keep_alive(ctx.state.config.performance.keep_alive);

        let service_ctx = Arc::clone(&ctx);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| handle_request(req, peer_addr, Arc::clone(&service_ctx))),
        );

        match tokio::time::timeout(timeout_duration, conn).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => logger::log_warning(&format!(
                "Connection from {peer_addr} timed out after {} seconds",
                timeout_duration.as_secs()
            )),
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}

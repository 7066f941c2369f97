// Server loop module
// Accepts connections until shutdown is requested

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use super::service::ServiceContext;
use super::signal::Shutdown;
use crate::logger;

/// Run the accept loop. Returns once `shutdown` is triggered.
///
/// Connections already being served keep running on their own tasks.
pub async fn run_accept_loop(
    listener: TcpListener,
    ctx: Arc<ServiceContext>,
    shutdown: Arc<Shutdown>,
) {
    let active_connections = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &ctx, &active_connections);
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            () = shutdown.wait() => break,
        }
    }
}

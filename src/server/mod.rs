// Server module entry point
// Binds the listener, serves connections and exposes the endpoint to the load monitor

pub mod connection;
pub mod endpoint;
pub mod listener;
pub mod service;
pub mod signal;

// `loop` is a keyword, so the module is named server_loop
#[path = "loop.rs"]
pub mod server_loop;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub use endpoint::Endpoint;
pub use listener::create_listener;
pub use service::ServiceContext;
pub use signal::{start_signal_handler, Shutdown};

use crate::config::AppState;
use crate::error::ServerError;
use crate::handler;
use crate::logger;

/// The HTTP service: owns the endpoint and the dispatcher
pub struct Server {
    ctx: Arc<ServiceContext>,
    shutdown: Arc<Shutdown>,
}

impl Server {
    pub fn new(state: Arc<AppState>, shutdown: Arc<Shutdown>) -> Result<Self, ServerError> {
        let dispatcher = handler::build_dispatcher(&state)?;
        logger::log_routes(dispatcher.routes());
        let endpoint = Arc::new(Endpoint::new(state.config.server.workers));
        Ok(Self {
            ctx: Arc::new(ServiceContext::new(state, dispatcher, endpoint)),
            shutdown,
        })
    }

    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.ctx.endpoint
    }

    /// Bind the listening socket and mark the endpoint bound
    pub fn bind(&self, addr: SocketAddr) -> Result<TcpListener, ServerError> {
        let listener = create_listener(addr)?;
        self.ctx.endpoint.mark_bound(listener.local_addr()?);
        Ok(listener)
    }

    /// Accept connections until shutdown, then mark the endpoint unbound
    pub async fn serve(&self, listener: TcpListener) {
        server_loop::run_accept_loop(listener, Arc::clone(&self.ctx), Arc::clone(&self.shutdown)).await;
        self.ctx.endpoint.mark_unbound();
    }
}

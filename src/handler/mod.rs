//! Request handler module
//!
//! Route handlers are closures capturing the state they need. `build_dispatcher`
//! wires the built-in endpoints into a router.

pub mod dispatcher;
pub mod timeout;

mod endpoints;
mod stats;

use std::sync::Arc;

pub use dispatcher::{default_timeout_callback, DispatchOutcome, Dispatcher, HandlerFn};
pub use timeout::Timeout;

use crate::config::AppState;
use crate::error::{HandlerError, RouterError};
use crate::http::{Request, ResponseWriter};
use crate::routing::Router;

/// Box a closure as a [`HandlerFn`]
pub fn handler<F>(f: F) -> HandlerFn
where
    F: Fn(&Request, &ResponseWriter, &Timeout) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Register every built-in route
pub fn build_dispatcher(state: &Arc<AppState>) -> Result<Dispatcher, RouterError> {
    let mut router = Router::new();
    router.get("/ping", endpoints::ping(state))?;
    router.post("/echo", endpoints::echo())?;
    router.any("/exception", endpoints::exception())?;
    router.any("/timeout", endpoints::timeout(state))?;
    router.get("/static", endpoints::static_file(state))?;
    router.post("/record/:name", stats::record(state))?;
    router.get("/value/:name", stats::value(state))?;

    Ok(Dispatcher::new(router, default_timeout_callback()))
}

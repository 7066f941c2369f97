//! Request dispatch module
//!
//! Looks up the route, runs the handler on the calling task, and keeps handler
//! failures from reaching the transport engine.

use hyper::StatusCode;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::timeout::Timeout;
use crate::error::{HandlerError, ResponseError};
use crate::http::{Request, ResponseState, ResponseWriter};
use crate::logger;
use crate::routing::Router;

/// Route handler: a closure capturing whatever state it needs
pub type HandlerFn =
    Arc<dyn Fn(&Request, &ResponseWriter, &Timeout) -> Result<(), HandlerError> + Send + Sync>;

/// Produces the fallback response once an armed timeout fires
pub type TimeoutCallback = Arc<dyn Fn(&Request, &ResponseWriter) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler ran to completion (it may still respond later)
    Handled,
    /// No route accepted the request
    Unmatched,
    /// Handler returned an error or panicked
    Failed,
}

pub struct Dispatcher {
    router: Router<HandlerFn>,
    on_timeout: TimeoutCallback,
}

impl Dispatcher {
    pub fn new(router: Router<HandlerFn>, on_timeout: TimeoutCallback) -> Self {
        Self { router, on_timeout }
    }

    pub fn dispatch(&self, mut request: Request, writer: ResponseWriter) -> DispatchOutcome {
        let Some(route) = self.router.match_route(request.method(), request.path()) else {
            return DispatchOutcome::Unmatched;
        };
        let pattern = route.pattern;
        request.set_params(route.params);

        let request = Arc::new(request);
        let timeout = Timeout::new(Arc::clone(&request), writer.clone(), Arc::clone(&self.on_timeout));
        let handler = route.handler;

        let result = catch_unwind(AssertUnwindSafe(|| handler(request.as_ref(), &writer, &timeout)));
        let failure = match result {
            Ok(Ok(())) => return DispatchOutcome::Handled,
            Ok(Err(err)) => err.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };

        logger::log_handler_failure(
            request.method().as_str(),
            request.path(),
            pattern,
            request.remote_addr(),
            &failure,
        );
        recover(&writer);
        DispatchOutcome::Failed
    }

    pub fn routes(&self) -> usize {
        self.router.len()
    }
}

/// Answer a failed request with a generic 500 if nothing was sent yet
fn recover(writer: &ResponseWriter) {
    match writer.state() {
        ResponseState::Pending => {
            match writer.send(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                "text/plain",
            ) {
                Ok(()) | Err(ResponseError::AlreadyComplete | ResponseError::Streaming) => {}
                Err(e) => logger::log_warning(&format!("Could not send error response: {e}")),
            }
        }
        ResponseState::Sending => {
            logger::log_warning("Handler failed mid-stream, response left to its stream handle");
        }
        ResponseState::Complete => {}
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Sends `408 Request Timeout`; a response that already left `Pending` wins.
pub fn default_timeout_callback() -> TimeoutCallback {
    Arc::new(|request, writer| {
        match writer.send(StatusCode::REQUEST_TIMEOUT, "Timeout", "text/plain") {
            Ok(()) => {}
            Err(ResponseError::AlreadyComplete | ResponseError::Streaming) => {}
            Err(e) => tracing::debug!(path = request.path(), "timeout response not delivered: {e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsStore;
    use http_body_util::BodyExt;
    use crate::handler::handler;
    use hyper::Method;

    fn dispatcher_with(metrics: &Arc<MetricsStore>) -> Dispatcher {
        let mut router = Router::new();
        let store = Arc::clone(metrics);
        router
            .post(
                "/record/:name",
                handler(move |req, writer, _| {
                    let name = req.param("name").unwrap_or_default();
                    let inc = store.increment_or_create(name);
                    writer.send(StatusCode::OK, inc.current().to_string(), "text/plain")?;
                    Ok(())
                }),
            )
            .unwrap();
        router
            .any(
                "/exception",
                handler(|_, _, _| Err(HandlerError::failed("Exception thrown in the handler"))),
            )
            .unwrap();
        router
            .any("/panic", handler(|_, _, _| panic!("handler blew up")))
            .unwrap();
        router
            .get(
                "/double",
                handler(|_, writer, _| {
                    writer.send(StatusCode::OK, "first", "text/plain")?;
                    writer.send(StatusCode::OK, "second", "text/plain")?;
                    Ok(())
                }),
            )
            .unwrap();
        Dispatcher::new(router, default_timeout_callback())
    }

    #[tokio::test]
    async fn test_params_reach_handler() {
        let metrics = Arc::new(MetricsStore::new());
        let dispatcher = dispatcher_with(&metrics);
        let (writer, rx) = ResponseWriter::channel();

        let outcome = dispatcher.dispatch(Request::new(Method::POST, "/record/requests"), writer);
        assert_eq!(outcome, DispatchOutcome::Handled);
        assert_eq!(metrics.get("requests"), Some(1));

        let body = rx.await.unwrap().into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"1");
    }

    #[tokio::test]
    async fn test_unmatched_request() {
        let dispatcher = dispatcher_with(&Arc::new(MetricsStore::new()));
        let (writer, rx) = ResponseWriter::channel();
        let outcome = dispatcher.dispatch(Request::new(Method::GET, "/record/requests"), writer);
        assert_eq!(outcome, DispatchOutcome::Unmatched);
        // Writer was dropped without a response
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_handler_error_becomes_500() {
        let metrics = Arc::new(MetricsStore::new());
        let dispatcher = dispatcher_with(&metrics);

        let (writer, rx) = ResponseWriter::channel();
        let outcome = dispatcher.dispatch(Request::new(Method::DELETE, "/exception"), writer);
        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(rx.await.unwrap().status(), StatusCode::INTERNAL_SERVER_ERROR);

        // Later requests see a consistent store
        for _ in 0..3 {
            let (writer, _rx) = ResponseWriter::channel();
            dispatcher.dispatch(Request::new(Method::POST, "/record/hits"), writer);
        }
        assert_eq!(metrics.get("hits"), Some(3));
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let metrics = Arc::new(MetricsStore::new());
        let dispatcher = dispatcher_with(&metrics);

        let (writer, rx) = ResponseWriter::channel();
        let outcome = dispatcher.dispatch(Request::new(Method::GET, "/panic"), writer);
        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(rx.await.unwrap().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let (writer, _rx) = ResponseWriter::channel();
        dispatcher.dispatch(Request::new(Method::POST, "/record/after"), writer);
        assert_eq!(metrics.get("after"), Some(1));
    }

    #[tokio::test]
    async fn test_double_send_is_reported() {
        let dispatcher = dispatcher_with(&Arc::new(MetricsStore::new()));
        let (writer, rx) = ResponseWriter::channel();
        let outcome = dispatcher.dispatch(Request::new(Method::GET, "/double"), writer);
        assert_eq!(outcome, DispatchOutcome::Failed);

        // The first response stands
        let body = rx.await.unwrap().into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"first");
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "handler panicked");
    }
}

//! Built-in service endpoints: ping, echo, exception, timeout and static

use hyper::StatusCode;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::dispatcher::HandlerFn;
use super::handler;
use crate::config::AppState;
use crate::error::HandlerError;
use crate::http::mime;
use crate::logger;

/// `GET /ping`
///
/// Arms the ping deadline. With the `chunked` query flag the reply is streamed
/// as two chunks; otherwise nothing is sent and the deadline produces a 408.
pub fn ping(state: &Arc<AppState>) -> HandlerFn {
    let deadline = Duration::from_secs(state.config.routes.ping_timeout_secs);
    let server_name = state.config.http.server_name.clone();

    handler(move |request, writer, timeout| {
        timeout.arm(deadline);

        if request.query().has("chunked") {
            tracing::info!("Using chunked encoding");
            writer.header("server", &server_name)?;
            writer.header("content-type", "text/plain")?;
            let mut stream = writer.begin_stream(StatusCode::OK)?;
            stream.write("PO")?;
            stream.write("NG")?;
            stream.end()?;
        }
        Ok(())
    })
}

/// `POST /echo`
pub fn echo() -> HandlerFn {
    handler(|request, writer, _| {
        writer.send(StatusCode::OK, request.body().clone(), "text/plain")?;
        Ok(())
    })
}

/// `/exception`, any method
pub fn exception() -> HandlerFn {
    handler(|_, _, _| Err(HandlerError::failed("Exception thrown in the handler")))
}

/// `/timeout`, any method. Never answers on its own.
pub fn timeout(state: &Arc<AppState>) -> HandlerFn {
    let deadline = Duration::from_secs(state.config.routes.timeout_secs);
    handler(move |_, _, timeout| {
        timeout.arm(deadline);
        Ok(())
    })
}

/// `GET /static`: read the configured file off the request task.
pub fn static_file(state: &Arc<AppState>) -> HandlerFn {
    let path = PathBuf::from(&state.config.routes.static_file);

    handler(move |_, writer, _| {
        let path = path.clone();
        let writer = writer.clone();
        tokio::spawn(async move {
            let result = match tokio::fs::read(&path).await {
                Ok(contents) => {
                    let size = contents.len();
                    let sent = writer.send(StatusCode::OK, contents, mime::content_type_for(&path));
                    if sent.is_ok() {
                        tracing::info!("Sent {size} bytes");
                    }
                    sent
                }
                Err(e) => {
                    logger::log_warning(&format!("Cannot read {}: {e}", path.display()));
                    writer.send(StatusCode::NOT_FOUND, "404 Not Found", "text/plain")
                }
            };
            if let Err(e) = result {
                logger::log_warning(&format!("Static response not delivered: {e}"));
            }
        });
        Ok(())
    })
}

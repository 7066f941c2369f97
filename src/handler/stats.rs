//! Named counter endpoints backed by the metrics store

use hyper::StatusCode;
use std::sync::Arc;

use super::dispatcher::HandlerFn;
use super::handler;
use crate::config::AppState;

/// `POST /record/:name`: 201 with no body on creation, else 200 with the new value
pub fn record(state: &Arc<AppState>) -> HandlerFn {
    let state = Arc::clone(state);
    handler(move |request, writer, _| {
        let name = request.param("name").unwrap_or_default();
        let increment = state.metrics.increment_or_create(name);
        if increment.created {
            writer.send_status(StatusCode::CREATED)?;
        } else {
            writer.send(StatusCode::OK, increment.current().to_string(), "text/plain")?;
        }
        Ok(())
    })
}

/// `GET /value/:name`
pub fn value(state: &Arc<AppState>) -> HandlerFn {
    let state = Arc::clone(state);
    handler(move |request, writer, _| {
        let name = request.param("name").unwrap_or_default();
        match state.metrics.get(name) {
            Some(value) => writer.send(StatusCode::OK, value.to_string(), "text/plain")?,
            None => writer.send_status(StatusCode::NOT_FOUND)?,
        }
        Ok(())
    })
}

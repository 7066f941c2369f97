//! Response writer and HTTP response builders
//!
//! A [`ResponseWriter`] completes exactly once, either with [`ResponseWriter::send`]
//! or with [`ResponseWriter::begin_stream`] followed by [`StreamHandle::end`].
//! The state word is the claim: whichever caller moves it out of `Pending` owns
//! the response, every other caller gets a [`ResponseError`].

use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use std::convert::Infallible;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};

use super::body::ChannelBody;
use crate::error::ResponseError;
use crate::handler::timeout::TimeoutController;
use crate::logger;

pub type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;

/// Receiving half handed to the transport engine
pub type ResponseReceiver = oneshot::Receiver<Response<ResponseBody>>;

const PENDING: u8 = 0;
const SENDING: u8 = 1;
const COMPLETE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    Pending,
    Sending,
    Complete,
}

impl ResponseState {
    const fn from_u8(value: u8) -> Self {
        match value {
            PENDING => Self::Pending,
            SENDING => Self::Sending,
            _ => Self::Complete,
        }
    }
}

struct Inner {
    state: AtomicU8,
    headers: Mutex<HeaderMap>,
    sender: Mutex<Option<oneshot::Sender<Response<ResponseBody>>>>,
    timeout: TimeoutController,
}

/// Cloneable handle producing the response for one request
#[derive(Clone)]
pub struct ResponseWriter {
    inner: Arc<Inner>,
}

impl ResponseWriter {
    pub fn channel() -> (Self, ResponseReceiver) {
        let (tx, rx) = oneshot::channel();
        let writer = Self {
            inner: Arc::new(Inner {
                state: AtomicU8::new(PENDING),
                headers: Mutex::new(HeaderMap::new()),
                sender: Mutex::new(Some(tx)),
                timeout: TimeoutController::new(),
            }),
        };
        (writer, rx)
    }

    pub fn state(&self) -> ResponseState {
        ResponseState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    pub fn is_pending(&self) -> bool {
        self.state() == ResponseState::Pending
    }

    pub fn is_complete(&self) -> bool {
        self.state() == ResponseState::Complete
    }

    pub(crate) fn timeout_controller(&self) -> &TimeoutController {
        &self.inner.timeout
    }

    /// Set a response header. Only allowed before the response is sent.
    pub fn header(&self, name: &str, value: &str) -> Result<(), ResponseError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ResponseError::InvalidHeader(name.to_string()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ResponseError::InvalidHeader(name.as_str().to_string()))?;

        let mut headers = self.lock_headers();
        if !self.is_pending() {
            return Err(ResponseError::HeadersSent);
        }
        headers.insert(name, value);
        Ok(())
    }

    /// Send the whole response at once.
    pub fn send(
        &self,
        status: StatusCode,
        body: impl Into<Bytes>,
        content_type: &str,
    ) -> Result<(), ResponseError> {
        self.claim(PENDING, COMPLETE)?;

        let mut headers = self.take_headers();
        match HeaderValue::from_str(content_type) {
            Ok(value) => {
                headers.insert(CONTENT_TYPE, value);
            }
            Err(_) => logger::log_warning(&format!("Ignoring invalid content type '{content_type}'")),
        }

        let result = self.deliver(status, headers, Full::new(body.into()).boxed_unsync());
        self.inner.timeout.cancel();
        result
    }

    /// Send a status with an empty body and no content type
    pub fn send_status(&self, status: StatusCode) -> Result<(), ResponseError> {
        self.claim(PENDING, COMPLETE)?;
        let headers = self.take_headers();
        let result = self.deliver(status, headers, Full::new(Bytes::new()).boxed_unsync());
        self.inner.timeout.cancel();
        result
    }

    /// Emit the status line and headers, then stream the body chunk by chunk.
    pub fn begin_stream(&self, status: StatusCode) -> Result<StreamHandle, ResponseError> {
        self.claim(PENDING, SENDING)?;

        let headers = self.take_headers();
        let (tx, body) = ChannelBody::channel();
        if let Err(e) = self.deliver(status, headers, body.boxed_unsync()) {
            self.inner.state.store(COMPLETE, Ordering::SeqCst);
            self.inner.timeout.cancel();
            return Err(e);
        }

        Ok(StreamHandle {
            writer: self.clone(),
            tx: Some(tx),
        })
    }

    fn claim(&self, from: u8, to: u8) -> Result<(), ResponseError> {
        self.inner
            .state
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|actual| match (from, actual) {
                (SENDING, _) => ResponseError::StreamEnded,
                (_, SENDING) => ResponseError::Streaming,
                _ => ResponseError::AlreadyComplete,
            })
    }

    fn lock_headers(&self) -> std::sync::MutexGuard<'_, HeaderMap> {
        self.inner
            .headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn take_headers(&self) -> HeaderMap {
        std::mem::take(&mut *self.lock_headers())
    }

    fn deliver(
        &self,
        status: StatusCode,
        headers: HeaderMap,
        body: ResponseBody,
    ) -> Result<(), ResponseError> {
        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;

        let sender = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => tx.send(response).map_err(|_| ResponseError::Disconnected),
            None => Err(ResponseError::AlreadyComplete),
        }
    }

    fn finish_stream(&self) -> Result<(), ResponseError> {
        self.claim(SENDING, COMPLETE)?;
        self.inner.timeout.cancel();
        Ok(())
    }
}

/// Open response body; see [`ResponseWriter::begin_stream`]
pub struct StreamHandle {
    writer: ResponseWriter,
    tx: Option<mpsc::UnboundedSender<Bytes>>,
}

impl StreamHandle {
    pub fn write(&mut self, chunk: impl Into<Bytes>) -> Result<(), ResponseError> {
        let tx = self.tx.as_ref().ok_or(ResponseError::StreamEnded)?;
        let chunk = chunk.into();
        // An empty chunk would terminate chunked encoding early
        if chunk.is_empty() {
            return Ok(());
        }
        tx.send(chunk).map_err(|_| ResponseError::Disconnected)
    }

    /// Close the body and complete the response.
    pub fn end(&mut self) -> Result<(), ResponseError> {
        if self.tx.take().is_none() {
            return Err(ResponseError::StreamEnded);
        }
        self.writer.finish_stream()
    }

    pub const fn is_ended(&self) -> bool {
        self.tx.is_none()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if !self.is_ended() {
            logger::log_warning("Response stream dropped without end(), closing it");
            let _ = self.end();
        }
    }
}

/// Build a plain-text response outside of a writer
pub fn build_text_response(status: StatusCode, body: &'static str) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain")
        .body(Full::new(Bytes::from_static(body.as_bytes())).boxed_unsync())
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::from_static(body.as_bytes())).boxed_unsync())
        })
}

/// Build 400 Bad Request response
pub fn build_400_response() -> Response<ResponseBody> {
    build_text_response(StatusCode::BAD_REQUEST, "400 Bad Request")
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<ResponseBody> {
    build_text_response(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<ResponseBody> {
    build_text_response(StatusCode::PAYLOAD_TOO_LARGE, "413 Payload Too Large")
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> Response<ResponseBody> {
    build_text_response(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error")
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::timeout::TimeoutState;

    async fn body_string(response: Response<ResponseBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_send_completes_once() {
        let (writer, rx) = ResponseWriter::channel();
        writer.header("server", "lys").unwrap();
        writer.send(StatusCode::OK, "hello", "text/plain").unwrap();
        assert_eq!(writer.state(), ResponseState::Complete);

        assert_eq!(
            writer.send(StatusCode::OK, "again", "text/plain"),
            Err(ResponseError::AlreadyComplete)
        );
        assert_eq!(writer.header("x-late", "1"), Err(ResponseError::HeadersSent));
        assert!(writer.begin_stream(StatusCode::OK).is_err());

        let response = rx.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["server"], "lys");
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert_eq!(body_string(response).await, "hello");
    }

    #[tokio::test]
    async fn test_send_status_has_empty_body() {
        let (writer, rx) = ResponseWriter::channel();
        writer.send_status(StatusCode::CREATED).unwrap();
        let response = rx.await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get("content-type").is_none());
        assert_eq!(body_string(response).await, "");
    }

    #[tokio::test]
    async fn test_stream_lifecycle() {
        let (writer, rx) = ResponseWriter::channel();
        writer.header("content-type", "text/plain").unwrap();

        let mut stream = writer.begin_stream(StatusCode::OK).unwrap();
        assert_eq!(writer.state(), ResponseState::Sending);
        assert_eq!(writer.header("x-late", "1"), Err(ResponseError::HeadersSent));
        assert_eq!(
            writer.send(StatusCode::OK, "x", "text/plain"),
            Err(ResponseError::Streaming)
        );

        stream.write("PO").unwrap();
        stream.write("NG").unwrap();
        stream.end().unwrap();
        assert!(stream.is_ended());
        assert_eq!(writer.state(), ResponseState::Complete);

        assert_eq!(stream.write("!"), Err(ResponseError::StreamEnded));
        assert_eq!(stream.end(), Err(ResponseError::StreamEnded));

        let mut body = rx.await.unwrap().into_body();
        let mut frames = Vec::new();
        while let Some(frame) = body.frame().await {
            frames.push(frame.unwrap().into_data().unwrap());
        }
        assert_eq!(frames.len(), 2);
        assert_eq!(frames.concat(), b"PONG");
    }

    #[tokio::test]
    async fn test_dropped_stream_completes_response() {
        let (writer, rx) = ResponseWriter::channel();
        {
            let mut stream = writer.begin_stream(StatusCode::OK).unwrap();
            stream.write("partial").unwrap();
        }
        assert!(writer.is_complete());
        assert_eq!(body_string(rx.await.unwrap()).await, "partial");
    }

    #[tokio::test]
    async fn test_completion_cancels_armed_timeout() {
        let (writer, _rx) = ResponseWriter::channel();
        let controller = writer.timeout_controller().clone();
        assert!(controller.try_arm(std::time::Instant::now()));
        writer.send_status(StatusCode::OK).unwrap();
        assert_eq!(controller.state(), TimeoutState::Cancelled);
    }

    #[test]
    fn test_disconnected_receiver() {
        let (writer, rx) = ResponseWriter::channel();
        drop(rx);
        assert_eq!(
            writer.send(StatusCode::OK, "late", "text/plain"),
            Err(ResponseError::Disconnected)
        );
        assert!(writer.is_complete());
    }

    #[test]
    fn test_invalid_header_rejected() {
        let (writer, _rx) = ResponseWriter::channel();
        assert!(matches!(
            writer.header("bad header", "x"),
            Err(ResponseError::InvalidHeader(_))
        ));
        assert!(matches!(
            writer.header("x-ok", "line\nbreak"),
            Err(ResponseError::InvalidHeader(_))
        ));
    }

    #[tokio::test]
    async fn test_builders() {
        let response = build_404_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "404 Not Found");
        assert_eq!(build_500_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(build_413_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}

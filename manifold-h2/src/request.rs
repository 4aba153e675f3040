//! Request messages and per-stream callbacks.
//!
//! A request message is shared between the user and the acquisition that
//! carries it; the manager drops its reference once the request has been
//! dispatched onto a connection. Stream events are delivered through the
//! boxed callbacks bundled in [`StreamRequestOptions`].

use std::sync::Arc;

use bytes::Bytes;
use http::Method;

use manifold_hpack::{HeaderField, Headers};

use crate::error::Error;

/// Which part of the response a header block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderBlock {
    /// 1xx informational responses preceding the main response.
    Informational,
    Main,
    Trailing,
}

/// An HTTP request message.
#[derive(Debug, Clone)]
pub struct RequestMessage {
    pub method: Method,
    pub path: Bytes,
    pub headers: Headers,
    pub body: Bytes,
}

impl RequestMessage {
    pub fn new(method: Method, path: impl Into<Bytes>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        self.headers.push(HeaderField::new(name, value));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Response headers for one block, in wire order.
pub type OnResponseHeaders = Box<dyn FnMut(HeaderBlock, &[HeaderField]) + Send>;

/// A header block finished decoding.
pub type OnResponseHeaderBlockDone = Box<dyn FnMut(HeaderBlock) + Send>;

/// A chunk of response body.
pub type OnResponseBody = Box<dyn FnMut(&Bytes) + Send>;

/// The stream completed; fires exactly once per created stream.
pub type OnStreamComplete = Box<dyn FnOnce(crate::error::Result<()>) + Send>;

/// Options describing one stream to open: the request plus the callbacks
/// the stream's events are delivered through.
///
/// All callbacks run on the owning connection's event loop thread.
pub struct StreamRequestOptions {
    pub request: Arc<RequestMessage>,
    pub on_response_headers: Option<OnResponseHeaders>,
    pub on_response_header_block_done: Option<OnResponseHeaderBlockDone>,
    pub on_response_body: Option<OnResponseBody>,
    pub on_complete: Option<OnStreamComplete>,
}

impl StreamRequestOptions {
    pub fn new(request: Arc<RequestMessage>) -> Self {
        Self {
            request,
            on_response_headers: None,
            on_response_header_block_done: None,
            on_response_body: None,
            on_complete: None,
        }
    }
}

impl std::fmt::Debug for StreamRequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRequestOptions")
            .field("request", &self.request)
            .field("on_response_headers", &self.on_response_headers.is_some())
            .field("on_response_body", &self.on_response_body.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Outcome of a stream acquisition, delivered exactly once per
/// `acquire_stream` call.
pub type OnStreamAcquired =
    Box<dyn FnOnce(std::result::Result<Arc<dyn crate::connection::Http2Stream>, Error>) + Send>;

//! HTTP request handling.
//!
//! [`RequestHeader`] wraps the parsed `http::Request<()>` head, and [`Request`] is
//! what a handler sees: the head plus the body reader attached by the framing
//! decision, the peer addresses and the per-request cancellation token.

use std::net::SocketAddr;

use http::request::Parts;
use http::{HeaderMap, Method, Uri, Version, header};
use tokio_util::sync::CancellationToken;

use crate::protocol::PayloadSize;
use crate::protocol::body::ReqBody;

/// Represents an HTTP request header.
#[derive(Debug)]
pub struct RequestHeader {
    inner: http::Request<()>,
}

impl AsRef<http::Request<()>> for RequestHeader {
    fn as_ref(&self) -> &http::Request<()> {
        &self.inner
    }
}

impl AsMut<http::Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut http::Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    /// Consumes the header and returns the inner `Request<()>`.
    pub fn into_inner(self) -> http::Request<()> {
        self.inner
    }

    /// Returns a reference to the request's HTTP method.
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    /// Returns a reference to the request's URI.
    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// Returns the request's HTTP version.
    pub fn version(&self) -> Version {
        self.inner.version()
    }

    /// Returns a reference to the request's headers.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether the client asked for the connection to be closed after this request.
    ///
    /// Only a `Connection: close` value (any case) does so; `keep-alive`, any other
    /// value or no header at all keeps the connection open.
    pub fn is_close(&self) -> bool {
        self.headers()
            .get(header::CONNECTION)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("close"))
    }

    /// Whether the client waits for an interim `100 Continue` before sending its body.
    ///
    /// `Expect` has no meaning before `HTTP/1.1`, so a `HTTP/1.0` request never does.
    pub fn expects_continue(&self) -> bool {
        self.version() >= Version::HTTP_11
            && self
                .headers()
                .get(header::EXPECT)
                .is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"100-continue"))
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: http::Request::from_parts(parts, ()) }
    }
}

impl From<http::Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: http::Request<()>) -> Self {
        Self { inner }
    }
}

/// A request as handed to a [`Handler`](crate::handler::Handler).
///
/// It lives for a single request/response cycle. Apart from the body's read cursor
/// nothing in it changes after parsing.
#[derive(Debug)]
pub struct Request<'conn> {
    head: RequestHeader,
    payload_size: PayloadSize,
    body: ReqBody<'conn>,
    remote_addr: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
    cancellation: CancellationToken,
}

impl<'conn> Request<'conn> {
    pub(crate) fn new(head: RequestHeader, payload_size: PayloadSize, body: ReqBody<'conn>) -> Self {
        Self { head, payload_size, body, remote_addr: None, local_addr: None, cancellation: CancellationToken::new() }
    }

    pub(crate) fn with_addrs(mut self, remote_addr: Option<SocketAddr>, local_addr: Option<SocketAddr>) -> Self {
        self.remote_addr = remote_addr;
        self.local_addr = local_addr;
        self
    }

    pub fn head(&self) -> &RequestHeader {
        &self.head
    }

    pub fn method(&self) -> &Method {
        self.head.method()
    }

    pub fn uri(&self) -> &Uri {
        self.head.uri()
    }

    /// The request-target exactly as it appeared on the request line.
    pub fn target(&self) -> &str {
        self.uri().path_and_query().map_or("/", |pq| pq.as_str())
    }

    pub fn path(&self) -> &str {
        self.uri().path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri().query()
    }

    pub fn version(&self) -> Version {
        self.head.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.head.headers()
    }

    pub fn payload_size(&self) -> PayloadSize {
        self.payload_size
    }

    /// Body length in bytes; `-1` for a chunked body whose length is unknown.
    pub fn content_length(&self) -> i64 {
        self.payload_size.content_length()
    }

    pub fn is_close(&self) -> bool {
        self.head.is_close()
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Cancelled by the connection as soon as the handler for this request returns.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn body(&self) -> &ReqBody<'conn> {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut ReqBody<'conn> {
        &mut self.body
    }

    pub(crate) fn into_body(self) -> ReqBody<'conn> {
        self.body
    }
}

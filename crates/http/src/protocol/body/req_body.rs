use std::fmt;
use std::future::poll_fn;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Buf, Bytes, BytesMut};
use futures::{Stream, StreamExt};
use http_body::{Body, Frame, SizeHint};
use tracing::{error, info};

use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

/// The decoded request stream of a connection, as the body reader sees it.
pub(crate) trait RequestStream:
    Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin + Send
{
}

impl<S> RequestStream for S where S: Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin + Send {}

/// Reader for the body of one request.
///
/// It pulls payload items straight from the connection's request stream, so the body is
/// never buffered as a whole. The framing (none, fixed length or chunked) was fixed by the
/// request decoder before the handler runs; every variant ends with end-of-data.
///
/// Errors are sticky: after the first failure every later read returns an equal error,
/// and no bytes are handed out past it.
///
/// Whatever the handler leaves unread is drained by the connection before the next
/// request is parsed.
pub struct ReqBody<'conn> {
    stream: &'conn mut dyn RequestStream,
    state: BodyState,
    /// Part of a chunk not yet consumed by [`ReqBody::read`].
    leftover: Bytes,
}

enum BodyState {
    Streaming,
    Eof,
    Failed(ParseError),
}

impl<'conn> ReqBody<'conn> {
    pub(crate) fn new(stream: &'conn mut dyn RequestStream) -> Self {
        Self { stream, state: BodyState::Streaming, leftover: Bytes::new() }
    }

    /// Returns the next piece of the body, or `None` once the body is complete.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, ParseError> {
        if !self.leftover.is_empty() {
            return Ok(Some(mem::take(&mut self.leftover)));
        }
        poll_fn(|cx| self.poll_chunk(cx)).await
    }

    /// Reads body bytes into `buf`, returning `0` at the end of the body.
    ///
    /// A single call never spans two chunks; bytes of a chunk that do not fit are kept for
    /// the next call.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ParseError> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.leftover.is_empty() {
            match poll_fn(|cx| self.poll_chunk(cx)).await? {
                Some(bytes) => self.leftover = bytes,
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.leftover.len());
        buf[..n].copy_from_slice(&self.leftover[..n]);
        self.leftover.advance(n);
        Ok(n)
    }

    /// Reads the rest of the body into one buffer.
    pub async fn bytes(&mut self) -> Result<Bytes, ParseError> {
        let mut collected = BytesMut::new();
        while let Some(bytes) = self.chunk().await? {
            collected.extend_from_slice(&bytes);
        }
        Ok(collected.freeze())
    }

    /// Whether the whole body has been read.
    pub fn is_end(&self) -> bool {
        matches!(self.state, BodyState::Eof) && self.leftover.is_empty()
    }

    /// Discards whatever is left of the body, returning the number of bytes skipped.
    pub(crate) async fn drain(&mut self) -> Result<u64, ParseError> {
        let mut size = mem::take(&mut self.leftover).len() as u64;
        while let Some(bytes) = poll_fn(|cx| self.poll_chunk(cx)).await? {
            size += bytes.len() as u64;
        }
        if size > 0 {
            info!(size, "skip request body");
        }
        Ok(size)
    }

    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Result<Option<Bytes>, ParseError>> {
        match &self.state {
            BodyState::Failed(e) => return Poll::Ready(Err(e.replicate())),
            BodyState::Eof => return Poll::Ready(Ok(None)),
            BodyState::Streaming => {}
        }

        loop {
            let error = match ready!(self.stream.poll_next_unpin(cx)) {
                Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => {
                    if bytes.is_empty() {
                        continue;
                    }
                    return Poll::Ready(Ok(Some(bytes)));
                }
                Some(Ok(Message::Payload(PayloadItem::Eof))) => {
                    self.state = BodyState::Eof;
                    return Poll::Ready(Ok(None));
                }
                Some(Ok(Message::Header(_))) => ParseError::invalid_body("received request header while reading body"),
                Some(Err(e)) => e,
                None => ParseError::io(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "request stream ended inside the body")),
            };

            error!(cause = %error, "failed to read request body");
            self.state = BodyState::Failed(error.replicate());
            return Poll::Ready(Err(error));
        }
    }
}

impl fmt::Debug for ReqBody<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            BodyState::Streaming => "streaming",
            BodyState::Eof => "eof",
            BodyState::Failed(_) => "failed",
        };
        f.debug_struct("ReqBody").field("state", &state).field("leftover", &self.leftover.len()).finish()
    }
}

/// Implements standard HTTP body interface for request bodies.
impl Body for ReqBody<'_> {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if !this.leftover.is_empty() {
            return Poll::Ready(Some(Ok(Frame::data(mem::take(&mut this.leftover)))));
        }

        match ready!(this.poll_chunk(cx)) {
            Ok(Some(bytes)) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
            Ok(None) => Poll::Ready(None),
            Err(e) => Poll::Ready(Some(Err(e))),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.is_end()
    }

    fn size_hint(&self) -> SizeHint {
        if self.is_end() { SizeHint::with_exact(0) } else { SizeHint::default() }
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use http_body_util::BodyExt;

    use super::*;

    type Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>;

    fn chunk(bytes: &'static [u8]) -> Item {
        Ok(Message::Payload(PayloadItem::Chunk(Bytes::from_static(bytes))))
    }

    fn eof() -> Item {
        Ok(Message::Payload(PayloadItem::Eof))
    }

    #[tokio::test]
    async fn read_spans_chunks() {
        let mut items = stream::iter(vec![chunk(b"hel"), chunk(b"lo world"), eof()]);
        let mut body = ReqBody::new(&mut items);

        let mut buf = [0u8; 4];
        assert_eq!(body.read(&mut buf).await.unwrap(), 3);
        assert_eq!(&buf[..3], b"hel");
        assert_eq!(body.read(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"lo w");
        assert_eq!(body.bytes().await.unwrap(), Bytes::from_static(b"orld"));
        assert_eq!(body.read(&mut buf).await.unwrap(), 0);
        assert!(body.is_end());
    }

    #[tokio::test]
    async fn errors_are_sticky() {
        let mut items = stream::iter(vec![chunk(b"ok"), Err(ParseError::invalid_body("invalid chunk size")), chunk(b"later")]);
        let mut body = ReqBody::new(&mut items);

        assert_eq!(body.chunk().await.unwrap(), Some(Bytes::from_static(b"ok")));
        assert!(matches!(body.chunk().await, Err(ParseError::InvalidBody { .. })));
        assert!(matches!(body.chunk().await, Err(ParseError::InvalidBody { .. })));
        assert!(matches!(body.read(&mut [0u8; 8]).await, Err(ParseError::InvalidBody { .. })));
    }

    #[tokio::test]
    async fn stream_end_inside_body() {
        let mut items = stream::iter(vec![chunk(b"abc")]);
        let mut body = ReqBody::new(&mut items);

        assert!(body.chunk().await.unwrap().is_some());
        assert!(matches!(body.chunk().await, Err(ParseError::Io { .. })));
    }

    #[tokio::test]
    async fn drain_counts_unread_bytes() {
        let mut items = stream::iter(vec![chunk(b"abc"), chunk(b"defg"), eof()]);
        let mut body = ReqBody::new(&mut items);

        let mut buf = [0u8; 1];
        body.read(&mut buf).await.unwrap();
        assert_eq!(body.drain().await.unwrap(), 6);
        assert!(body.is_end());
    }

    #[tokio::test]
    async fn collect_as_http_body() {
        let mut items = stream::iter(vec![chunk(b"hello "), chunk(b"world"), eof()]);
        let body = ReqBody::new(&mut items);

        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"hello world");
    }
}

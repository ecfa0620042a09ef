use std::{fmt, io};

use http::{HeaderMap, HeaderValue, Method, Response, StatusCode, Version, header};
use tokio::io::AsyncWrite;
use tracing::{trace, warn};

use crate::connection::message_writer::MessageWriter;
use crate::protocol::{Message, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError};
use crate::sniff::detect_content_type;

/// The write half of a connection, as the response writer sees it.
pub(crate) trait ResponseSink: AsyncWrite + Unpin + Send {}

impl<W> ResponseSink for W where W: AsyncWrite + Unpin + Send {}

const CLOSE: HeaderValue = HeaderValue::from_static("close");
const KEEP_ALIVE: HeaderValue = HeaderValue::from_static("keep-alive");
const CHUNKED: HeaderValue = HeaderValue::from_static("chunked");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Status and headers may still change
    HeadersPending,
    /// The head is encoded, body bytes follow
    HeadersSent,
    /// The body is terminated, nothing more is written
    Closed,
}

/// Writes the response to one request.
///
/// The status line and headers are deferred: they are committed by the first body write, by
/// [`write_header`](ResponseWriter::write_header), by [`flush`](ResponseWriter::flush) or when the
/// response is finished, whichever comes first. At that point:
///
/// - a missing `Content-Type` is sniffed from the first body bytes
/// - a response declaring neither `Content-Length` nor `Transfer-Encoding` gets
///   `Transfer-Encoding: chunked` and its body is chunk encoded
/// - `Connection` is set to `close` or `keep-alive` following the request
///
/// Header changes after that point have no effect on the wire. Responses to `HEAD` and
/// responses with status 1xx, 204 or 304 never carry body bytes.
///
/// If the handler writes nothing at all, finishing the response sends `200 OK` with an empty
/// chunked body.
pub struct ResponseWriter<'conn> {
    message_writer: &'conn mut MessageWriter<dyn ResponseSink + 'conn>,
    status: StatusCode,
    headers: HeaderMap,
    version: Version,
    head_request: bool,
    close: bool,
    state: WriterState,
    /// First socket error, handed out again by every later write.
    error: Option<(io::ErrorKind, String)>,
}

impl<'conn> ResponseWriter<'conn> {
    pub(crate) fn new(message_writer: &'conn mut MessageWriter<dyn ResponseSink + 'conn>, request: &RequestHeader) -> Self {
        Self {
            message_writer,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            version: request.version(),
            head_request: request.method() == Method::HEAD,
            close: request.is_close(),
            state: WriterState::HeadersPending,
            error: None,
        }
    }

    /// The status chosen so far, `200 OK` until [`write_header`](Self::write_header) says otherwise.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn headers_sent(&self) -> bool {
        self.state != WriterState::HeadersPending
    }

    /// Whether the connection closes after this response.
    pub fn is_close(&self) -> bool {
        self.close
    }

    /// Closes the connection after this response. The `Connection` header reflects it only
    /// while the head is still pending.
    pub(crate) fn close_after(&mut self) {
        self.close = true;
    }

    /// Commits the status line and headers.
    ///
    /// Only the first call has an effect; later calls are logged and ignored. The head is
    /// written to the socket together with the first body bytes, or on flush or finish.
    pub fn write_header(&mut self, status: StatusCode) {
        if self.state != WriterState::HeadersPending {
            warn!(status = status.as_u16(), sent = self.status.as_u16(), "write_header called after headers were sent");
            return;
        }

        if let Err(e) = self.commit(status) {
            self.latch(&e);
        }
    }

    /// Writes body bytes, committing the head first if needed.
    ///
    /// Zero-length writes put nothing on the wire. Bytes beyond a declared `Content-Length`
    /// are refused with [`io::ErrorKind::InvalidInput`].
    pub async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.check_writable()?;

        if self.state == WriterState::HeadersPending {
            if !self.headers.contains_key(header::CONTENT_TYPE) {
                let content_type = detect_content_type(data);
                trace!(%content_type, "sniffed content type");
                if let Ok(value) = HeaderValue::from_str(content_type.as_ref()) {
                    self.headers.insert(header::CONTENT_TYPE, value);
                }
            }
            self.commit(StatusCode::OK).map_err(|e| self.latch(&e))?;
        }

        if !data.is_empty() {
            // an oversized write is the handler's mistake, the connection is still fine
            self.message_writer.write(Message::Payload::<(ResponseHead, PayloadSize), _>(PayloadItem::Chunk(data))).map_err(into_io)?;
        }

        self.message_writer.send().await.map_err(|e| self.latch(&e))?;
        Ok(data.len())
    }

    /// Commits the head (as `200 OK` unless chosen before) and flushes everything written so
    /// far to the peer. Streams without buffering treat the flush as a no-op.
    pub async fn flush(&mut self) -> io::Result<()> {
        self.check_writable()?;

        if self.state == WriterState::HeadersPending {
            self.commit(StatusCode::OK).map_err(|e| self.latch(&e))?;
        }

        self.message_writer.flush().await.map_err(|e| self.latch(&e))
    }

    /// Terminates the body and flushes the response.
    ///
    /// The connection calls this once the handler returns; calling it earlier is allowed, and
    /// further writes then fail. A body that ends short of its declared `Content-Length`
    /// cannot be framed, so the connection is closed after it.
    pub async fn finish(&mut self) -> Result<(), SendError> {
        if let Some(e) = self.latched() {
            return Err(SendError::io(e));
        }
        if self.state == WriterState::Closed {
            return Ok(());
        }

        if self.state == WriterState::HeadersPending {
            self.commit(StatusCode::OK).inspect_err(|e| {
                self.latch(e);
            })?;
        }

        let missing = self.message_writer.remaining_length();
        if missing > 0 {
            warn!(missing, "response body shorter than its content-length, closing connection");
            self.close = true;
        }

        self.message_writer.write(Message::Payload::<(ResponseHead, PayloadSize), &[u8]>(PayloadItem::Eof))?;
        self.state = WriterState::Closed;

        self.message_writer.flush().await.inspect_err(|e| {
            self.latch(e);
        })
    }

    fn commit(&mut self, status: StatusCode) -> Result<(), SendError> {
        self.status = status;

        let mut headers = self.headers.clone();
        let no_body_status =
            status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED;

        let payload_size = if no_body_status {
            PayloadSize::Empty
        } else if let Some(te_value) = headers.get(header::TRANSFER_ENCODING) {
            if !ends_with_chunked(te_value) {
                // another coding without a length can only be delimited by chunked as the last one
                let value = format!("{}, chunked", String::from_utf8_lossy(te_value.as_bytes()));
                headers.insert(header::TRANSFER_ENCODING, HeaderValue::try_from(value).map_err(SendError::invalid_body)?);
            }
            // transfer-encoding wins, a length next to it would contradict the framing
            headers.remove(header::CONTENT_LENGTH);
            PayloadSize::Chunked
        } else if let Some(cl_value) = headers.get(header::CONTENT_LENGTH) {
            match cl_value.to_str().ok().and_then(|value| value.trim().parse::<u64>().ok()) {
                Some(length) => PayloadSize::Length(length),
                None => {
                    warn!(content_length = ?cl_value, "ignore invalid content-length, use chunked encoding");
                    headers.remove(header::CONTENT_LENGTH);
                    headers.insert(header::TRANSFER_ENCODING, CHUNKED);
                    PayloadSize::Chunked
                }
            }
        } else {
            headers.insert(header::TRANSFER_ENCODING, CHUNKED);
            PayloadSize::Chunked
        };

        headers.insert(header::CONNECTION, if self.close { CLOSE } else { KEEP_ALIVE });

        let mut head = Response::new(());
        *head.status_mut() = status;
        *head.version_mut() = self.version;
        *head.headers_mut() = headers;

        let wire_size = if self.head_request { PayloadSize::Empty } else { payload_size };
        trace!(status = status.as_u16(), ?payload_size, head_request = self.head_request, "commit response head");

        self.state = WriterState::HeadersSent;
        self.message_writer.write(Message::<_, &[u8]>::Header((head, wire_size)))
    }

    fn check_writable(&self) -> io::Result<()> {
        if let Some(e) = self.latched() {
            return Err(e);
        }
        if self.state == WriterState::Closed {
            return Err(io::Error::other("response already finished"));
        }
        Ok(())
    }

    fn latched(&self) -> Option<io::Error> {
        self.error.as_ref().map(|(kind, message)| io::Error::new(*kind, message.clone()))
    }

    /// Remembers the first failure so every later call reports it, and returns it as io error.
    fn latch(&mut self, e: &SendError) -> io::Error {
        let error = match e {
            SendError::Io { source } => io::Error::new(source.kind(), source.to_string()),
            SendError::InvalidBody { reason } => io::Error::new(io::ErrorKind::InvalidInput, reason.clone()),
        };
        if self.error.is_none() {
            warn!(cause = %error, "response writer failed");
            self.error = Some((error.kind(), error.to_string()));
        }
        error
    }
}

impl fmt::Debug for ResponseWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("state", &self.state)
            .field("close", &self.close)
            .finish_non_exhaustive()
    }
}

fn into_io(e: SendError) -> io::Error {
    match e {
        SendError::Io { source } => source,
        SendError::InvalidBody { reason } => io::Error::new(io::ErrorKind::InvalidInput, reason),
    }
}

/// Whether `chunked` is the last coding of a `Transfer-Encoding` value.
fn ends_with_chunked(value: &HeaderValue) -> bool {
    value.as_bytes().rsplit(|b| *b == b',').next().is_some_and(|coding| coding.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}

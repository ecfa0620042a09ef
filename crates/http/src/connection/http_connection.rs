use std::net::SocketAddr;

use futures::StreamExt;
use http::{HeaderValue, Response, StatusCode, header};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedRead;
use tracing::{error, info, warn};

use crate::codec::RequestDecoder;
use crate::config::HttpConfig;
use crate::connection::message_writer::MessageWriter;
use crate::connection::response_writer::ResponseWriter;
use crate::handler::Handler;
use crate::protocol::body::ReqBody;
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, PayloadSize, Request, RequestHeader, ResponseHead, SendError};

const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// An HTTP connection that runs request/response cycles until it is closed
///
/// Each cycle parses one request, hands it to the handler together with a fresh
/// [`ResponseWriter`], drains whatever body the handler left unread and finishes the
/// response. Requests are processed strictly one after another.
///
/// The loop ends without error when the peer closes the stream between two requests, and
/// after the response to a request that asked for `Connection: close`.
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    message_writer: MessageWriter<W>,
    remote_addr: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, HttpConfig::default())
    }

    pub fn with_config(reader: R, writer: W, config: HttpConfig) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::with_config(&config), config.get_buffer_size()),
            message_writer: MessageWriter::with_capacity(writer, config.get_buffer_size()),
            remote_addr: None,
            local_addr: None,
        }
    }

    /// Peer address reported to handlers through [`Request::remote_addr`].
    pub fn remote_addr(mut self, remote_addr: SocketAddr) -> Self {
        self.remote_addr = Some(remote_addr);
        self
    }

    pub fn local_addr(mut self, local_addr: SocketAddr) -> Self {
        self.local_addr = Some(local_addr);
        self
    }

    /// Serves requests until the connection is done.
    ///
    /// Returns `Ok(())` on a clean end of the stream or after a requested close. Any parse
    /// or socket error ends the connection and is returned; a parse error that is not an
    /// I/O error is answered with `400` (or `431` for oversized headers) first.
    pub async fn process<H>(mut self, handler: &H) -> Result<(), HttpError>
    where
        H: Handler + ?Sized,
    {
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Header((header, payload_size)))) => {
                    if self.do_process(header, payload_size, handler).await? {
                        info!("connection close requested, shutdown");
                        return Ok(());
                    }
                }

                Some(Ok(Message::Payload(_))) => {
                    error!("receive payload item while waiting for a request header");
                    let e = ParseError::invalid_body("need header while receive body");
                    self.send_error_response(e.status_code()).await;
                    return Err(e.into());
                }

                Some(Err(e)) => {
                    error!(cause = %e, "can't receive next request");
                    if !matches!(e, ParseError::Io { .. }) {
                        self.send_error_response(e.status_code()).await;
                    }
                    return Err(e.into());
                }

                None => {
                    info!("cant read more request, break this connection down");
                    return Ok(());
                }
            }
        }
    }

    /// Runs one request/response cycle, returning whether the connection must close.
    async fn do_process<H>(&mut self, header: RequestHeader, payload_size: PayloadSize, handler: &H) -> Result<bool, HttpError>
    where
        H: Handler + ?Sized,
    {
        if header.expects_continue() && !payload_size.is_empty() {
            let writer = self.message_writer.get_mut();
            writer.write_all(CONTINUE).await.map_err(SendError::io)?;
            writer.flush().await.map_err(SendError::io)?;
            info!("receive expect request header, sent continue response");
        }

        let Self { framed_read, message_writer, remote_addr, local_addr } = self;

        let mut response = ResponseWriter::new(message_writer, &header);
        let mut request =
            Request::new(header, payload_size, ReqBody::new(framed_read)).with_addrs(*remote_addr, *local_addr);

        handler.call(&mut request, &mut response).await;
        request.cancellation().cancel();

        // the next request starts right after this body, so it must be consumed completely
        let drained = request.into_body().drain().await;
        if let Err(e) = &drained {
            response.close_after();
            if !response.headers_sent() && !matches!(e, ParseError::Io { .. }) {
                response.write_header(e.status_code());
            }
        }

        let finished = response.finish().await;
        let close = response.is_close();

        drained?;
        finished?;
        Ok(close)
    }

    /// Best effort response for a request that could not be parsed; the connection closes after it.
    async fn send_error_response(&mut self, status: StatusCode) {
        self.message_writer.reset();

        let mut head = ResponseHead::new(());
        *head.status_mut() = status;
        head.headers_mut().insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        head.headers_mut().insert(header::CONNECTION, HeaderValue::from_static("close"));

        if let Err(e) = self.write_error_response(head).await {
            warn!(cause = %e, status = status.as_u16(), "failed to send error response");
        }
    }

    async fn write_error_response(&mut self, head: Response<()>) -> Result<(), SendError> {
        self.message_writer.write(Message::<_, &[u8]>::Header((head, PayloadSize::Empty)))?;
        self.message_writer.write(Message::Payload::<(ResponseHead, PayloadSize), &[u8]>(PayloadItem::Eof))?;
        self.message_writer.flush().await
    }
}

/// Serves one bidirectional stream, such as an accepted `TcpStream`, until it is done.
pub async fn serve_connection<IO, H>(io: IO, handler: &H, config: HttpConfig) -> Result<(), HttpError>
where
    IO: AsyncRead + AsyncWrite + Send,
    H: Handler + ?Sized,
{
    let (reader, writer) = tokio::io::split(io);
    HttpConnection::with_config(reader, writer, config).process(handler).await
}

use crate::codec::ResponseEncoder;
use crate::protocol::{Message, PayloadSize, ResponseHead, SendError};
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;

/// Write half of a connection.
///
/// Response messages are encoded into an in-memory buffer first and reach the socket on
/// [`send`](MessageWriter::send) or [`flush`](MessageWriter::flush), so a response head and
/// its first body bytes leave in a single write.
///
/// The writer is the last field so that `&mut MessageWriter<W>` coerces to
/// `&mut MessageWriter<dyn AsyncWrite + ...>`.
#[derive(Debug)]
pub struct MessageWriter<W: ?Sized> {
    buffer: BytesMut,
    encoder: ResponseEncoder,
    writer: W,
}

impl<W> MessageWriter<W> {
    pub fn with_capacity(writer: W, buffer_size: usize) -> Self {
        Self { buffer: BytesMut::with_capacity(buffer_size), encoder: ResponseEncoder::new(), writer }
    }
}

impl<W> MessageWriter<W>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    #[inline]
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Drops encoded bytes that were not sent, and the state of a half written response.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.encoder = ResponseEncoder::new();
    }

    #[inline]
    pub fn write<D>(&mut self, item: Message<(ResponseHead, PayloadSize), D>) -> Result<(), SendError>
    where
        D: Buf,
    {
        self.encoder.encode(item, &mut self.buffer)
    }

    /// Bytes the response body still owes to its declared `Content-Length`.
    pub fn remaining_length(&self) -> u64 {
        self.encoder.remaining_length()
    }

    /// Writes the encoded bytes to the socket without flushing it.
    pub async fn send(&mut self) -> Result<(), SendError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let result = self.writer.write_all(self.buffer.as_ref()).await;
        self.buffer.clear();
        Ok(result?)
    }

    #[inline]
    pub async fn flush(&mut self) -> Result<(), SendError> {
        self.send().await?;
        Ok(self.writer.flush().await?)
    }
}

use crate::codec::body::PayloadEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, PayloadSize, ResponseHead, SendError};
use bytes::{Buf, BytesMut};
use std::io;
use std::io::ErrorKind;
use tokio_util::codec::Encoder;
use tracing::error;

/// Encodes one response head followed by its payload items.
///
/// The [`PayloadSize`] sent with the head decides how the following payload items are
/// framed. Once the payload is finished the encoder accepts the next head.
#[derive(Debug, Default)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Bytes the current fixed length payload still owes; zero when no such payload is open.
    pub fn remaining_length(&self) -> u64 {
        self.payload_encoder.as_ref().map_or(0, PayloadEncoder::remaining_length)
    }
}

impl<D: Buf> Encoder<Message<(ResponseHead, PayloadSize), D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                self.payload_encoder = Some(payload_size.into());
                self.header_encoder.encode((head, payload_size), dst)
            }

            Message::Payload(payload_item) => {
                let payload_encoder = if let Some(encoder) = &mut self.payload_encoder {
                    encoder
                } else {
                    error!("expect response header but receive payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let is_eof = payload_item.is_eof();
                let result = payload_encoder.encode(payload_item, dst);

                if is_eof {
                    self.payload_encoder.take();
                }

                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use http::Response;

    use super::*;
    use crate::protocol::PayloadItem;

    #[test]
    fn head_then_chunks() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        let head = Response::builder().header("Content-Type", "text/plain").body(()).unwrap();
        encoder.encode(Message::<_, &[u8]>::Header((head, PayloadSize::Chunked)), &mut dst).unwrap();
        encoder.encode(Message::Payload::<(ResponseHead, PayloadSize), _>(PayloadItem::Chunk(&b"hi"[..])), &mut dst).unwrap();
        encoder.encode(Message::Payload::<(ResponseHead, PayloadSize), &[u8]>(PayloadItem::Eof), &mut dst).unwrap();

        assert_eq!(
            &dst[..],
            &b"HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ntransfer-encoding: chunked\r\n\r\n2\r\nhi\r\n0\r\n\r\n"[..]
        );
    }

    #[test]
    fn payload_without_head_is_rejected() {
        let mut encoder = ResponseEncoder::new();
        let result = encoder.encode(Message::Payload::<(ResponseHead, PayloadSize), _>(PayloadItem::Chunk(&b"x"[..])), &mut BytesMut::new());
        assert!(result.is_err());
    }

    #[test]
    fn tracks_remaining_length() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        let head = Response::builder().body(()).unwrap();
        encoder.encode(Message::<_, &[u8]>::Header((head, PayloadSize::Length(4))), &mut dst).unwrap();
        encoder.encode(Message::Payload::<(ResponseHead, PayloadSize), _>(PayloadItem::Chunk(&b"ab"[..])), &mut dst).unwrap();
        assert_eq!(encoder.remaining_length(), 2);
    }
}

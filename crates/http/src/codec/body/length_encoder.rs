use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, BytesMut};
use std::io;
use tokio_util::codec::Encoder;
use tracing::warn;

/// Writes body bytes unframed, up to a declared `Content-Length`.
///
/// Bytes beyond the declared length are refused with an `InvalidInput` error and
/// nothing of the offending chunk is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    length: u64,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { length }
    }

    /// Bytes still owed to the peer.
    pub fn remaining(&self) -> u64 {
        self.length
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(mut bytes) => {
                if !bytes.has_remaining() {
                    return Ok(());
                }
                let size = bytes.remaining() as u64;
                if size > self.length {
                    warn!(size, remaining = self.length, "body exceeds the declared content-length");
                    return Err(SendError::io(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("write of {size} bytes exceeds the declared content-length, {} remaining", self.length),
                    )));
                }
                while bytes.has_remaining() {
                    let chunk = bytes.chunk();
                    let len = chunk.len();
                    dst.extend_from_slice(chunk);
                    bytes.advance(len);
                }
                self.length -= size;
                Ok(())
            }
            PayloadItem::Eof => Ok(()),
        }
    }
}

//! HTTP header encoder implementation for serializing HTTP response headers
//!
//! The status line uses the protocol version of the response head (`HTTP/1.0` or
//! `HTTP/1.1`) and the canonical reason phrase of the status code, empty when the code
//! has none. Headers follow one line per value in insertion order, then an empty line.

use crate::protocol::{PayloadSize, ResponseHead, SendError};

use bytes::{BufMut, BytesMut};

use http::{HeaderValue, Version, header};
use std::io;
use std::io::{ErrorKind, Write};
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

const CHUNKED: HeaderValue = HeaderValue::from_static("chunked");

/// Encoder for HTTP response headers implementing the [`Encoder`] trait.
///
/// A framing header matching the [`PayloadSize`] is added when the head lacks one:
/// `Content-Length` for a fixed length and `Transfer-Encoding: chunked` for a chunked
/// body. [`PayloadSize::Empty`] adds nothing, since responses such as `204 No Content`
/// must not carry either header.
#[derive(Debug, Default)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut header, payload_size) = item;

        let version = match header.version() {
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_10 => "HTTP/1.0",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        };

        dst.reserve(INIT_HEADER_SIZE);
        write!(
            FastWrite(dst),
            "{} {} {}\r\n",
            version,
            header.status().as_str(),
            header.status().canonical_reason().unwrap_or("")
        )?;

        match payload_size {
            PayloadSize::Length(n) => {
                if !header.headers().contains_key(header::CONTENT_LENGTH) {
                    header.headers_mut().insert(header::CONTENT_LENGTH, n.into());
                }
            }
            PayloadSize::Chunked => {
                if !header.headers().contains_key(header::TRANSFER_ENCODING) {
                    header.headers_mut().insert(header::TRANSFER_ENCODING, CHUNKED);
                }
            }
            PayloadSize::Empty => {}
        }

        for (header_name, header_value) in header.headers().iter() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Writer for formatting straight into a `BytesMut`.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

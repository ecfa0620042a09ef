//! Decoder implementation for HTTP chunked transfer encoding.
//!
//! This module decodes bodies framed as described in
//! [RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1):
//! a hexadecimal size line, that many bytes of data followed by CRLF, repeated until a
//! zero sized chunk, then optional trailer lines and an empty line.
//!
//! The chunk size is chosen by the peer, so the decoder never hands out bytes past the
//! declared chunk boundary and treats any grammar violation as fatal. Once an error has
//! been reported the decoder keeps reporting it: the stream position is no longer known
//! and nothing after it can be trusted.

use std::cmp;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::{ParseError, PayloadItem};

/// Upper bound for a chunk size line or a trailer line, line terminator included.
const MAX_LINE_SIZE: usize = 8 * 1024;

/// A decoder for handling HTTP chunked transfer encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChunkedState {
    /// Read the size line of the next chunk
    NeedChunkHeader,
    /// Hand out the data of the current chunk
    StreamingChunk { remaining: u64 },
    /// Consume the CRLF closing a chunk's data
    NeedCrlf,
    /// Discard trailer lines up to the empty line
    NeedTrailers,
    /// The last chunk and its trailers have been read
    Done,
    /// A framing violation was seen, with the reason reported for it
    Errored(String),
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: ChunkedState::NeedChunkHeader }
    }

    fn step(&mut self, src: &mut BytesMut) -> Result<Option<PayloadItem>, String> {
        loop {
            match &mut self.state {
                ChunkedState::Errored(reason) => return Err(reason.clone()),

                ChunkedState::Done => {
                    trace!("finished reading chunked data");
                    return Ok(Some(PayloadItem::Eof));
                }

                ChunkedState::NeedChunkHeader => {
                    let Some(line) = take_line(src)? else {
                        return Ok(None);
                    };
                    let size = parse_chunk_size(&line)?;
                    trace!(size, "read chunk size");
                    self.state = match size {
                        0 => ChunkedState::NeedTrailers,
                        remaining => ChunkedState::StreamingChunk { remaining },
                    };
                }

                ChunkedState::StreamingChunk { remaining } => {
                    if src.is_empty() {
                        return Ok(None);
                    }

                    let read_size = cmp::min(*remaining, src.len() as u64) as usize;
                    let bytes = src.split_to(read_size).freeze();
                    *remaining -= read_size as u64;

                    if *remaining == 0 {
                        self.state = ChunkedState::NeedCrlf;
                    }

                    trace!(len = bytes.len(), "read chunked bytes");
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }

                ChunkedState::NeedCrlf => {
                    match src.first() {
                        None => return Ok(None),
                        Some(b'\r') => {}
                        Some(_) => return Err("missing CR after chunk data".into()),
                    }
                    match src.get(1) {
                        None => return Ok(None),
                        Some(b'\n') => {}
                        Some(_) => return Err("missing LF after chunk data".into()),
                    }
                    src.advance(2);
                    self.state = ChunkedState::NeedChunkHeader;
                }

                ChunkedState::NeedTrailers => {
                    let Some(line) = take_line(src)? else {
                        return Ok(None);
                    };
                    if line.is_empty() {
                        self.state = ChunkedState::Done;
                    } else {
                        trace!(trailer = %String::from_utf8_lossy(&line), "discard chunked trailer");
                    }
                }
            }
        }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Decodes chunked transfer encoded data from the input buffer.
    ///
    /// # Returns
    /// - `Ok(Some(PayloadItem::Chunk(bytes)))` when chunk data is available
    /// - `Ok(Some(PayloadItem::Eof))` once the last chunk and the trailers are read
    /// - `Ok(None)` when more data is needed
    /// - `Err(ParseError::InvalidBody)` if the framing is broken, now and on every later call
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.step(src).map_err(|reason| {
            self.state = ChunkedState::Errored(reason.clone());
            ParseError::invalid_body(reason)
        })
    }
}

/// Splits one line off `src` with its `\n` (and a preceding `\r`) removed.
///
/// Returns `Ok(None)` while the line is incomplete.
fn take_line(src: &mut BytesMut) -> Result<Option<BytesMut>, String> {
    let Some(pos) = src.iter().position(|b| *b == b'\n') else {
        if src.len() >= MAX_LINE_SIZE {
            return Err(format!("chunk line exceeds {MAX_LINE_SIZE} bytes"));
        }
        return Ok(None);
    };

    if pos >= MAX_LINE_SIZE {
        return Err(format!("chunk line exceeds {MAX_LINE_SIZE} bytes"));
    }

    let mut line = src.split_to(pos + 1);
    line.truncate(pos);
    if line.last() == Some(&b'\r') {
        line.truncate(pos - 1);
    }
    Ok(Some(line))
}

/// Parses the hexadecimal size at the start of a chunk size line, ignoring any extension.
fn parse_chunk_size(line: &[u8]) -> Result<u64, String> {
    let token = line.split(|b| *b == b';').next().unwrap_or_default().trim_ascii();

    if token.is_empty() || !token.iter().all(u8::is_ascii_hexdigit) {
        return Err(format!("invalid chunk size {:?}", String::from_utf8_lossy(token)));
    }

    token.iter().try_fold(0u64, |size, b| {
        let digit = (*b as char).to_digit(16).unwrap_or_default() as u64;
        size.checked_mul(16).and_then(|size| size.checked_add(digit))
    })
    .ok_or_else(|| "chunk size overflow".to_string())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio_util::codec::Encoder;

    use super::*;
    use crate::codec::body::chunked_encoder::ChunkedEncoder;

    #[test]
    fn test_basic() {
        let mut buffer: BytesMut = BytesMut::from(&b"10\r\n1234567890abcdef\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();
        {
            let item = decoder.decode(&mut buffer).unwrap().unwrap();
            assert!(item.is_chunk());
            assert_eq!(item.as_bytes().unwrap().len(), 16);

            let str = std::str::from_utf8(&item.as_bytes().unwrap()[..]).unwrap();

            assert_eq!(str, "1234567890abcdef");
        }

        {
            let item = decoder.decode(&mut buffer).unwrap().unwrap();
            assert!(item.is_eof());
        }

        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_chunks() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"hello"));

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b", world"));

        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());
    }

    #[test]
    fn test_chunks_with_extensions() {
        let mut buffer: BytesMut = BytesMut::from(&b"5;chunk-ext=value\r\nhello\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"hello"));

        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());
    }

    #[test]
    fn test_chunks_with_trailers() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhello\r\n0\r\nTrailer: value\r\nOther: x\r\n\r\nGET"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"hello"));

        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());
        assert_eq!(&buffer[..], b"GET");
    }

    #[test]
    fn test_incomplete_chunk() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhel"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap();
        assert_eq!(chunk.unwrap().as_bytes().unwrap(), &Bytes::copy_from_slice(b"hel"));

        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"lo\r");
        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"lo"));
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"\n0\r\n\r\n");
        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());
    }

    #[test]
    fn test_split_size_line() {
        let mut buffer: BytesMut = BytesMut::from(&b"1"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"a\r\n");
        buffer.extend_from_slice(&[b'x'; 26]);
        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap().len(), 26);
    }

    #[test]
    fn test_invalid_chunk_size_is_sticky() {
        let mut buffer: BytesMut = BytesMut::from(&b"zz\r\nhello\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert!(matches!(decoder.decode(&mut buffer), Err(ParseError::InvalidBody { .. })));

        // later calls keep failing, even with valid framing in the buffer
        buffer.clear();
        buffer.extend_from_slice(b"5\r\nhello\r\n0\r\n\r\n");
        assert!(matches!(decoder.decode(&mut buffer), Err(ParseError::InvalidBody { .. })));
        assert_eq!(buffer.len(), 15);
    }

    #[test]
    fn test_empty_size_token() {
        let mut buffer: BytesMut = BytesMut::from(&b";ext\r\n"[..]);
        assert!(ChunkedDecoder::new().decode(&mut buffer).is_err());
    }

    #[test]
    fn test_size_overflow() {
        let mut buffer: BytesMut = BytesMut::from(&b"10000000000000000\r\n"[..]);
        assert!(ChunkedDecoder::new().decode(&mut buffer).is_err());
    }

    #[test]
    fn test_missing_crlf() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhelloBad"[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"hello"));

        assert!(decoder.decode(&mut buffer).is_err());
        assert!(decoder.decode(&mut buffer).is_err());
    }

    #[test]
    fn test_missing_lf() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhello\rX"[..]);
        let mut decoder = ChunkedDecoder::new();

        decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(decoder.decode(&mut buffer).is_err());
    }

    #[test]
    fn test_line_too_long() {
        let mut buffer = BytesMut::from(&b"5;"[..]);
        buffer.extend_from_slice(&vec![b'e'; MAX_LINE_SIZE]);
        assert!(ChunkedDecoder::new().decode(&mut buffer).is_err());
    }

    #[test]
    fn test_large_chunk() {
        let size = 1024 * 1024;
        let mut data = Vec::with_capacity(size + 16);
        let headers = format!("{:x}\r\n", size).into_bytes();
        data.extend(headers);
        data.extend(vec![b'A'; size]);
        data.extend(b"\r\n0\r\n\r\n");

        let mut buffer = BytesMut::from(&data[..]);
        let mut decoder = ChunkedDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap().len(), size);
        assert!(chunk.as_bytes().unwrap().iter().all(|&b| b == b'A'));

        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());
    }

    #[test]
    fn test_zero_size_chunk() {
        let mut buffer: BytesMut = BytesMut::from(&b"0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());

        // stays done
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn decodes_what_the_encoder_wrote() {
        let big = vec![0x07u8; 100_000];
        let writes: [&[u8]; 5] = [b"", b"abc", &big, b"", b"\r\n0\r\n"];

        let mut encoder = ChunkedEncoder::new();
        let mut wire = BytesMut::new();
        for write in writes {
            encoder.encode(PayloadItem::Chunk(write), &mut wire).unwrap();
        }
        encoder.encode(PayloadItem::<&[u8]>::Eof, &mut wire).unwrap();

        let mut decoder = ChunkedDecoder::new();
        let mut buffer = BytesMut::new();
        let mut decoded = Vec::new();
        let mut finished = false;

        for fragment in wire.chunks(7) {
            buffer.extend_from_slice(fragment);
            while let Some(item) = decoder.decode(&mut buffer).unwrap() {
                match item {
                    PayloadItem::Chunk(bytes) => decoded.extend_from_slice(&bytes),
                    PayloadItem::Eof => {
                        finished = true;
                        break;
                    }
                }
            }
        }

        assert!(finished);
        assert!(buffer.is_empty());
        assert_eq!(decoded, writes.concat());
    }
}

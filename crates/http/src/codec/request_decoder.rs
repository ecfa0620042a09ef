//! HTTP request decoder module
//!
//! [`RequestDecoder`] alternates between two phases on the same buffer: the header phase,
//! driven by [`HeaderDecoder`], and the payload phase, driven by a [`PayloadDecoder`] chosen
//! from the framing of the request just parsed. The payload phase always ends with a
//! [`PayloadItem::Eof`], even for requests without a body, so consumers see the same
//! shape for every request.

use std::io;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::config::HttpConfig;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};
use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::trace;

/// A decoder for HTTP requests that handles both headers and payload
///
/// # State Machine
///
/// The decoder maintains its state through the `payload_decoder` field:
/// - `None`: Currently parsing headers
/// - `Some(PayloadDecoder)`: Currently parsing payload
#[derive(Debug)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_config(config: &HttpConfig) -> Self {
        Self { header_decoder: HeaderDecoder::new(config), payload_decoder: None }
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self { header_decoder: HeaderDecoder::default(), payload_decoder: None }
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    /// Attempts to decode the next header or payload item from the buffer
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Message::Header(_)))`: Successfully decoded request headers
    /// - `Ok(Some(Message::Payload(_)))`: Successfully decoded a payload chunk or its end
    /// - `Ok(None)`: Need more data to proceed
    /// - `Err(_)`: Encountered a parsing error
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // parse payload if have payload_decoder
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    // the next bytes belong to the next request
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                trace!(method = %header.method(), target = %header.uri(), ?payload_size, "decoded request header");
                self.payload_decoder = Some(payload_size.into());
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }

    /// Called once the underlying reader has no more bytes.
    ///
    /// An empty buffer between two requests is a clean end of stream. A stream that stops
    /// inside a header block or a body is an `UnexpectedEof` I/O error.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }

        if self.payload_decoder.is_some() {
            return Err(ParseError::io(io::Error::new(io::ErrorKind::UnexpectedEof, "stream ended inside the request body")));
        }

        if !src.is_empty() {
            return Err(ParseError::io(io::Error::new(io::ErrorKind::UnexpectedEof, "stream ended inside the request header")));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use indoc::indoc;

    use super::*;

    fn next(decoder: &mut RequestDecoder, buf: &mut BytesMut) -> Message<(RequestHeader, PayloadSize)> {
        decoder.decode(buf).unwrap().unwrap()
    }

    #[test]
    fn two_requests_back_to_back() {
        let str = indoc! {r##"
        POST /upload HTTP/1.1
        Host: 127.0.0.1:8080
        Content-Length: 5

        abcdeGET /next HTTP/1.1
        Host: 127.0.0.1:8080

        "##};
        let mut buf = BytesMut::from(str);
        let mut decoder = RequestDecoder::new();

        let Message::Header((header, payload_size)) = next(&mut decoder, &mut buf) else {
            panic!("expect header");
        };
        assert_eq!(header.method(), &Method::POST);
        assert_eq!(payload_size, PayloadSize::Length(5));

        let Message::Payload(PayloadItem::Chunk(bytes)) = next(&mut decoder, &mut buf) else {
            panic!("expect body chunk");
        };
        assert_eq!(&bytes[..], b"abcde");
        assert!(matches!(next(&mut decoder, &mut buf), Message::Payload(PayloadItem::Eof)));

        let Message::Header((header, payload_size)) = next(&mut decoder, &mut buf) else {
            panic!("expect second header");
        };
        assert_eq!(header.uri().path(), "/next");
        assert!(payload_size.is_empty());
        assert!(matches!(next(&mut decoder, &mut buf), Message::Payload(PayloadItem::Eof)));

        assert!(buf.is_empty());
        assert!(decoder.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn eof_inside_body() {
        let mut buf = BytesMut::from("POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 10\r\n\r\nabc");
        let mut decoder = RequestDecoder::new();

        assert!(next(&mut decoder, &mut buf).is_header());
        assert!(next(&mut decoder, &mut buf).is_payload());

        match decoder.decode_eof(&mut buf) {
            Err(ParseError::Io { source }) => assert_eq!(source.kind(), io::ErrorKind::UnexpectedEof),
            r => panic!("unexpected result {r:?}"),
        }
    }

    #[test]
    fn eof_inside_header() {
        let mut buf = BytesMut::from("GET / HTTP/1.1\r\nHo");
        let mut decoder = RequestDecoder::new();

        assert!(decoder.decode(&mut buf).unwrap().is_none());
        assert!(matches!(decoder.decode_eof(&mut buf), Err(ParseError::Io { .. })));
    }
}

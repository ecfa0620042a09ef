//! HTTP header decoder implementation for parsing HTTP request headers
//!
//! This module turns the request line and header block at the front of a byte buffer into a
//! [`RequestHeader`] and decides how the body that follows is framed.
//!
//! # Limits
//!
//! The header region (request line plus header lines) may not exceed `max_header_bytes` from
//! [`HttpConfig`], checked while the block is still incomplete and again once it is complete.
//! There is no separate limit on the number of headers: the `httparse` header array starts
//! small and is doubled whenever it fills up, which the byte limit keeps finite.
//!
//! # Implementation Details
//!
//! 1. Tokenise the raw bytes with `httparse`
//! 2. Validate method, request-target and protocol version
//! 3. Record header name/value byte ranges, split the header block off the buffer
//!    and build the `HeaderMap` from shared slices of it
//! 4. Resolve the body framing from `Transfer-Encoding` and `Content-Length`

use std::str::FromStr;

use bytes::BytesMut;
use http::uri::PathAndQuery;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, Version, header};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::config::HttpConfig;
use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Methods accepted on the request line. Any other token is rejected.
/// Initial length of the `httparse` header array.
const INIT_HEADER_NUM: usize = 64;

/// Shortest possible header line, a one byte name and the colon followed by a bare newline.
const MIN_HEADER_LINE_BYTES: usize = 3;

const ALLOWED_METHODS: [Method; 9] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::CONNECT,
    Method::OPTIONS,
    Method::TRACE,
];

/// Decoder for HTTP request headers implementing the [`Decoder`] trait.
///
/// This decoder parses raw bytes into a structured [`RequestHeader`] and determines the
/// [`PayloadSize`] of the body from the Content-Length and Transfer-Encoding headers.
#[derive(Debug, Clone)]
pub struct HeaderDecoder {
    max_header_bytes: usize,
}

impl HeaderDecoder {
    pub fn new(config: &HttpConfig) -> Self {
        Self { max_header_bytes: config.get_max_header_bytes() }
    }
}

impl Default for HeaderDecoder {
    fn default() -> Self {
        Self::new(&HttpConfig::default())
    }
}

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    /// Attempts to decode HTTP headers from the provided bytes buffer.
    ///
    /// # Returns
    ///
    /// - `Ok(Some((header, payload_size)))` if a complete header was successfully parsed
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError)` if parsing failed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut header_num = INIT_HEADER_NUM;
        let (body_offset, method, uri, version, header_index) = loop {
            let mut headers = vec![httparse::EMPTY_HEADER; header_num];
            let mut req = httparse::Request::new(&mut headers);

            let body_offset = match req.parse(src) {
                Ok(Status::Complete(body_offset)) => body_offset,
                Ok(Status::Partial) => {
                    // the block is not complete yet, but it must not outgrow the limit while we wait
                    ensure!(src.len() <= self.max_header_bytes, ParseError::too_large_header(src.len(), self.max_header_bytes));
                    return Ok(None);
                }
                Err(Error::TooManyHeaders) => {
                    // this many header lines can't fit in the region any more
                    ensure!(
                        header_num < self.max_header_bytes / MIN_HEADER_LINE_BYTES,
                        ParseError::too_large_header(src.len(), self.max_header_bytes)
                    );
                    header_num *= 2;
                    trace!(header_num, "header array full, parse again");
                    continue;
                }
                Err(e) => return Err(classify_error(e)),
            };

            trace!(header_size = body_offset, "parsed header block");
            ensure!(body_offset <= self.max_header_bytes, ParseError::too_large_header(body_offset, self.max_header_bytes));

            let method = parse_method(req.method)?;
            let uri = parse_target(req.path)?;
            let version = match req.version {
                Some(0) => Version::HTTP_10,
                Some(1) => Version::HTTP_11,
                _ => return Err(ParseError::InvalidVersion),
            };

            let mut header_index = vec![EMPTY_HEADER_INDEX; req.headers.len()];
            HeaderIndex::record(src, req.headers, &mut header_index);

            break (body_offset, method, uri, version, header_index);
        };

        // Split header portion from source buffer, the body stays in `src`
        let header_bytes = src.split_to(body_offset).freeze();

        let mut header_map = HeaderMap::with_capacity(header_index.len());
        for index in &header_index {
            let name = HeaderName::from_bytes(&header_bytes[index.name.0..index.name.1]).map_err(ParseError::invalid_header)?;
            let value = HeaderValue::from_maybe_shared(header_bytes.slice(index.value.0..index.value.1))
                .map_err(ParseError::invalid_header)?;
            header_map.append(name, value);
        }

        if version == Version::HTTP_11 {
            ensure!(header_map.contains_key(header::HOST), ParseError::missing_header("host"));
        }

        let payload_size = parse_payload(&header_map)?;

        let mut request = Request::new(());
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        *request.version_mut() = version;
        *request.headers_mut() = header_map;

        Ok(Some((RequestHeader::from(request), payload_size)))
    }
}

fn classify_error(e: Error) -> ParseError {
    match e {
        Error::Version => ParseError::InvalidVersion,
        Error::HeaderName | Error::HeaderValue => ParseError::invalid_header(e),
        _ => ParseError::malformed_request_line(e),
    }
}

fn parse_method(method: Option<&str>) -> Result<Method, ParseError> {
    let method = method.ok_or_else(|| ParseError::malformed_request_line("missing method"))?;
    ALLOWED_METHODS
        .iter()
        .find(|allowed| allowed.as_str() == method)
        .cloned()
        .ok_or_else(|| ParseError::invalid_method(method))
}

/// Only origin-form targets (`/path?query`) are accepted.
fn parse_target(target: Option<&str>) -> Result<Uri, ParseError> {
    let target = target.ok_or_else(|| ParseError::malformed_request_line("missing request target"))?;
    ensure!(target.starts_with('/'), ParseError::invalid_target(target, "not an absolute path"));

    let path_and_query = PathAndQuery::from_str(target).map_err(|e| ParseError::invalid_target(target, e))?;
    Ok(Uri::from(path_and_query))
}

/// Stores the byte range positions of a header's name and value within the original buffer.
///
/// The parsed `httparse::Header`s borrow the buffer, so the ranges are recorded first and the
/// header map is built from slices of the frozen header block afterwards.
#[derive(Clone, Copy)]
struct HeaderIndex {
    name: (usize, usize),
    value: (usize, usize),
}

const EMPTY_HEADER_INDEX: HeaderIndex = HeaderIndex { name: (0, 0), value: (0, 0) };

impl HeaderIndex {
    fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let bytes_ptr = bytes.as_ptr() as usize;
        for (header, indices) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - bytes_ptr;
            let name_end = name_start + header.name.len();
            indices.name = (name_start, name_end);
            let value_start = header.value.as_ptr() as usize - bytes_ptr;
            let value_end = value_start + header.value.len();
            indices.value = (value_start, value_end);
        }
    }
}

/// Determines how the request body is framed.
///
/// - `Transfer-Encoding: chunked` wins over any `Content-Length`
/// - no `Content-Length` means there is no body
/// - `Content-Length` must be a plain non-negative decimal; zero also means no body
fn parse_payload(headers: &HeaderMap) -> Result<PayloadSize, ParseError> {
    if is_chunked(headers.get(header::TRANSFER_ENCODING)) {
        return Ok(PayloadSize::Chunked);
    }

    let Some(cl_value) = headers.get(header::CONTENT_LENGTH) else {
        return Ok(PayloadSize::Empty);
    };

    let cl_str = cl_value.to_str().map_err(|_| ParseError::invalid_content_length("value can't to_str"))?.trim();
    ensure!(
        !cl_str.is_empty() && cl_str.bytes().all(|b| b.is_ascii_digit()),
        ParseError::invalid_content_length(format!("value {cl_str:?} is not a decimal number"))
    );

    let length = cl_str.parse::<u64>().map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

    match length {
        0 => Ok(PayloadSize::Empty),
        n => Ok(PayloadSize::Length(n)),
    }
}

/// Checks whether the Transfer-Encoding header is exactly `chunked`, ignoring case and
/// surrounding whitespace.
fn is_chunked(header_value: Option<&HeaderValue>) -> bool {
    header_value.is_some_and(|value| value.as_bytes().trim_ascii().eq_ignore_ascii_case(b"chunked"))
}

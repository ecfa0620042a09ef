use std::io;

use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

impl HttpError {
    /// Returns true when the error comes from the underlying transport.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::RequestError { source: ParseError::Io { .. } } | Self::ResponseError { source: SendError::Io { .. } })
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("malformed request line: {reason}")]
    MalformedRequestLine { reason: String },

    #[error("invalid http method: {method}")]
    InvalidMethod { method: String },

    #[error("invalid request target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("invalid http version")]
    InvalidVersion,

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("required header {name:?} not found")]
    MissingHeader { name: &'static str },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    /// The body framing was violated, e.g. a broken chunk size line or a missing CRLF.
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn malformed_request_line<S: ToString>(str: S) -> Self {
        Self::MalformedRequestLine { reason: str.to_string() }
    }

    pub fn invalid_method<S: ToString>(method: S) -> Self {
        Self::InvalidMethod { method: method.to_string() }
    }

    pub fn invalid_target<T: ToString, S: ToString>(target: T, reason: S) -> Self {
        Self::InvalidTarget { target: target.to_string(), reason: reason.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn missing_header(name: &'static str) -> Self {
        Self::MissingHeader { name }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// Status code of the response sent before a connection is dropped for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::TooLargeHeader { .. } => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Builds an equal error without consuming `self`.
    ///
    /// Body readers latch their first failure and hand out a replica on every later read.
    pub(crate) fn replicate(&self) -> Self {
        match self {
            Self::TooLargeHeader { current_size, max_size } => Self::too_large_header(*current_size, *max_size),
            Self::MalformedRequestLine { reason } => Self::malformed_request_line(reason),
            Self::InvalidMethod { method } => Self::invalid_method(method),
            Self::InvalidTarget { target, reason } => Self::invalid_target(target, reason),
            Self::InvalidVersion => Self::InvalidVersion,
            Self::InvalidHeader { reason } => Self::invalid_header(reason),
            Self::MissingHeader { name } => Self::missing_header(name),
            Self::InvalidContentLength { reason } => Self::invalid_content_length(reason),
            Self::InvalidBody { reason } => Self::invalid_body(reason),
            Self::Io { source } => Self::io(io::Error::new(source.kind(), source.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_for_size_limit() {
        assert_eq!(ParseError::too_large_header(10, 5).status_code(), StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE);
        assert_eq!(ParseError::InvalidVersion.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn replicate_keeps_io_kind() {
        let err = ParseError::io(io::Error::new(io::ErrorKind::UnexpectedEof, "partial body"));
        match err.replicate() {
            ParseError::Io { source } => {
                assert_eq!(source.kind(), io::ErrorKind::UnexpectedEof);
                assert_eq!(source.to_string(), "partial body");
            }
            e => panic!("unexpected error {e}"),
        }
    }
}

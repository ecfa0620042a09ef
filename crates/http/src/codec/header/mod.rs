//! HTTP header processing module for encoding and decoding headers
//!
//! - [`HeaderDecoder`]: parses the request line and header block, enforces the
//!   configured size limits and resolves the body framing
//! - [`HeaderEncoder`]: serializes the response status line and headers

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;

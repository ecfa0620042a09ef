//! HTTP body handling module for processing request and response payloads
//!
//! ## Decoders
//! - `ChunkedDecoder`: chunked transfer encoded request bodies, with sticky errors
//! - `LengthDecoder`: bodies framed by `Content-Length`
//! - [`PayloadDecoder`]: picks one of the above, or no body at all, from a `PayloadSize`
//!
//! ## Encoders
//! - `ChunkedEncoder`: frames response bytes as chunks
//! - `LengthEncoder`: writes raw bytes up to a declared length
//! - [`PayloadEncoder`]: picks one of the above, or drops the body, from a `PayloadSize`

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;

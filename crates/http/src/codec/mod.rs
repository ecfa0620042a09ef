//! HTTP codec module for encoding and decoding HTTP messages
//!
//! Both directions are `tokio_util::codec` implementations over `BytesMut`, so parsing and
//! serialization never touch the socket themselves.
//!
//! - Request handling:
//!   - [`RequestDecoder`]: yields a `Message::Header` for each request followed by its
//!     `Message::Payload` items
//!   - Header parsing via [`header`] module
//!   - Payload decoding via [`body`] module
//!
//! - Response handling:
//!   - [`ResponseEncoder`]: the same shape in the other direction
//!   - Header encoding via [`header`] module
//!   - Payload encoding via [`body`] module
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use scratch_http::codec::RequestDecoder;
//! use scratch_http::protocol::{Message, PayloadSize};
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from("POST /echo HTTP/1.1\r\nHost: x\r\nContent-Length: 2\r\n\r\nhi");
//!
//! let Some(Message::Header((header, payload_size))) = decoder.decode(&mut buffer).unwrap() else {
//!     panic!("expect request header");
//! };
//! assert_eq!(header.uri().path(), "/echo");
//! assert_eq!(payload_size, PayloadSize::Length(2));
//! ```

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;

//! Request body reader.
//!
//! [`ReqBody`] reads the body of one request straight from the connection's decoded
//! request stream. It offers plain async reads (`chunk`, `read`, `bytes`) and implements
//! `http_body::Body`.

mod req_body;

pub use req_body::ReqBody;
pub(crate) use req_body::RequestStream;

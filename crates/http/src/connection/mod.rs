//! HTTP connection handling module
//!
//! - [`HttpConnection`]: drives the request/response cycles of one connection, handles
//!   `Expect: 100-continue`, drains unread request bodies and decides when to close
//! - [`ResponseWriter`]: the handler's side of a response, with deferred headers,
//!   automatic chunked encoding and content-type sniffing
//! - [`MessageWriter`]: buffered, encoding write half shared by both
//! - [`serve_connection`]: runs a connection over a single bidirectional stream

mod http_connection;
mod message_writer;
mod response_writer;

pub use http_connection::HttpConnection;
pub use http_connection::serve_connection;
pub use message_writer::MessageWriter;
pub use response_writer::ResponseWriter;

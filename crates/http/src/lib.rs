//! An HTTP/1.1 connection engine built directly on async byte streams
//!
//! The crate speaks HTTP/1.0 and HTTP/1.1 on any `AsyncRead`/`AsyncWrite` pair: it parses
//! request lines and headers, frames request bodies (none, fixed length or chunked), lets a
//! handler stream its response through a writer that defers the status line until the
//! first body byte, and keeps the connection alive across requests until the client asks
//! to close it.
//!
//! # Features
//!
//! - Request header region bounded by a configurable limit (1 MiB by default)
//! - Streaming request bodies with sticky errors on framing violations
//! - Automatic `Transfer-Encoding: chunked` for responses without a declared length
//! - Content-type sniffing for responses that do not set one
//! - Keep-alive connections and `Expect: 100-continue`
//! - One tokio task per connection, no state shared between connections
//!
//! # Example
//!
//! ```no_run
//! use scratch_http::connection::ResponseWriter;
//! use scratch_http::handler::Handler;
//! use scratch_http::protocol::Request;
//! use scratch_http::server::Server;
//!
//! struct Echo;
//!
//! impl Handler for Echo {
//!     async fn call(&self, req: &mut Request<'_>, resp: &mut ResponseWriter<'_>) {
//!         while let Ok(Some(chunk)) = req.body_mut().chunk().await {
//!             if resp.write(&chunk).await.is_err() {
//!                 return;
//!             }
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = Server::builder().address("127.0.0.1:8080").build().expect("valid address");
//!     server.serve(Echo).await
//! }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: request, response and message types, body reader and errors
//! - [`codec`]: `tokio_util` decoders and encoders for the wire format
//! - [`connection`]: the per-connection loop and the response writer
//! - [`handler`]: the trait applications implement
//! - [`server`]: a TCP listener spawning one connection task per socket
//! - [`config`]: limits handed to each connection
//! - [`sniff`]: content-type detection from body bytes
//!
//! # Limitations
//!
//! - HTTP/1.x only, no TLS
//! - No read or write timeouts; a slow peer holds its task until it closes
//! - Requests on one connection are processed strictly in sequence

pub mod codec;
pub mod config;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod sniff;

mod utils;
pub(crate) use utils::ensure;

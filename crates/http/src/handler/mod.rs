//! The application side of a connection.
//!
//! A handler is called once per request with the parsed [`Request`] and a fresh
//! [`ResponseWriter`]. It may read the body, choose status and headers and write body
//! bytes; whatever it leaves undone the connection completes after it returns (unread body
//! bytes are drained, a response nobody wrote becomes `200 OK` with an empty body).
//!
//! Handlers report their own failures through the response; the connection does not
//! inspect them.
//!
//! # Example
//!
//! ```
//! use http::{HeaderValue, StatusCode, header};
//! use scratch_http::connection::ResponseWriter;
//! use scratch_http::handler::Handler;
//! use scratch_http::protocol::Request;
//!
//! struct Hello;
//!
//! impl Handler for Hello {
//!     async fn call(&self, req: &mut Request<'_>, resp: &mut ResponseWriter<'_>) {
//!         if req.path() != "/hello" {
//!             resp.write_header(StatusCode::NOT_FOUND);
//!             return;
//!         }
//!         resp.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
//!         let _ = resp.write(b"hello world").await;
//!     }
//! }
//! ```

use crate::connection::ResponseWriter;
use crate::protocol::Request;

/// Request handler invoked by the connection loop.
///
/// [`Handler`] is the variant whose future is `Send`, as required by servers that spawn one
/// task per connection; [`LocalHandler`] drops that requirement.
#[trait_variant::make(Handler: Send)]
pub trait LocalHandler {
    /// Handles one request. Neither argument may be kept past the returned future.
    async fn call(&self, req: &mut Request<'_>, resp: &mut ResponseWriter<'_>);
}

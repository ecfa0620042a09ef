//! Core HTTP protocol types.
//!
//! - **Message Handling** ([`message`]): the items flowing through the codecs
//!   - [`Message`]: either a header or a payload item
//!   - [`PayloadItem`]: a chunk of body bytes or the end of the body
//!   - [`PayloadSize`]: how a body is framed on the wire
//!
//! - **Request Processing** ([`request`]):
//!   - [`RequestHeader`]: the parsed request line and headers
//!   - [`Request`]: what a handler receives, the header plus its body reader
//!
//! - **Response Processing** ([`response`]):
//!   - [`ResponseHead`]: status and headers before the body is written
//!
//! - **Body Streaming** ([`body`]):
//!   - [`ReqBody`]: reader for the request body
//!
//! - **Error Handling** ([`error`]):
//!   - [`HttpError`]: Top-level error type
//!   - [`ParseError`]: Request parsing errors
//!   - [`SendError`]: Response sending errors

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::Request;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
pub use body::ReqBody;

use http::Response;

/// Status, version and headers of a response, serialized by the
/// [`ResponseEncoder`](crate::codec::ResponseEncoder) before any body byte.
///
/// The response writer builds one per request: the version mirrors the request's and the
/// headers are whatever the handler set plus the framing and connection headers.
pub type ResponseHead = Response<()>;

use bytes::{Buf, Bytes};

/// One item of the message stream on a connection.
///
/// Each message is a `Header` followed by `Payload` items, the last of which is always
/// [`PayloadItem::Eof`], even when the message has no body. The request decoder produces
/// this shape and the response encoder consumes it.
#[derive(Debug)]
pub enum Message<T, Data: Buf = Bytes> {
    Header(T),
    Payload(PayloadItem<Data>),
}

impl<T, Data: Buf> Message<T, Data> {
    #[inline]
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }

    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, Message::Payload(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    /// Body bytes, never spanning two messages
    Chunk(Data),
    /// End of the body
    Eof,
}

impl<Data: Buf> PayloadItem<Data> {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }

    pub fn as_bytes(&self) -> Option<&Data> {
        match self {
            PayloadItem::Chunk(data) => Some(data),
            PayloadItem::Eof => None,
        }
    }
}

/// How the bytes of a message body are framed on the wire.
///
/// Exactly one variant is chosen per message, before its body is read or written, and it
/// never changes afterwards.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Exactly this many bytes follow the header block
    Length(u64),
    /// `Transfer-Encoding: chunked`, length unknown up front
    Chunked,
    /// No body at all
    Empty,
}

impl PayloadSize {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }

    /// The body length as a signed number, `-1` when it is unknown (chunked).
    pub fn content_length(&self) -> i64 {
        match self {
            PayloadSize::Length(n) => i64::try_from(*n).unwrap_or(i64::MAX),
            PayloadSize::Chunked => -1,
            PayloadSize::Empty => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_of_each_framing() {
        assert_eq!(PayloadSize::Empty.content_length(), 0);
        assert_eq!(PayloadSize::Length(42).content_length(), 42);
        assert_eq!(PayloadSize::Chunked.content_length(), -1);
        assert!(PayloadSize::Chunked.is_chunked());
    }

    #[test]
    fn payload_item_accessors() {
        let chunk = PayloadItem::Chunk(Bytes::from_static(b"abc"));
        assert!(chunk.is_chunk());
        assert_eq!(chunk.as_bytes().map(|b| b.len()), Some(3));
        assert!(PayloadItem::<Bytes>::Eof.as_bytes().is_none());
    }
}

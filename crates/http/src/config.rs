//! Connection level limits.
//!
//! [`HttpConfig`] is handed to [`HttpConnection::with_config`](crate::connection::HttpConnection::with_config)
//! or to the [`Server`](crate::server::Server) builder. Every connection owns its own copy,
//! so tests can pick boundary values without touching global state.

/// Default bound for request line plus header lines.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 1024 * 1024;

/// Default initial capacity of the read and write buffers.
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    max_header_bytes: usize,
    buffer_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { max_header_bytes: DEFAULT_MAX_HEADER_BYTES, buffer_size: DEFAULT_BUFFER_SIZE }
    }
}

impl HttpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound for the header region of a request. The body is not counted. This also
    /// bounds how many header lines a request may carry.
    pub fn max_header_bytes(mut self, max_header_bytes: usize) -> Self {
        self.max_header_bytes = max_header_bytes;
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn get_max_header_bytes(&self) -> usize {
        self.max_header_bytes
    }

    pub fn get_buffer_size(&self) -> usize {
        self.buffer_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = HttpConfig::new().max_header_bytes(64).buffer_size(512);
        assert_eq!(config.get_max_header_bytes(), 64);
        assert_eq!(config.get_buffer_size(), 512);
        assert_eq!(HttpConfig::default().get_buffer_size(), DEFAULT_BUFFER_SIZE);
    }
}

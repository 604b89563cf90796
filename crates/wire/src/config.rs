//! Limits and buffer sizes shared by the readers and decoders.

/// Default capacity reserved for each read from the underlying source
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Maximum size in bytes allowed for the entire header section
pub const DEFAULT_MAX_HEADER_BYTES: usize = 8 * 1024;

/// Maximum number of headers allowed in a message
pub const DEFAULT_MAX_HEADERS: usize = 64;

/// Largest chunk size a chunked body may declare
pub const DEFAULT_MAX_CHUNK_SIZE: u64 = 16 * 1024 * 1024;

/// Longest chunk extension skipped after a chunk size
pub const DEFAULT_MAX_CHUNK_EXTENSION: usize = 4 * 1024;

/// Tunables for reading HTTP messages off a [`PushbackStream`](crate::stream::PushbackStream).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    read_buffer_size: usize,
    max_header_bytes: usize,
    max_headers: usize,
    max_chunk_size: u64,
    max_chunk_extension: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            max_headers: DEFAULT_MAX_HEADERS,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            max_chunk_extension: DEFAULT_MAX_CHUNK_EXTENSION,
        }
    }
}

impl HttpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    #[must_use]
    pub fn with_max_header_bytes(mut self, max: usize) -> Self {
        self.max_header_bytes = max;
        self
    }

    #[must_use]
    pub fn with_max_headers(mut self, max: usize) -> Self {
        self.max_headers = max;
        self
    }

    #[must_use]
    pub fn with_max_chunk_size(mut self, max: u64) -> Self {
        self.max_chunk_size = max;
        self
    }

    #[must_use]
    pub fn with_max_chunk_extension(mut self, max: usize) -> Self {
        self.max_chunk_extension = max;
        self
    }

    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    pub fn max_header_bytes(&self) -> usize {
        self.max_header_bytes
    }

    pub fn max_headers(&self) -> usize {
        self.max_headers
    }

    pub fn max_chunk_size(&self) -> u64 {
        self.max_chunk_size
    }

    pub fn max_chunk_extension(&self) -> usize {
        self.max_chunk_extension
    }
}

//! Engine limits and the HTTP/2 settings this side advertises.

/// Maximum accumulated header block size (256 KB), for both HTTP/1 heads
/// and HTTP/2 HEADERS + CONTINUATION sequences.
pub const MAX_HEADER_BLOCK_SIZE: usize = 256 * 1024;

/// Maximum number of HTTP/1 header fields in one head.
pub const MAX_HEADERS: usize = 128;

/// Maximum HTTP/1 request line / status line length.
pub const MAX_START_LINE: usize = 8 * 1024;

/// Maximum chunk-size line length in a chunked body.
pub const MAX_CHUNK_LINE: usize = 1024;

/// RFC 7540 default for SETTINGS_INITIAL_WINDOW_SIZE.
pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 = 65_535;

/// RFC 7540 default (and minimum) for SETTINGS_MAX_FRAME_SIZE.
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16_384;

/// Largest legal SETTINGS_MAX_FRAME_SIZE.
pub const MAX_ALLOWED_FRAME_SIZE: u32 = 16_777_215;

/// Largest legal flow-control window.
pub const MAX_WINDOW_SIZE: u32 = 0x7FFF_FFFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    pub max_header_block_size: usize,
    pub max_headers: usize,
    pub max_start_line: usize,
    pub max_chunk_line: usize,
    /// Advertised in SETTINGS and used as the auto WINDOW_UPDATE basis.
    pub initial_window_size: u32,
    pub max_frame_size: u32,
    pub max_concurrent_streams: u32,
    /// Replenish the peer's send window after consuming incoming DATA.
    pub auto_window_update: bool,
    /// Recently closed stream ids remembered per HTTP/2 leg.
    pub closed_stream_memory: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_header_block_size: MAX_HEADER_BLOCK_SIZE,
            max_headers: MAX_HEADERS,
            max_start_line: MAX_START_LINE,
            max_chunk_line: MAX_CHUNK_LINE,
            initial_window_size: DEFAULT_INITIAL_WINDOW_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_concurrent_streams: 100,
            auto_window_update: true,
            closed_stream_memory: 1024,
        }
    }
}

impl ParserConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_header_block_size(mut self, size: usize) -> Self {
        self.max_header_block_size = size;
        self
    }

    #[must_use]
    pub fn max_headers(mut self, count: usize) -> Self {
        self.max_headers = count;
        self
    }

    #[must_use]
    pub fn max_start_line(mut self, len: usize) -> Self {
        self.max_start_line = len;
        self
    }

    #[must_use]
    pub fn max_chunk_line(mut self, len: usize) -> Self {
        self.max_chunk_line = len;
        self
    }

    /// Clamped to the legal window range.
    #[must_use]
    pub fn initial_window_size(mut self, size: u32) -> Self {
        self.initial_window_size = size.min(MAX_WINDOW_SIZE);
        self
    }

    /// Clamped to the legal SETTINGS_MAX_FRAME_SIZE range.
    #[must_use]
    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.max_frame_size = size.clamp(DEFAULT_MAX_FRAME_SIZE, MAX_ALLOWED_FRAME_SIZE);
        self
    }

    #[must_use]
    pub fn max_concurrent_streams(mut self, count: u32) -> Self {
        self.max_concurrent_streams = count;
        self
    }

    #[must_use]
    pub fn auto_window_update(mut self, enabled: bool) -> Self {
        self.auto_window_update = enabled;
        self
    }

    #[must_use]
    pub fn closed_stream_memory(mut self, count: usize) -> Self {
        self.closed_stream_memory = count;
        self
    }
}

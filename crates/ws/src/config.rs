use micro_wire::HttpConfig;

/// Largest single frame payload accepted
pub const DEFAULT_MAX_FRAME_SIZE: u64 = 16 * 1024 * 1024;

/// Largest reassembled message accepted
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Session limits, offered subprotocols and the limits of the handshake's HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsConfig {
    max_frame_size: u64,
    max_message_size: usize,
    protocols: Vec<String>,
    http: HttpConfig,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            protocols: Vec::new(),
            http: HttpConfig::default(),
        }
    }
}

impl WsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_frame_size(mut self, max: u64) -> Self {
        self.max_frame_size = max;
        self
    }

    #[must_use]
    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    /// Subprotocols offered by a client, or supported by a server, in preference order.
    #[must_use]
    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    pub fn max_frame_size(&self) -> u64 {
        self.max_frame_size
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }

    pub fn http(&self) -> &HttpConfig {
        &self.http
    }
}

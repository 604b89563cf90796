use std::io;

use http::{Method, StatusCode};
use micro_wire::protocol::{ParseError, SendError};
use thiserror::Error;

/// Failures of the opening handshake, before a session exists.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("handshake parse error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("handshake send error: {source}")]
    Send {
        #[from]
        source: SendError,
    },

    #[error("expected status 101, got {0}")]
    UnexpectedStatus(StatusCode),

    #[error("missing or invalid upgrade header")]
    InvalidUpgradeHeader,

    #[error("missing or invalid connection header")]
    InvalidConnectionHeader,

    #[error("sec-websocket-accept mismatch, expected {expected}, got {actual:?}")]
    AcceptMismatch { expected: String, actual: Option<String> },

    #[error("missing sec-websocket-key header")]
    MissingKey,

    #[error("sec-websocket-key is not 16 base64 encoded bytes")]
    InvalidKey,

    #[error("unsupported websocket version: {0:?}")]
    UnsupportedVersion(Option<String>),

    #[error("websocket upgrade requires GET, got {0}")]
    InvalidMethod(Method),

    #[error("server picked a subprotocol that was not offered: {0}")]
    UnexpectedProtocol(String),

    #[error("invalid uri: {reason}")]
    InvalidUri { reason: String },

    #[error("invalid header value: {source}")]
    InvalidHeaderValue {
        #[from]
        source: http::header::InvalidHeaderValue,
    },

    #[error("connection closed during handshake")]
    ConnectionClosed,
}

impl HandshakeError {
    pub fn invalid_uri<S: ToString>(str: S) -> Self {
        Self::InvalidUri { reason: str.to_string() }
    }
}

/// Errors of an established session, plus the handshake that preceded it.
#[derive(Debug, Error)]
pub enum WsError {
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error("reserved bits are not zero")]
    ReservedBitsNotZero,

    #[error("invalid opcode {0:#x}")]
    InvalidOpCode(u8),

    #[error("control frame is fragmented")]
    ControlFrameFragmented,

    #[error("control frame payload of {0} bytes exceeds 125")]
    ControlFrameTooLarge(u64),

    #[error("64-bit payload length has its most significant bit set")]
    InvalidPayloadLength,

    #[error("frame payload of {size} bytes exceeds the limit {max_size}")]
    FrameTooLarge { size: u64, max_size: u64 },

    #[error("message of {size} bytes exceeds the limit {max_size}")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("client frame is not masked")]
    UnmaskedFrame,

    #[error("continuation frame without a fragmented message")]
    UnexpectedContinuation,

    #[error("new data frame while a fragmented message is open")]
    ExpectedContinuation,

    #[error("text message is not valid utf-8")]
    InvalidUtf8,

    #[error("invalid close payload: {reason}")]
    InvalidClosePayload { reason: String },

    #[error("close code {0} may not be used")]
    InvalidCloseCode(u16),

    #[error("close reason of {0} bytes exceeds 123")]
    CloseReasonTooLong(usize),

    #[error("connection is not open")]
    NotOpen,

    #[error("stream ended in the middle of a frame")]
    UnexpectedEof,

    #[error("send error: {source}")]
    Send {
        #[from]
        source: SendError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl WsError {
    pub fn invalid_close_payload<S: ToString>(str: S) -> Self {
        Self::InvalidClosePayload { reason: str.to_string() }
    }
}

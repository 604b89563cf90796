use bytes::Bytes;

use crate::error::WsError;

/// A complete data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Bytes),
}

/// What [`WsConnection::next_event`](super::WsConnection::next_event) reports, in order.
///
/// Every session ends with exactly one `Closed`.
#[derive(Debug)]
pub enum Event {
    /// The handshake finished; `protocol` is the negotiated subprotocol
    Opened { protocol: Option<String> },
    Message(Message),
    /// The session failed; a `Closed` with `was_clean: false` follows
    Error(WsError),
    Closed { code: u16, reason: String, was_clean: bool },
}

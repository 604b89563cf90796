//! Close frame payloads (RFC 6455 sections 5.5.1 and 7.4).
//!
//! A close payload is empty, or a big-endian status code followed by a UTF-8 reason,
//! 125 bytes at most.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::WsError;

pub const NORMAL: u16 = 1000;
pub const GOING_AWAY: u16 = 1001;
pub const PROTOCOL_ERROR: u16 = 1002;
pub const UNSUPPORTED_DATA: u16 = 1003;
/// Reported when a close frame carried no code; never sent.
pub const NO_STATUS: u16 = 1005;
/// Reported when the connection ended without a close frame; never sent.
pub const ABNORMAL: u16 = 1006;
pub const INVALID_PAYLOAD: u16 = 1007;
pub const POLICY_VIOLATION: u16 = 1008;
pub const MESSAGE_TOO_BIG: u16 = 1009;
pub const MANDATORY_EXTENSION: u16 = 1010;
pub const INTERNAL_ERROR: u16 = 1011;

/// Longest reason that fits next to a status code.
pub const MAX_REASON_LEN: usize = 123;

/// Status code and reason of a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self { code, reason: reason.into() }
    }
}

/// Encodes a close payload; `None` yields an empty payload.
pub fn encode_close_payload(code: Option<u16>, reason: &str) -> Bytes {
    let Some(code) = code else {
        return Bytes::new();
    };
    let mut payload = BytesMut::with_capacity(2 + reason.len());
    payload.put_u16(code);
    payload.put_slice(reason.as_bytes());
    payload.freeze()
}

/// Decodes a received close payload.
///
/// An empty payload reads as [`NO_STATUS`]. The code must be one a peer may send.
pub fn decode_close_payload(payload: &[u8]) -> Result<CloseReason, WsError> {
    let (code, reason) = match payload {
        [] => return Ok(CloseReason::new(NO_STATUS, "")),
        [_] => return Err(WsError::invalid_close_payload("one byte close payload")),
        [hi, lo, reason @ ..] => (u16::from_be_bytes([*hi, *lo]), reason),
    };

    if !is_receivable_code(code) {
        return Err(WsError::InvalidCloseCode(code));
    }
    let reason = std::str::from_utf8(reason).map_err(|e| WsError::invalid_close_payload(format!("reason is not utf-8: {e}")))?;
    Ok(CloseReason::new(code, reason))
}

/// Checks a code and reason this side wants to send.
///
/// Only 1000 and the application range `3000..=4999` may be sent explicitly.
pub fn validate_outgoing(code: Option<u16>, reason: &str) -> Result<(), WsError> {
    if let Some(code) = code {
        if code != NORMAL && !(3000..=4999).contains(&code) {
            return Err(WsError::InvalidCloseCode(code));
        }
    }
    if reason.len() > MAX_REASON_LEN {
        return Err(WsError::CloseReasonTooLong(reason.len()));
    }
    Ok(())
}

fn is_receivable_code(code: u16) -> bool {
    matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_close_without_reason() {
        let payload = encode_close_payload(Some(NORMAL), "");
        assert_eq!(&payload[..], [0x03, 0xE8]);
        assert_eq!(decode_close_payload(&payload).unwrap(), CloseReason::new(1000, ""));
    }

    #[test]
    fn code_and_reason() {
        let payload = encode_close_payload(Some(4000), "bye now");
        assert_eq!(decode_close_payload(&payload).unwrap(), CloseReason::new(4000, "bye now"));
    }

    #[test]
    fn empty_payload_is_no_status() {
        assert!(encode_close_payload(None, "").is_empty());
        assert_eq!(decode_close_payload(&[]).unwrap(), CloseReason::new(NO_STATUS, ""));
    }

    #[test]
    fn malformed_payloads() {
        assert!(matches!(decode_close_payload(&[0x03]), Err(WsError::InvalidClosePayload { .. })));
        assert!(matches!(decode_close_payload(&[0x03, 0xE8, 0xFF, 0xFE]), Err(WsError::InvalidClosePayload { .. })));
        // 1005 and 1006 are never put on the wire
        assert!(matches!(decode_close_payload(&[0x03, 0xED]), Err(WsError::InvalidCloseCode(1005))));
        assert!(matches!(decode_close_payload(&[0x03, 0xEE]), Err(WsError::InvalidCloseCode(1006))));
        assert!(matches!(decode_close_payload(&[0x13, 0x88]), Err(WsError::InvalidCloseCode(5000))));
    }

    #[test]
    fn outgoing_rules() {
        assert!(validate_outgoing(Some(1000), "").is_ok());
        assert!(validate_outgoing(Some(3000), "").is_ok());
        assert!(validate_outgoing(Some(4999), "").is_ok());
        assert!(validate_outgoing(None, "").is_ok());
        assert!(matches!(validate_outgoing(Some(1001), ""), Err(WsError::InvalidCloseCode(1001))));
        assert!(matches!(validate_outgoing(Some(2999), ""), Err(WsError::InvalidCloseCode(2999))));
        assert!(matches!(validate_outgoing(Some(5000), ""), Err(WsError::InvalidCloseCode(5000))));

        assert!(validate_outgoing(Some(1000), &"a".repeat(123)).is_ok());
        assert!(matches!(validate_outgoing(Some(1000), &"a".repeat(124)), Err(WsError::CloseReasonTooLong(124))));
        // three bytes per char once encoded
        assert!(matches!(validate_outgoing(Some(1000), &"€".repeat(42)), Err(WsError::CloseReasonTooLong(126))));
    }
}

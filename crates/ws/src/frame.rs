//! Frame headers and frame serialization (RFC 6455 section 5.2)
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |         (16 or 64 bits)       |
//! |N|V|V|V|       |S|             |                               |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                               |   Masking-key, if MASK set to 1|
//! +-------------------------------+-------------------------------+
//! ```
//!
//! Everything here is pure: [`parse_header`] looks at a byte window and never consumes
//! it, [`build_frame`] returns a complete frame ready to be written.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::WsError;
use crate::mask::apply_mask;

/// Largest payload a control frame may carry
pub const MAX_CONTROL_PAYLOAD: u64 = 125;

/// Longest possible frame header: 2 bytes, 8 bytes of length and a mask key
pub const MAX_HEAD_SIZE: usize = 14;

const FIN: u8 = 0x80;
const RSV: u8 = 0x70;
const OPCODE: u8 = 0x0F;
const MASK: u8 = 0x80;
const LEN7: u8 = 0x7F;

/// What a frame carries.
///
/// `0x3..=0x7` and `0xB..=0xF` are reserved and rejected.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    /// Close, Ping and Pong: never fragmented, at most 125 payload bytes.
    pub fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

impl TryFrom<u8> for OpCode {
    type Error = WsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            v => Err(WsError::InvalidOpCode(v)),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(opcode: OpCode) -> Self {
        match opcode {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }
}

/// A parsed frame header; `mask_key` is present exactly when the frame is masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub fin: bool,
    pub opcode: OpCode,
    pub mask_key: Option<[u8; 4]>,
    pub payload_len: u64,
    /// Bytes taken by the header itself; the payload starts right after.
    pub header_size: usize,
}

impl FrameHeader {
    pub fn is_masked(&self) -> bool {
        self.mask_key.is_some()
    }

    /// Header plus payload length.
    pub fn frame_len(&self) -> u64 {
        self.header_size as u64 + self.payload_len
    }
}

/// A whole frame with its payload unmasked.
///
/// Decoded frames keep the key they were masked with; when encoding, `mask_key` is the
/// key to mask the payload with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: OpCode,
    pub mask_key: Option<[u8; 4]>,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self { fin: true, opcode, mask_key: None, payload: payload.into() }
    }

    #[must_use]
    pub fn with_fin(mut self, fin: bool) -> Self {
        self.fin = fin;
        self
    }

    #[must_use]
    pub fn with_mask(mut self, mask_key: Option<[u8; 4]>) -> Self {
        self.mask_key = mask_key;
        self
    }
}

/// Parses the frame header at the start of `window`.
///
/// `Ok(None)` means the window does not hold the whole header yet. Frames whose payload
/// is longer than `max_payload` are rejected.
pub fn parse_header(window: &[u8], max_payload: u64) -> Result<Option<FrameHeader>, WsError> {
    let [b0, b1, rest @ ..] = window else {
        return Ok(None);
    };

    if b0 & RSV != 0 {
        return Err(WsError::ReservedBitsNotZero);
    }
    let fin = b0 & FIN != 0;
    let opcode = OpCode::try_from(b0 & OPCODE)?;
    if opcode.is_control() && !fin {
        return Err(WsError::ControlFrameFragmented);
    }

    let masked = b1 & MASK != 0;
    let len7 = b1 & LEN7;
    let extra = match len7 {
        126 => 2,
        127 => 8,
        _ => 0,
    };
    let mask_size = if masked { 4 } else { 0 };
    if rest.len() < extra + mask_size {
        return Ok(None);
    }

    let payload_len = match len7 {
        126 => u64::from(u16::from_be_bytes([rest[0], rest[1]])),
        127 => {
            let mut length = [0u8; 8];
            length.copy_from_slice(&rest[..8]);
            if length[0] & 0x80 != 0 {
                return Err(WsError::InvalidPayloadLength);
            }
            u64::from_be_bytes(length)
        }
        len => u64::from(len),
    };

    if opcode.is_control() && payload_len > MAX_CONTROL_PAYLOAD {
        return Err(WsError::ControlFrameTooLarge(payload_len));
    }
    if payload_len > max_payload {
        return Err(WsError::FrameTooLarge { size: payload_len, max_size: max_payload });
    }

    let mask_key = masked.then(|| [rest[extra], rest[extra + 1], rest[extra + 2], rest[extra + 3]]);

    Ok(Some(FrameHeader { fin, opcode, mask_key, payload_len, header_size: 2 + extra + mask_size }))
}

/// Builds one unfragmented frame, masking the payload when a key is given.
pub fn build_frame(opcode: OpCode, payload: &[u8], mask_key: Option<[u8; 4]>) -> Bytes {
    let mut dst = BytesMut::with_capacity(MAX_HEAD_SIZE + payload.len());
    write_frame(true, opcode, payload, mask_key, &mut dst);
    dst.freeze()
}

/// Appends a frame to `dst` using the shortest length encoding.
pub fn write_frame(fin: bool, opcode: OpCode, payload: &[u8], mask_key: Option<[u8; 4]>, dst: &mut BytesMut) {
    dst.reserve(MAX_HEAD_SIZE + payload.len());

    let b0 = (if fin { FIN } else { 0 }) | u8::from(opcode);
    dst.put_u8(b0);

    let mask_bit = if mask_key.is_some() { MASK } else { 0 };
    if let Some(len7) = u8::try_from(payload.len()).ok().filter(|len| *len <= 125) {
        dst.put_u8(mask_bit | len7);
    } else if let Ok(len16) = u16::try_from(payload.len()) {
        dst.put_u8(mask_bit | 126);
        dst.put_u16(len16);
    } else {
        dst.put_u8(mask_bit | 127);
        dst.put_u64(payload.len() as u64);
    }

    match mask_key {
        Some(key) => {
            dst.put_slice(&key);
            let start = dst.len();
            dst.put_slice(payload);
            apply_mask(&mut dst[start..], key);
        }
        None => dst.put_slice(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_LIMIT: u64 = u64::MAX;

    fn payload_of(frame: &[u8], header: &FrameHeader) -> Vec<u8> {
        let mut payload = frame[header.header_size..].to_vec();
        if let Some(key) = header.mask_key {
            apply_mask(&mut payload, key);
        }
        payload
    }

    #[test]
    fn unmasked_text_frame() {
        let frame = build_frame(OpCode::Text, b"hello", None);
        assert_eq!(&frame[..], b"\x81\x05hello");

        let header = parse_header(&frame, NO_LIMIT).unwrap().unwrap();
        assert!(header.fin);
        assert_eq!(header.opcode, OpCode::Text);
        assert!(!header.is_masked());
        assert_eq!(header.payload_len, 5);
        assert_eq!(header.header_size, 2);
        assert_eq!(&frame[header.header_size..], b"hello");
    }

    #[test]
    fn masked_frames_of_every_length_class() {
        let key = [1, 2, 3, 4];
        for len in [0usize, 1, 125, 126, 127, 0xFFFF, 0x1_0000] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let frame = build_frame(OpCode::Binary, &payload, Some(key));

            let header = parse_header(&frame, NO_LIMIT).unwrap().unwrap();
            assert_eq!(header.opcode, OpCode::Binary);
            assert_eq!(header.mask_key, Some(key));
            assert_eq!(header.payload_len, len as u64);
            assert_eq!(header.frame_len(), frame.len() as u64);
            assert_eq!(payload_of(&frame, &header), payload, "length {len}");
        }
    }

    #[test]
    fn shortest_length_encoding() {
        assert_eq!(build_frame(OpCode::Binary, &[0; 125], None)[1], 125);
        assert_eq!(build_frame(OpCode::Binary, &[0; 126], None)[1..4], [126, 0, 126]);
        assert_eq!(build_frame(OpCode::Binary, &[0; 0x1_0000], None)[1..10], [127, 0, 0, 0, 0, 0, 1, 0, 0]);
    }

    #[test]
    fn needs_more_bytes() {
        let frame = build_frame(OpCode::Binary, &[7; 300], Some([9, 9, 9, 9]));
        let header_size = parse_header(&frame, NO_LIMIT).unwrap().unwrap().header_size;
        assert_eq!(header_size, 8);

        for end in 0..header_size {
            assert_eq!(parse_header(&frame[..end], NO_LIMIT).unwrap(), None, "prefix {end}");
        }
        assert!(parse_header(&frame[..header_size], NO_LIMIT).unwrap().is_some());
    }

    #[test]
    fn reserved_bits_and_opcodes() {
        assert!(matches!(parse_header(&[0xC1, 0x00], NO_LIMIT), Err(WsError::ReservedBitsNotZero)));
        assert!(matches!(parse_header(&[0x83, 0x00], NO_LIMIT), Err(WsError::InvalidOpCode(0x3))));
        assert!(matches!(parse_header(&[0x8B, 0x00], NO_LIMIT), Err(WsError::InvalidOpCode(0xB))));
    }

    #[test]
    fn control_frame_rules() {
        // ping without FIN
        assert!(matches!(parse_header(&[0x09, 0x00], NO_LIMIT), Err(WsError::ControlFrameFragmented)));
        // close with 126 bytes
        assert!(matches!(parse_header(&[0x88, 126, 0, 126], NO_LIMIT), Err(WsError::ControlFrameTooLarge(126))));
        assert!(parse_header(&[0x8A, 125], NO_LIMIT).unwrap().is_some());
    }

    #[test]
    fn length_limits() {
        let frame = [0x82, 127, 0x80, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(parse_header(&frame, NO_LIMIT), Err(WsError::InvalidPayloadLength)));

        let frame = build_frame(OpCode::Binary, &[0; 200], None);
        assert!(matches!(parse_header(&frame, 199), Err(WsError::FrameTooLarge { size: 200, max_size: 199 })));
        assert!(parse_header(&frame, 200).unwrap().is_some());
    }

    #[test]
    fn continuation_without_fin() {
        let mut dst = BytesMut::new();
        write_frame(false, OpCode::Text, b"he", None, &mut dst);
        write_frame(true, OpCode::Continuation, b"llo", None, &mut dst);

        let first = parse_header(&dst, NO_LIMIT).unwrap().unwrap();
        assert!(!first.fin);
        assert_eq!(first.opcode, OpCode::Text);

        let second = parse_header(&dst[first.header_size + 2..], NO_LIMIT).unwrap().unwrap();
        assert!(second.fin);
        assert_eq!(second.opcode, OpCode::Continuation);
    }

    #[test]
    fn opcode_values() {
        for value in [0x0, 0x1, 0x2, 0x8, 0x9, 0xA] {
            assert_eq!(u8::from(OpCode::try_from(value).unwrap()), value);
        }
        assert!(OpCode::Ping.is_control());
        assert!(!OpCode::Continuation.is_control());
    }
}

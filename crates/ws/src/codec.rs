//! [`tokio_util::codec`] adapters around [`parse_header`] and [`write_frame`].

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::error::WsError;
use crate::frame::{Frame, MAX_HEAD_SIZE, parse_header, write_frame};
use crate::mask::apply_mask;

/// Splits whole frames off a buffer and unmasks their payload.
#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder {
    max_frame_size: u64,
}

impl FrameDecoder {
    pub fn new(max_frame_size: u64) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> u64 {
        self.max_frame_size
    }
}

impl Decoder for FrameDecoder {
    type Item = Frame;
    type Error = WsError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(header) = parse_header(src, self.max_frame_size)? else {
            src.reserve(MAX_HEAD_SIZE);
            return Ok(None);
        };

        let payload_len =
            usize::try_from(header.payload_len).map_err(|_e| WsError::FrameTooLarge { size: header.payload_len, max_size: self.max_frame_size })?;
        let frame_len = header.header_size + payload_len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(header.header_size);
        let mut payload = src.split_to(payload_len);
        if let Some(key) = header.mask_key {
            apply_mask(&mut payload, key);
        }

        trace!(opcode = ?header.opcode, fin = header.fin, len = payload_len, "decoded frame");
        Ok(Some(Frame { fin: header.fin, opcode: header.opcode, mask_key: header.mask_key, payload: payload.freeze() }))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(WsError::UnexpectedEof),
        }
    }
}

/// Serializes frames, masking them with their own `mask_key`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameEncoder;

impl Encoder<Frame> for FrameEncoder {
    type Error = WsError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        write_frame(frame.fin, frame.opcode, &frame.payload, frame.mask_key, dst);
        Ok(())
    }
}

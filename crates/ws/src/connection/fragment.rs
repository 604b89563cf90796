use bytes::{Bytes, BytesMut};

use crate::error::WsError;
use crate::frame::OpCode;

/// Collects the frames of one fragmented message.
#[derive(Debug, Default)]
pub(crate) struct FragmentAccumulator {
    opcode: Option<OpCode>,
    parts: Vec<Bytes>,
    len: usize,
}

impl FragmentAccumulator {
    pub(crate) fn is_open(&self) -> bool {
        self.opcode.is_some()
    }

    /// Starts a message with its first, non-final frame.
    pub(crate) fn start(&mut self, opcode: OpCode, payload: Bytes, max_size: usize) -> Result<(), WsError> {
        if self.is_open() {
            return Err(WsError::ExpectedContinuation);
        }
        self.opcode = Some(opcode);
        self.push(payload, max_size)
    }

    /// Appends a continuation frame.
    pub(crate) fn push(&mut self, payload: Bytes, max_size: usize) -> Result<(), WsError> {
        if !self.is_open() {
            return Err(WsError::UnexpectedContinuation);
        }
        let len = self.len + payload.len();
        if len > max_size {
            return Err(WsError::MessageTooLarge { size: len, max_size });
        }
        self.len = len;
        if !payload.is_empty() {
            self.parts.push(payload);
        }
        Ok(())
    }

    /// Ends the message, returning the opcode of its first frame and the joined payload.
    pub(crate) fn finish(&mut self) -> Result<(OpCode, Bytes), WsError> {
        let opcode = self.opcode.take().ok_or(WsError::UnexpectedContinuation)?;
        let payload = match self.parts.len() {
            0 => Bytes::new(),
            1 => self.parts.remove(0),
            _ => {
                let mut joined = BytesMut::with_capacity(self.len);
                for part in self.parts.drain(..) {
                    joined.extend_from_slice(&part);
                }
                joined.freeze()
            }
        };
        self.clear();
        Ok((opcode, payload))
    }

    pub(crate) fn clear(&mut self) {
        self.opcode = None;
        self.parts.clear();
        self.len = 0;
    }
}

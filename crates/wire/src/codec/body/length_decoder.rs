//! Decoder for payloads framed by `content-length`, see
//! [RFC 9112 Section 6.2](https://www.rfc-editor.org/rfc/rfc9112.html#section-6.2).
//!
//! It also reads the data section of every chunk for [`ChunkedDecoder`](super::ChunkedDecoder).

use std::cmp;

use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Hands out exactly `length` bytes, then a single [`PayloadItem::Eof`].
///
/// Bytes past the declared length are left in the source buffer untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    /// The number of bytes remaining to be read from the payload
    length: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { length }
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.length
    }

    #[inline]
    pub fn is_finish(&self) -> bool {
        self.length == 0
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.length == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        // the min fits in usize because src.len() does
        let len = cmp::min(self.length, src.len() as u64);
        let bytes = src.split_to(usize::try_from(len).unwrap_or(src.len())).freeze();

        self.length -= bytes.len() as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(ParseError::UnexpectedEof),
        }
    }
}

use crate::ensure;
use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;

/// Writes a body whose length was announced in `content-length`.
///
/// Writing past the announced length, or ending the body short of it, is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    length: u64,
    eof: bool,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { length, eof: false }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(mut bytes) => {
                let size = bytes.remaining() as u64;
                ensure!(
                    size <= self.length,
                    SendError::invalid_body(format!("body exceeds content-length by {} bytes", size - self.length))
                );
                while bytes.has_remaining() {
                    let chunk = bytes.chunk();
                    let n = chunk.len();
                    dst.extend_from_slice(chunk);
                    bytes.advance(n);
                }
                self.length -= size;
                Ok(())
            }
            PayloadItem::Eof => {
                ensure!(self.length == 0, SendError::invalid_body(format!("body ended {} bytes short of content-length", self.length)));
                self.eof = true;
                Ok(())
            }
        }
    }
}

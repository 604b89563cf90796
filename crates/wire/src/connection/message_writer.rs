use crate::codec::{HeaderEncoder, ResponseEncoder};
use crate::protocol::{Message, PayloadSize, RequestHead, ResponseHead, SendError};
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;

const DEFAULT_WRITE_BUFFER_SIZE: usize = 8 * 1024;

/// Buffers encoded messages in front of an [`AsyncWrite`].
///
/// Encoding only fills the buffer; nothing reaches the writer before [`flush`](Self::flush).
#[derive(Debug)]
pub struct MessageWriter<W> {
    writer: W,
    buffer: BytesMut,
    encoder: ResponseEncoder,
}

impl<W> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_capacity(writer, DEFAULT_WRITE_BUFFER_SIZE)
    }

    pub fn with_capacity(writer: W, buffer_size: usize) -> Self {
        Self { writer, buffer: BytesMut::with_capacity(buffer_size), encoder: ResponseEncoder::new() }
    }

    #[inline]
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Returns the writer; bytes not yet flushed are dropped.
    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    pub fn clear_buf(&mut self) {
        self.buffer.clear();
    }

    #[inline]
    pub fn write<D>(&mut self, item: Message<(ResponseHead, PayloadSize), D>) -> Result<(), SendError>
    where
        D: Buf,
    {
        self.encoder.encode(item, &mut self.buffer)
    }

    pub fn write_request_head(&mut self, head: RequestHead) -> Result<(), SendError> {
        HeaderEncoder.encode(head, &mut self.buffer)
    }

    /// Appends pre-encoded bytes, such as an interim response or a WebSocket frame.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }
}

impl<W> MessageWriter<W>
where
    W: AsyncWrite + Unpin,
{
    #[inline]
    pub async fn flush(&mut self) -> Result<(), SendError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        self.writer.write_all(self.buffer.as_ref()).await?;
        self.buffer.clear();
        Ok(self.writer.flush().await?)
    }

    /// Flushes what is buffered, then shuts the writer down.
    pub async fn shutdown(&mut self) -> Result<(), SendError> {
        self.flush().await?;
        Ok(self.writer.shutdown().await?)
    }
}

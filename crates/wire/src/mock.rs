//! Scripted readers for exercising chunk boundaries in tests.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, ReadBuf};

#[derive(Debug)]
enum Step {
    Data(Bytes),
    Error(io::ErrorKind),
}

/// An [`AsyncRead`] that hands out one scripted chunk per read call.
///
/// A chunk larger than the caller's buffer is split across consecutive reads. Once the
/// script is exhausted every read reports end of stream.
#[derive(Debug, Default)]
pub struct ChunkedReader {
    steps: VecDeque<Step>,
}

impl ChunkedReader {
    pub fn new<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        // an empty chunk would read as end of stream
        let steps = chunks
            .into_iter()
            .filter(|chunk| !chunk.as_ref().is_empty())
            .map(|chunk| Step::Data(Bytes::copy_from_slice(chunk.as_ref())))
            .collect();
        Self { steps }
    }

    /// Splits `data` into chunks of at most `size` bytes.
    pub fn split_every(data: impl AsRef<[u8]>, size: usize) -> Self {
        Self::new(data.as_ref().chunks(size.max(1)))
    }

    #[must_use]
    pub fn then_data(mut self, chunk: impl AsRef<[u8]>) -> Self {
        self.steps.push_back(Step::Data(Bytes::copy_from_slice(chunk.as_ref())));
        self
    }

    #[must_use]
    pub fn then_error(mut self, kind: io::ErrorKind) -> Self {
        self.steps.push_back(Step::Error(kind));
        self
    }

    pub fn is_drained(&self) -> bool {
        self.steps.is_empty()
    }
}

impl AsyncRead for ChunkedReader {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match this.steps.pop_front() {
            Some(Step::Data(mut chunk)) => {
                let n = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk.split_to(n));
                if !chunk.is_empty() {
                    this.steps.push_front(Step::Data(chunk));
                }
                Poll::Ready(Ok(()))
            }
            Some(Step::Error(kind)) => Poll::Ready(Err(io::Error::new(kind, "scripted read error"))),
            None => Poll::Ready(Ok(())),
        }
    }
}

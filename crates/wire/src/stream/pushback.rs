use std::collections::VecDeque;
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncRead;
use tokio_util::io::poll_read_buf;
use tracing::{debug, trace};

use crate::config::DEFAULT_READ_BUFFER_SIZE;
use crate::stream::Gate;

/// A pull-based byte reader over an [`AsyncRead`] that can take bytes back.
///
/// Consumers that read past a delimiter hand the unconsumed remainder back with
/// [`unshift`](PushbackStream::unshift); the next [`read`](PushbackStream::read)
/// returns it before touching the source again. The stream starts paused: only
/// pushback bytes are delivered until the [`Gate`] is resumed.
#[derive(Debug)]
pub struct PushbackStream<R> {
    reader: R,
    pushback: VecDeque<Bytes>,
    read_buf: BytesMut,
    capacity: usize,
    gate: Gate,
    state: State,
    reusable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Eof,
    Failed,
    Cancelled,
}

impl<R> PushbackStream<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, DEFAULT_READ_BUFFER_SIZE)
    }

    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            reader,
            pushback: VecDeque::new(),
            read_buf: BytesMut::with_capacity(capacity),
            capacity,
            gate: Gate::new(true),
            state: State::Open,
            reusable: true,
        }
    }

    /// Puts `bytes` in front of everything not yet read.
    ///
    /// Segments unshifted later are read first, so a consumer returning several
    /// pieces must unshift them last-to-first.
    pub fn unshift(&mut self, bytes: Bytes) {
        if bytes.is_empty() || self.state == State::Cancelled {
            return;
        }
        trace!(len = bytes.len(), "unshift bytes");
        self.pushback.push_front(bytes);
    }

    pub fn pause(&self) {
        self.gate.pause();
    }

    pub fn resume(&self) {
        self.gate.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }

    /// A handle on this stream's pause switch.
    pub fn gate(&self) -> Gate {
        self.gate.clone()
    }

    /// Number of bytes waiting in the pushback buffer.
    pub fn buffered_len(&self) -> usize {
        self.pushback.iter().map(Bytes::len).sum()
    }

    /// True once the source reported end of stream and nothing is pushed back.
    pub fn is_eof(&self) -> bool {
        self.state == State::Eof && self.pushback.is_empty()
    }

    /// Stops the stream for good and drops any pushed back bytes.
    ///
    /// Returns `true` only for the call that actually cancelled it.
    pub fn cancel(&mut self) -> bool {
        if self.state == State::Cancelled {
            return false;
        }
        debug!(dropped = self.buffered_len(), "cancel stream");
        self.state = State::Cancelled;
        self.pushback.clear();
        self.reusable = false;
        // a reader suspended on the gate must observe the cancellation
        self.gate.resume();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == State::Cancelled
    }

    /// Whether another message may still be read from this stream.
    ///
    /// False after a source error, a cancellation, or a body that was abandoned or
    /// failed to decode, since the position in the byte stream is then unknown.
    pub fn is_reusable(&self) -> bool {
        self.reusable && matches!(self.state, State::Open | State::Eof)
    }

    pub(crate) fn mark_unreusable(&mut self) {
        self.reusable = false;
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Returns the source together with the bytes still pushed back, in read order.
    pub fn into_inner(self) -> (R, Bytes) {
        let mut rest = BytesMut::with_capacity(self.buffered_len());
        for segment in &self.pushback {
            rest.extend_from_slice(segment);
        }
        (self.reader, rest.freeze())
    }
}

impl<R> PushbackStream<R>
where
    R: AsyncRead + Unpin,
{
    /// Polls for the next segment of bytes, `None` once the source is exhausted.
    pub fn poll_read(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<Option<Bytes>>> {
        match self.state {
            State::Cancelled => return Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionAborted, "stream cancelled"))),
            State::Failed => return Poll::Ready(Err(io::Error::other("stream failed on a previous read"))),
            State::Open | State::Eof => {}
        }

        if let Some(bytes) = self.pushback.pop_front() {
            return Poll::Ready(Ok(Some(bytes)));
        }

        if self.state == State::Eof {
            return Poll::Ready(Ok(None));
        }

        ready!(self.gate.poll_resumed(cx));
        if self.state == State::Cancelled {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionAborted, "stream cancelled")));
        }

        if self.read_buf.capacity() < self.capacity {
            self.read_buf.reserve(self.capacity);
        }

        match ready!(poll_read_buf(Pin::new(&mut self.reader), cx, &mut self.read_buf)) {
            Ok(0) => {
                trace!("source reached eof");
                self.state = State::Eof;
                Poll::Ready(Ok(None))
            }
            Ok(n) => {
                trace!(len = n, "read bytes from source");
                Poll::Ready(Ok(Some(self.read_buf.split().freeze())))
            }
            Err(e) => {
                debug!(cause = %e, "source read failed");
                self.state = State::Failed;
                self.reusable = false;
                Poll::Ready(Err(e))
            }
        }
    }

    pub async fn read(&mut self) -> io::Result<Option<Bytes>> {
        poll_fn(|cx| self.poll_read(cx)).await
    }

    /// Opens the gate for one poll of a read and closes it again before returning, so a
    /// pull that is dropped while pending leaves the stream paused.
    pub fn poll_pull(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<Option<Bytes>>> {
        if self.pushback.is_empty() {
            self.gate.resume();
        }
        let result = self.poll_read(cx);
        if !self.is_cancelled() {
            self.gate.pause();
        }
        result
    }

    pub async fn pull(&mut self) -> io::Result<Option<Bytes>> {
        poll_fn(|cx| self.poll_pull(cx)).await
    }
}

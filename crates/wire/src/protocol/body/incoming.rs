use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Bytes, BytesMut};
use http_body::{Body, Frame, SizeHint};
use tokio::io::AsyncRead;
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use crate::codec::body::PayloadDecoder;
use crate::config::HttpConfig;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};
use crate::stream::PushbackStream;

/// The body of a message read off a [`PushbackStream`].
///
/// Bytes are pulled only while a frame is being polled, and the stream gate is closed
/// again after every read. The moment the framing says the body is complete, bytes
/// read past its end go back to the stream, so the borrow can end and the next message
/// be read. A body dropped before its end cancels the stream, which can no longer be
/// resynchronised.
#[derive(Debug)]
pub struct IncomingBody<'s, R> {
    stream: Option<&'s mut PushbackStream<R>>,
    decoder: PayloadDecoder,
    buf: BytesMut,
    payload_size: PayloadSize,
    state: State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Reading,
    Done,
    Failed,
}

impl<'s, R> IncomingBody<'s, R> {
    pub(crate) fn new(stream: &'s mut PushbackStream<R>, payload_size: PayloadSize, config: &HttpConfig) -> Self {
        if payload_size.is_empty() {
            return Self::empty();
        }
        Self {
            stream: Some(stream),
            decoder: PayloadDecoder::new(payload_size, config),
            buf: BytesMut::new(),
            payload_size,
            state: State::Reading,
        }
    }

    /// A body without bytes that never touches a stream.
    pub fn empty() -> Self {
        Self {
            stream: None,
            decoder: PayloadDecoder::empty(),
            buf: BytesMut::new(),
            payload_size: PayloadSize::Empty,
            state: State::Done,
        }
    }

    pub fn payload_size(&self) -> PayloadSize {
        self.payload_size
    }

    /// True once every byte of the body was read.
    pub fn is_finished(&self) -> bool {
        self.state == State::Done
    }

    pub fn is_failed(&self) -> bool {
        self.state == State::Failed
    }

    /// Gives up on an unfinished body, cancelling its stream.
    ///
    /// Returns `true` if this call cancelled the stream.
    pub fn abandon(&mut self) -> bool {
        if self.state != State::Reading {
            return false;
        }
        self.state = State::Failed;
        match self.stream.take() {
            Some(stream) => {
                debug!(payload_size = ?self.payload_size, "abandon unfinished body");
                stream.cancel()
            }
            None => false,
        }
    }

    fn finish(&mut self) {
        self.state = State::Done;
        if let Some(stream) = self.stream.take() {
            trace!(rest = self.buf.len(), "body finished");
            stream.unshift(self.buf.split().freeze());
        }
    }

    fn fail(&mut self, e: ParseError) -> ParseError {
        self.state = State::Failed;
        if let Some(stream) = self.stream.take() {
            debug!(cause = %e, "body failed");
            stream.mark_unreusable();
        }
        e
    }

    fn on_item(&mut self, item: PayloadItem) -> Option<Bytes> {
        match item {
            PayloadItem::Chunk(bytes) => {
                if self.decoder.is_finish() {
                    self.finish();
                }
                Some(bytes)
            }
            PayloadItem::Eof => {
                self.finish();
                None
            }
        }
    }
}

impl<R> IncomingBody<'_, R>
where
    R: AsyncRead + Unpin,
{
    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Bytes, ParseError>>> {
        loop {
            if self.state != State::Reading {
                return Poll::Ready(None);
            }

            match self.decoder.decode(&mut self.buf) {
                Ok(Some(item)) => return Poll::Ready(self.on_item(item).map(Ok)),
                Ok(None) => {}
                Err(e) => return Poll::Ready(Some(Err(self.fail(e)))),
            }

            let Some(stream) = self.stream.as_mut() else {
                return Poll::Ready(Some(Err(self.fail(ParseError::BodyCancelled))));
            };

            match ready!(stream.poll_pull(cx)) {
                Ok(Some(bytes)) => {
                    if self.buf.is_empty() {
                        self.buf = BytesMut::from(bytes);
                    } else {
                        self.buf.extend_from_slice(&bytes);
                    }
                }
                Ok(None) => {
                    return match self.decoder.decode_eof(&mut self.buf) {
                        Ok(Some(item)) => Poll::Ready(self.on_item(item).map(Ok)),
                        Ok(None) => Poll::Ready(Some(Err(self.fail(ParseError::UnexpectedEof)))),
                        Err(e) => Poll::Ready(Some(Err(self.fail(e)))),
                    };
                }
                Err(e) => return Poll::Ready(Some(Err(self.fail(ParseError::io(e))))),
            }
        }
    }
}

impl<R> Body for IncomingBody<'_, R>
where
    R: AsyncRead + Unpin,
{
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        this.poll_chunk(cx).map(|chunk| chunk.map(|result| result.map(Frame::data)))
    }

    fn is_end_stream(&self) -> bool {
        self.state != State::Reading
    }

    fn size_hint(&self) -> SizeHint {
        match self.decoder.remaining() {
            // buffered bytes are still part of `remaining`
            Some(remaining) if self.state == State::Reading => SizeHint::with_exact(remaining),
            Some(_) => SizeHint::with_exact(0),
            None => self.payload_size.into(),
        }
    }
}

impl<R> Drop for IncomingBody<'_, R> {
    fn drop(&mut self) {
        self.abandon();
    }
}

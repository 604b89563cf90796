use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;

use futures::channel::{mpsc, oneshot};
use futures::{FutureExt, SinkExt, StreamExt};

use http_body::{Body, Frame, SizeHint};
use http_body_util::BodyExt;
use tokio::io::AsyncRead;
use tracing::{debug, error};

use crate::protocol::body::IncomingBody;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};

type ChunkSender = oneshot::Sender<Result<PayloadItem, ParseError>>;

/// Request body handed to a [`Handler`](crate::handler::Handler).
///
/// The connection keeps the [`IncomingBody`], which borrows the connection's stream,
/// inside a [`ReqBodySender`]. `ReqBody` owns nothing but a channel to it, so it is
/// `Send + 'static` and can move into the handler future. Every poll asks the sender
/// for exactly one chunk, so bytes are only read off the connection when the handler
/// wants them.
#[derive(Debug)]
pub struct ReqBody {
    signal: mpsc::Sender<ChunkSender>,
    receiving: Option<oneshot::Receiver<Result<PayloadItem, ParseError>>>,
    payload_size: PayloadSize,
    remaining: Option<u64>,
    eof: bool,
}

impl ReqBody {
    fn new(signal: mpsc::Sender<ChunkSender>, payload_size: PayloadSize) -> Self {
        let remaining = match payload_size {
            PayloadSize::Length(length) => Some(length),
            PayloadSize::Empty => Some(0),
            PayloadSize::Chunked | PayloadSize::Identity => None,
        };
        Self { signal, receiving: None, payload_size, remaining, eof: payload_size.is_empty() }
    }

    /// Splits `body` into the handler side and the connection side.
    pub fn body_channel<R>(body: IncomingBody<'_, R>) -> (ReqBody, ReqBodySender<'_, R>) {
        let (tx, receiver) = mpsc::channel(1);
        let req_body = ReqBody::new(tx, body.payload_size());
        (req_body, ReqBodySender { body, receiver })
    }

    pub fn payload_size(&self) -> PayloadSize {
        self.payload_size
    }
}

/// Connection side of a [`ReqBody`], answering its chunk requests from an [`IncomingBody`].
#[derive(Debug)]
pub struct ReqBodySender<'conn, R> {
    body: IncomingBody<'conn, R>,
    receiver: mpsc::Receiver<ChunkSender>,
}

impl<R> ReqBodySender<'_, R>
where
    R: AsyncRead + Unpin,
{
    /// Serves chunk requests until the body ends, fails, or the [`ReqBody`] is dropped.
    pub async fn send_body(&mut self) -> Result<(), ParseError> {
        while let Some(sender) = self.receiver.next().await {
            let item = match self.body.frame().await {
                None => Ok(PayloadItem::Eof),
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(bytes) => Ok(PayloadItem::Chunk(bytes)),
                    Err(_) => Err(ParseError::invalid_body("unexpected trailers frame")),
                },
                Some(Err(e)) => Err(e),
            };

            let done = !matches!(item, Ok(PayloadItem::Chunk(_)));
            let failure = item.as_ref().err().map(ToString::to_string);
            if sender.send(item).is_err() {
                debug!("request body receiver dropped while a chunk was in flight");
            }

            if let Some(reason) = failure {
                error!(cause = %reason, "failed to read request body");
                return Err(ParseError::invalid_body(reason));
            }
            if done {
                return Ok(());
            }
        }
        Ok(())
    }
}

impl<R> ReqBodySender<'_, R> {
    pub fn is_finished(&self) -> bool {
        self.body.is_finished()
    }

    /// Cancels the connection stream if the body was not read to its end.
    pub fn abandon(&mut self) -> bool {
        self.body.abandon()
    }
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        loop {
            if self.eof {
                return Poll::Ready(None);
            }

            if let Some(oneshot_receiver) = &mut self.receiving {
                let result = ready!(oneshot_receiver.poll_unpin(cx));
                self.receiving.take();
                return match result {
                    Ok(Ok(PayloadItem::Chunk(bytes))) => {
                        if let Some(remaining) = self.remaining.as_mut() {
                            *remaining = remaining.saturating_sub(bytes.len() as u64);
                        }
                        Poll::Ready(Some(Ok(Frame::data(bytes))))
                    }
                    Ok(Ok(PayloadItem::Eof)) => {
                        self.eof = true;
                        Poll::Ready(None)
                    }
                    Ok(Err(e)) => {
                        self.eof = true;
                        Poll::Ready(Some(Err(e)))
                    }
                    Err(_) => {
                        self.eof = true;
                        Poll::Ready(Some(Err(ParseError::BodyCancelled)))
                    }
                };
            }

            match ready!(self.signal.poll_ready_unpin(cx)) {
                Ok(()) => {
                    let (tx, rx) = oneshot::channel();
                    match self.signal.start_send(tx) {
                        Ok(()) => self.receiving = Some(rx),
                        Err(_) => return Poll::Ready(Some(Err(ParseError::BodyCancelled))),
                    }
                }
                Err(_) => {
                    self.eof = true;
                    return Poll::Ready(Some(Err(ParseError::BodyCancelled)));
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.eof
    }

    fn size_hint(&self) -> SizeHint {
        match self.remaining {
            Some(remaining) => SizeHint::with_exact(remaining),
            None => SizeHint::new(),
        }
    }
}

use std::error::Error;
use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONNECTION, EXPECT};
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, Version};
use http_body::Body;
use http_body_util::Empty;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::select;
use tracing::{debug, error, info, warn};

use crate::codec::header::has_token;
use crate::config::HttpConfig;
use crate::connection::{AfterResponse, MessageWriter, read_request, write_response};
use crate::handler::Handler;
use crate::protocol::body::{IncomingBody, ReqBody};
use crate::protocol::{HttpError, SendError};
use crate::stream::PushbackStream;

const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// A server side HTTP/1.1 connection that serves requests with a [`Handler`].
///
/// Requests are read off one [`PushbackStream`] in sequence:
/// - keep-alive until the peer closes, sends `connection: close` or speaks HTTP/1.0
/// - `Expect: 100-continue` answered before the handler runs
/// - the handler body is fed concurrently with the handler future, only on demand
///
/// A body the handler leaves unread cancels the stream, so the response to it carries
/// `connection: close` and the connection ends after it.
pub struct HttpConnection<R, W> {
    stream: PushbackStream<R>,
    writer: MessageWriter<W>,
    config: HttpConfig,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, HttpConfig::default())
    }

    pub fn with_config(reader: R, writer: W, config: HttpConfig) -> Self {
        Self {
            stream: PushbackStream::with_capacity(reader, config.read_buffer_size()),
            writer: MessageWriter::new(writer),
            config,
        }
    }

    /// Serves requests until the connection ends.
    ///
    /// An unparseable request ends the connection with an error and no response.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler<ReqBody>,
        H::RespBody: Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        loop {
            let Self { stream, writer, config } = &mut self;

            let request = match read_request(stream, config).await {
                Ok(Some(request)) => request,
                Ok(None) => {
                    info!("peer closed, no further request");
                    return Ok(());
                }
                Err(e) => {
                    error!(cause = %e, "can't receive next request");
                    return Err(e.into());
                }
            };

            let after = do_process(request, writer, handler.as_ref()).await?;
            if after == AfterResponse::Close || !stream.is_reusable() {
                debug!("connection closed after response");
                return Ok(());
            }
        }
    }
}

async fn do_process<R, W, H>(
    request: Request<IncomingBody<'_, R>>,
    writer: &mut MessageWriter<W>,
    handler: &H,
) -> Result<AfterResponse, HttpError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    H: Handler<ReqBody>,
    H::RespBody: Unpin,
    <H::RespBody as Body>::Error: Display,
{
    let (parts, body) = request.into_parts();
    let mut close = parts.version == Version::HTTP_10 || has_token(&parts.headers, CONNECTION, "close");

    if expects_continue(&parts.headers) && !body.is_finished() {
        writer.write_raw(CONTINUE);
        writer.flush().await?;
        info!("receive expect request header, sent continue response");
    }

    let method = parts.method.clone();
    let (req_body, mut body_sender) = ReqBody::body_channel(body);
    let request = Request::from_parts(parts, req_body);

    // the handler may wait on its body, so the sender has to run beside it
    let response_result = {
        let handle_future = handler.call(request);
        let send_future = body_sender.send_body();
        tokio::pin!(handle_future, send_future);

        let mut body_done = false;
        loop {
            select! {
                biased;
                response = &mut handle_future => break response,
                result = &mut send_future, if !body_done => {
                    body_done = true;
                    if let Err(e) = result {
                        warn!(cause = %e, "request body failed");
                    }
                }
            }
        }
    };

    if !body_sender.is_finished() {
        body_sender.abandon();
        close = true;
    }
    drop(body_sender);

    let after = match response_result {
        Ok(response) => send_response(writer, response, &method, close).await?,
        Err(e) => {
            let e: Box<dyn Error + Send + Sync> = e.into();
            error!(cause = %e, "handle response error");
            send_response(writer, build_error_response(StatusCode::INTERNAL_SERVER_ERROR), &method, close).await?
        }
    };
    Ok(after)
}

async fn send_response<W, B>(
    writer: &mut MessageWriter<W>,
    mut response: Response<B>,
    request_method: &Method,
    close: bool,
) -> Result<AfterResponse, SendError>
where
    W: AsyncWrite + Unpin,
    B: Body + Unpin,
    B::Error: Display,
{
    if close {
        response.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
    }
    write_response(writer, response, request_method).await
}

fn expects_continue(headers: &HeaderMap) -> bool {
    headers.get(EXPECT).is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"100-continue"))
}

fn build_error_response(status_code: StatusCode) -> Response<Empty<Bytes>> {
    let mut response = Response::new(Empty::<Bytes>::new());
    *response.status_mut() = status_code;
    response
}

//! Reading and writing whole HTTP messages
//!
//! Inbound, a head is read with [`read_head`] and parsed by [`HeaderDecoder`]; its body
//! is an [`IncomingBody`] borrowing the same stream, so nothing past the head is read
//! until the body is polled. Outbound, [`write_response`] picks the framing from the
//! status and headers and streams the body through a [`MessageWriter`].

use std::fmt::Display;

use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, DATE};
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::BodyExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace, warn};

use crate::codec::HeaderDecoder;
use crate::codec::header::{has_token, parse_content_length, read_head};
use crate::config::HttpConfig;
use crate::connection::MessageWriter;
use crate::protocol::body::IncomingBody;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHead, ResponseHead, SendError};
use crate::stream::PushbackStream;

const DEFAULT_CONTENT_TYPE: HeaderValue = HeaderValue::from_static("text/plain");

/// What the connection may do once a response was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterResponse {
    /// The next request may be read from the same stream
    KeepAlive,
    /// The writer was shut down
    Close,
}

/// Reads the next request head and wraps the rest of the request in a lazy body.
///
/// Returns `Ok(None)` when the stream ends before a request starts.
pub async fn read_request<'s, R>(
    stream: &'s mut PushbackStream<R>,
    config: &HttpConfig,
) -> Result<Option<Request<IncomingBody<'s, R>>>, ParseError>
where
    R: AsyncRead + Unpin,
{
    let Some(head) = read_head(stream, config).await? else {
        return Ok(None);
    };

    let (header, payload_size) = match HeaderDecoder::new(config).decode_request(&head) {
        Ok(decoded) => decoded,
        Err(e) => {
            stream.mark_unreusable();
            return Err(e);
        }
    };

    Ok(Some(header.body(IncomingBody::new(stream, payload_size, config))))
}

/// Reads the response to a request sent with `request_method`.
pub async fn read_response<'s, R>(
    stream: &'s mut PushbackStream<R>,
    config: &HttpConfig,
    request_method: &Method,
) -> Result<Option<Response<IncomingBody<'s, R>>>, ParseError>
where
    R: AsyncRead + Unpin,
{
    let Some(head) = read_head(stream, config).await? else {
        return Ok(None);
    };

    let (header, payload_size) = match HeaderDecoder::new(config).decode_response(&head, request_method) {
        Ok(decoded) => decoded,
        Err(e) => {
            stream.mark_unreusable();
            return Err(e);
        }
    };

    Ok(Some(header.body(IncomingBody::new(stream, payload_size, config))))
}

/// Writes `response` to a request made with `request_method` and flushes it.
///
/// Framing, in this order:
/// - 1xx, 204 and 304 are written as a bare head and the body is never polled
/// - an answer to HEAD is written as a bare head too, keeping the handler's
///   `content-length` and `content-type`
/// - `connection: close` sends the body as is and shuts the writer down
/// - a `content-length` header fixes the body length, which is checked while writing
/// - anything else is sent chunked
///
/// `date` and `content-type: text/plain` are added when missing, the latter only for
/// statuses that carry a body.
pub async fn write_response<W, B>(
    writer: &mut MessageWriter<W>,
    response: Response<B>,
    request_method: &Method,
) -> Result<AfterResponse, SendError>
where
    W: AsyncWrite + Unpin,
    B: Body + Unpin,
    B::Error: Display,
{
    let (mut parts, mut body) = response.into_parts();

    let bodiless = is_bodiless(parts.status);
    let head_only = bodiless || *request_method == Method::HEAD;
    let close = has_token(&parts.headers, CONNECTION, "close");
    let payload_size = if head_only {
        PayloadSize::new_empty()
    } else if close {
        PayloadSize::new_identity()
    } else if let Some(value) = parts.headers.get(CONTENT_LENGTH) {
        let length = parse_content_length(value).map_err(SendError::invalid_body)?;
        PayloadSize::new_length(length)
    } else {
        PayloadSize::new_chunked()
    };

    insert_defaults(&mut parts.headers, bodiless);
    trace!(status = %parts.status, ?payload_size, "write response head");
    writer.write(Message::<_, B::Data>::Header((ResponseHead::from_parts(parts, ()), payload_size)))?;

    if !head_only {
        loop {
            match body.frame().await {
                Some(Ok(frame)) => {
                    let Ok(data) = frame.into_data() else {
                        debug!("skip trailers of response body");
                        continue;
                    };
                    writer.write(Message::<(ResponseHead, PayloadSize), _>::Payload(PayloadItem::Chunk(data)))?;
                    // flush every chunk so streamed bodies reach the peer as they are produced
                    writer.flush().await?;
                }
                Some(Err(e)) => {
                    warn!(cause = %e, "response body failed");
                    return Err(SendError::invalid_body(format!("resolve response body error: {e}")));
                }
                None => {
                    writer.write(Message::<(ResponseHead, PayloadSize), B::Data>::Payload(PayloadItem::Eof))?;
                    break;
                }
            }
        }
    }

    if close {
        writer.shutdown().await?;
        Ok(AfterResponse::Close)
    } else {
        writer.flush().await?;
        Ok(AfterResponse::KeepAlive)
    }
}

/// Writes a request line and headers, without a body, and flushes them.
pub async fn write_request_head<W>(writer: &mut MessageWriter<W>, head: RequestHead) -> Result<(), SendError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_request_head(head)?;
    writer.flush().await
}

fn is_bodiless(status: StatusCode) -> bool {
    status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED
}

fn insert_defaults(headers: &mut HeaderMap, bodiless: bool) {
    if !headers.contains_key(DATE) {
        if let Some(date) = http_date() {
            headers.insert(DATE, date);
        }
    }
    if !bodiless && !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, DEFAULT_CONTENT_TYPE);
    }
}

fn http_date() -> Option<HeaderValue> {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);
    HeaderValue::from_bytes(&buf).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::body::ChunkedDecoder;
    use crate::mock::ChunkedReader;
    use bytes::{Bytes, BytesMut};
    use http_body_util::{Empty, Full, StreamBody};
    use http_body::Frame;
    use indoc::indoc;
    use std::convert::Infallible;
    use tokio_util::codec::Decoder;

    async fn written<B>(response: Response<B>) -> (AfterResponse, String)
    where
        B: Body + Unpin,
        B::Error: Display,
    {
        written_for(response, &Method::GET).await
    }

    async fn written_for<B>(response: Response<B>, request_method: &Method) -> (AfterResponse, String)
    where
        B: Body + Unpin,
        B::Error: Display,
    {
        let mut writer = MessageWriter::new(Vec::new());
        let after = write_response(&mut writer, response, request_method).await.unwrap();
        (after, String::from_utf8(writer.into_inner()).unwrap())
    }

    #[tokio::test]
    async fn get_body_stays_on_the_stream() {
        let mut stream = PushbackStream::new(ChunkedReader::new(["GET /a?b=foo HTTP/1.1\r\nHost: foo.com\r\n\r\nbody"]));

        let request = read_request(&mut stream, &HttpConfig::default()).await.unwrap().unwrap();
        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.uri().path(), "/a");
        assert_eq!(request.uri().query(), Some("b=foo"));
        assert_eq!(request.headers()["host"], "foo.com");
        assert!(request.body().is_end_stream());
        drop(request);

        assert!(stream.is_reusable());
        assert_eq!(stream.pull().await.unwrap().unwrap(), "body");
    }

    #[tokio::test]
    async fn pipelined_requests_on_every_split() {
        let wire = indoc! {"
            POST /one HTTP/1.1
            Content-Length: 5

            helloPUT /two HTTP/1.1
            Transfer-Encoding: chunked

            3
            abc
            0

            GET /three HTTP/1.1

            "}
        .replace('\n', "\r\n");

        for size in 1..=wire.len() {
            let mut stream = PushbackStream::new(ChunkedReader::split_every(&wire, size));
            let config = HttpConfig::default();
            let mut seen = Vec::new();

            while let Some(request) = read_request(&mut stream, &config).await.unwrap() {
                let path = request.uri().path().to_string();
                let body = request.into_body().collect().await.unwrap().to_bytes();
                seen.push((path, body));
            }

            assert_eq!(
                seen,
                vec![
                    ("/one".to_string(), Bytes::from("hello")),
                    ("/two".to_string(), Bytes::from("abc")),
                    ("/three".to_string(), Bytes::new()),
                ],
                "split {size}"
            );
        }
    }

    #[tokio::test]
    async fn malformed_request_poisons_the_stream() {
        let mut stream = PushbackStream::new(ChunkedReader::new(["NOT A REQUEST\r\n\r\n"]));
        assert!(read_request(&mut stream, &HttpConfig::default()).await.is_err());
        assert!(!stream.is_reusable());
    }

    #[tokio::test]
    async fn reads_a_response() {
        let mut stream =
            PushbackStream::new(ChunkedReader::new(["HTTP/1.1 200 OK\r\nContent-Length: 2\r\nX-A: 1\r\nx-a: 2\r\n\r\nokrest"]));
        let response = read_response(&mut stream, &HttpConfig::default(), &Method::GET).await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-a"], "1, 2");
        assert_eq!(response.into_body().collect().await.unwrap().to_bytes(), "ok");
        assert_eq!(stream.pull().await.unwrap().unwrap(), "rest");
    }

    #[tokio::test]
    async fn length_response() {
        let response = Response::builder().header(CONTENT_LENGTH, 5).body(Full::new(Bytes::from("hello"))).unwrap();
        let (after, text) = written(response).await;

        assert_eq!(after, AfterResponse::KeepAlive);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("content-length: 5\r\n"));
        assert!(text.contains("content-type: text/plain\r\n"));
        assert!(text.contains("date: "));
        assert!(text.ends_with("\r\n\r\nhello"));
    }

    #[tokio::test]
    async fn unknown_length_is_chunked() {
        let chunks = futures::stream::iter(
            ["Mozilla", "", "Developer Network"].map(|s| Ok::<_, Infallible>(Frame::data(Bytes::from(s)))),
        );
        let response = Response::builder().header(CONTENT_TYPE, "text/html").body(StreamBody::new(chunks)).unwrap();
        let (_, text) = written(response).await;

        assert!(text.contains("transfer-encoding: chunked\r\n"));
        assert!(text.contains("content-type: text/html\r\n"));
        assert!(!text.contains("text/plain"));

        let body_start = text.find("\r\n\r\n").unwrap() + 4;
        let mut wire = BytesMut::from(&text.as_bytes()[body_start..]);
        let mut decoder = ChunkedDecoder::new();
        let mut body = Vec::new();
        while let Some(PayloadItem::Chunk(bytes)) = decoder.decode(&mut wire).unwrap() {
            body.extend_from_slice(&bytes);
        }
        assert_eq!(body, b"MozillaDeveloper Network");
        assert!(decoder.is_finish());
    }

    #[tokio::test]
    async fn bodiless_status_writes_head_only() {
        let response = Response::builder().status(StatusCode::NOT_MODIFIED).body(Full::new(Bytes::from("ignored"))).unwrap();
        let (_, text) = written(response).await;

        assert!(text.starts_with("HTTP/1.1 304 Not Modified\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
        assert!(!text.contains("ignored"));
        assert!(!text.contains("content-type"));
        assert!(!text.contains("transfer-encoding"));
        assert!(!text.contains("content-length"));
    }

    #[tokio::test]
    async fn head_response_keeps_headers_without_body() {
        let response = Response::builder().header(CONTENT_LENGTH, 5).body(Full::new(Bytes::from("hello"))).unwrap();
        let (after, text) = written_for(response, &Method::HEAD).await;

        assert_eq!(after, AfterResponse::KeepAlive);
        assert!(text.contains("content-length: 5\r\n"));
        assert!(text.contains("content-type: text/plain\r\n"));
        assert!(!text.contains("transfer-encoding"));
        assert!(text.ends_with("\r\n\r\n"));
        assert!(!text.contains("hello"));
    }

    #[tokio::test]
    async fn connection_close_sends_raw_body() {
        let response = Response::builder().header(CONNECTION, "close").body(Full::new(Bytes::from("bye"))).unwrap();
        let (after, text) = written(response).await;

        assert_eq!(after, AfterResponse::Close);
        assert!(!text.contains("transfer-encoding"));
        assert!(text.ends_with("\r\n\r\nbye"));
    }

    #[tokio::test]
    async fn body_longer_than_content_length_fails() {
        let response = Response::builder().header(CONTENT_LENGTH, 2).body(Full::new(Bytes::from("toolong"))).unwrap();
        let mut writer = MessageWriter::new(Vec::new());
        assert!(write_response(&mut writer, response, &Method::GET).await.is_err());
    }

    #[tokio::test]
    async fn empty_body_with_zero_length() {
        let response = Response::builder().header(CONTENT_LENGTH, 0).body(Empty::<Bytes>::new()).unwrap();
        let (_, text) = written(response).await;
        assert!(text.contains("content-length: 0\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn request_head_is_written() {
        let head = Request::builder().uri("/chat").header("host", "example.com").body(()).unwrap();
        let mut writer = MessageWriter::new(Vec::new());
        write_request_head(&mut writer, head).await.unwrap();
        assert_eq!(writer.into_inner(), b"GET /chat HTTP/1.1\r\nhost: example.com\r\n\r\n");
    }
}

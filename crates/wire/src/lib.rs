//! Byte stream framing for HTTP/1.1 on top of tokio
//!
//! A [`PushbackStream`](stream::PushbackStream) wraps one `AsyncRead` and is the only
//! thing that ever reads from it. Every layer above pulls from it and hands unconsumed
//! bytes back with `unshift`, so a head, its body, the next pipelined request and a
//! protocol switch can all share one connection without losing or reordering bytes.
//!
//! # Layers
//!
//! - [`stream`]: pushback stream and its pause/resume gate
//! - [`codec`]: line decoder, head reader, header decoding and encoding, body codecs
//! - [`protocol`]: message types, lazy bodies and errors
//! - [`connection`]: message level reads and writes, plus [`HttpConnection`](connection::HttpConnection)
//! - [`handler`]: the trait `HttpConnection` serves requests with
//!
//! # Example
//!
//! ```no_run
//! use std::error::Error;
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use http_body_util::{BodyExt, Full};
//! use micro_wire::connection::HttpConnection;
//! use micro_wire::handler::make_handler;
//! use micro_wire::protocol::body::ReqBody;
//! use tokio::net::TcpListener;
//! use tracing::{error, warn};
//!
//! async fn echo(request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Box<dyn Error + Send + Sync>> {
//!     let body = request.into_body().collect().await?.to_bytes();
//!     Ok(Response::new(Full::new(body)))
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let handler = Arc::new(make_handler(echo));
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match listener.accept().await {
//!             Ok(accepted) => accepted,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = handler.clone();
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             if let Err(e) = HttpConnection::new(reader, writer).process(handler).await {
//!                 error!(cause = %e, "connection failed");
//!             }
//!         });
//!     }
//! }
//! ```
//!
//! # Errors
//!
//! - [`protocol::ParseError`]: malformed or truncated inbound bytes; the stream is no
//!   longer reusable afterwards
//! - [`protocol::SendError`]: a response could not be encoded or written
//! - [`protocol::HttpError`]: either of the above, returned by the connection loop

pub mod codec;
mod config;
pub mod connection;
pub mod handler;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod protocol;
pub mod stream;

mod utils;
pub(crate) use utils::ensure;

pub use config::{
    DEFAULT_MAX_CHUNK_EXTENSION, DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MAX_HEADER_BYTES, DEFAULT_MAX_HEADERS, DEFAULT_READ_BUFFER_SIZE,
    HttpConfig,
};

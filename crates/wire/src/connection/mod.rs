//! Message level I/O and the server connection loop
//!
//! - [`read_request`] / [`read_response`]: head plus a lazy [`IncomingBody`](crate::protocol::body::IncomingBody)
//! - [`write_response`] / [`write_request_head`]: framing chosen from status and headers
//! - [`MessageWriter`]: buffered sink the encoders write into
//! - [`HttpConnection`]: keep-alive loop serving a [`Handler`](crate::handler::Handler)

mod http_connection;
mod message_io;
mod message_writer;

pub use http_connection::HttpConnection;
pub use message_io::{AfterResponse, read_request, read_response, write_request_head, write_response};
pub use message_writer::MessageWriter;

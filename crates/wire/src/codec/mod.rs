//! Codecs for HTTP/1.1 message framing
//!
//! Reading is pull based: a [`PushbackStream`](crate::stream::PushbackStream) supplies
//! bytes, and every reader returns what it did not consume to the stream.
//!
//! - [`line`]: CRLF delimited lines
//! - [`header`]: message heads, raw and parsed
//! - [`body`]: body framing, both directions
//!
//! Writing goes through [`ResponseEncoder`], which pairs a [`HeaderEncoder`] with the
//! [`PayloadEncoder`](body::PayloadEncoder) chosen for the head.

pub mod body;
pub mod header;
pub mod line;
mod response_encoder;

pub use header::{HeaderDecoder, HeaderEncoder};
pub use response_encoder::ResponseEncoder;

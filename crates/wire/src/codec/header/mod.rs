//! Message head reading, parsing and writing
//!
//! - [`read_head`] collects the raw lines of a head off a stream into a [`RawHead`]
//! - [`HeaderDecoder`] parses a [`RawHead`] into a request or response head and picks
//!   the body framing
//! - [`HeaderEncoder`] writes response heads (and request heads for WebSocket clients)

mod header_decoder;
mod header_encoder;
mod raw_head;

pub use header_decoder::{HeaderDecoder, has_token};
pub(crate) use header_decoder::{is_chunked, parse_content_length};
pub use header_encoder::HeaderEncoder;
pub use raw_head::{RawHead, RawHeaderLines, read_head};

//! Body framing codecs
//!
//! Decoders turn raw bytes into [`PayloadItem`](crate::protocol::PayloadItem)s and leave
//! whatever follows the body in the source buffer:
//!
//! - [`LengthDecoder`]: exactly `content-length` bytes
//! - [`ChunkedDecoder`]: the chunked transfer coding, trailers included
//! - [`PayloadDecoder`]: picks one of the above, read-until-close, or no body
//!
//! Encoders do the reverse for outgoing bodies: [`LengthEncoder`], [`ChunkedEncoder`]
//! and [`PayloadEncoder`].

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use chunked_decoder::ChunkedDecoder;
pub use chunked_encoder::ChunkedEncoder;
pub use length_decoder::LengthDecoder;
pub use length_encoder::LengthEncoder;
pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;

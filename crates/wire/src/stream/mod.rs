//! Byte stream with pushback and a pause/resume gate
//!
//! Every reader in this crate pulls raw bytes through a [`PushbackStream`]. Decoders
//! that overshoot a message boundary return the extra bytes with
//! [`PushbackStream::unshift`], which keeps the byte order intact for whoever reads
//! next: the next HTTP request on a keep-alive connection, or the WebSocket frame
//! reader after an upgrade.

mod gate;
mod pushback;

pub use gate::Gate;
pub use pushback::PushbackStream;

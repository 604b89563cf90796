//! Message bodies read off a connection
//!
//! - [`IncomingBody`]: lazily decodes a body straight from a
//!   [`PushbackStream`](crate::stream::PushbackStream) it borrows
//! - [`ReqBody`] / [`ReqBodySender`]: a channel pair that lets a `'static` handler pull
//!   chunks from an [`IncomingBody`] still owned by the connection loop

mod incoming;
mod req_body;

pub use incoming::IncomingBody;
pub use req_body::{ReqBody, ReqBodySender};

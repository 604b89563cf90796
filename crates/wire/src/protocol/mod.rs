//! Message types shared by the codecs and the connection layer.
//!
//! - [`Message`], [`PayloadItem`], [`PayloadSize`]: what the encoders consume and how a
//!   body is framed
//! - [`RequestHeader`], [`ResponseHeader`]: decoded heads, convertible into `http` types
//! - [`body`]: the lazy [`IncomingBody`](body::IncomingBody) and the channel backed
//!   [`ReqBody`](body::ReqBody) handlers receive
//! - [`HttpError`], [`ParseError`], [`SendError`]: failures

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHead;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHead;
pub use response::ResponseHeader;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;

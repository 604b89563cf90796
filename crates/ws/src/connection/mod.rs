//! The session state machine
//!
//! [`WsConnection`] is built by a handshake ([`connect`](WsConnection::connect),
//! [`accept`](WsConnection::accept)) or around an already upgraded stream
//! ([`from_upgraded`](WsConnection::from_upgraded)) and reports everything through
//! [`Event`]s.

mod event;
mod fragment;
mod state;
mod ws_connection;

pub use event::{Event, Message};
pub use state::{Role, State};
pub use ws_connection::WsConnection;

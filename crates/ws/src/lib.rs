//! WebSocket (RFC 6455) on top of [`micro_wire`]
//!
//! The opening handshake is an ordinary HTTP exchange run through
//! [`micro_wire::connection`]. Whatever the peer sent after its handshake stays pushed
//! back on the same [`PushbackStream`](micro_wire::stream::PushbackStream), which the
//! [`WsConnection`] then owns for the rest of the session.
//!
//! - [`frame`], [`mask`], [`codec`]: frame headers, masking and serialization, no I/O
//! - [`close`]: close frame payloads and status codes
//! - [`handshake`]: accept key, request and response checks
//! - [`connection`]: [`WsConnection`] and its [`Event`]s
//!
//! # Example
//!
//! ```no_run
//! use micro_ws::{Event, Message, WsConfig, WsConnection, WsContext};
//! use tokio::net::TcpStream;
//!
//! # async fn run() -> std::io::Result<()> {
//! let (reader, writer) = TcpStream::connect("127.0.0.1:9001").await?.into_split();
//! let uri = "ws://127.0.0.1:9001/".parse().expect("valid uri");
//! let mut ws = WsConnection::connect(reader, writer, &uri, WsConfig::default(), WsContext::new()).await;
//!
//! while let Some(event) = ws.next_event().await {
//!     match event {
//!         Event::Opened { .. } => {
//!             let _ = ws.send_text("hello").await;
//!         }
//!         Event::Message(Message::Text(text)) => println!("{text}"),
//!         Event::Message(Message::Binary(_)) => {}
//!         Event::Error(e) => eprintln!("{e}"),
//!         Event::Closed { code, .. } => println!("closed with {code}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod close;
pub mod codec;
mod config;
pub mod connection;
mod context;
mod error;
pub mod frame;
pub mod handshake;
pub mod mask;

pub use config::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_MESSAGE_SIZE, WsConfig};
pub use connection::{Event, Message, Role, State, WsConnection};
pub use context::WsContext;
pub use error::{HandshakeError, WsError};

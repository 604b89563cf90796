//! Echoes every text and binary message back to its sender.
//!
//! ```text
//! cargo run -p micro-ws --example echo_server
//! ```

use micro_wire::stream::PushbackStream;
use micro_ws::{Event, Message, WsConfig, WsConnection, WsContext};
use tokio::net::TcpListener;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
        return;
    }

    info!(port = 9001, "start listening");
    let listener = match TcpListener::bind("127.0.0.1:9001").await {
        Ok(listener) => listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    loop {
        let (tcp_stream, remote_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        tokio::spawn(async move {
            let (reader, writer) = tcp_stream.into_split();
            let config = WsConfig::default().with_protocols(["echo"]);
            let mut ws = WsConnection::accept(PushbackStream::new(reader), writer, config, WsContext::new()).await;

            while let Some(event) = ws.next_event().await {
                let result = match event {
                    Event::Opened { protocol } => {
                        info!(%remote_addr, ?protocol, "client connected");
                        Ok(())
                    }
                    Event::Message(Message::Text(text)) => ws.send_text(&text).await,
                    Event::Message(Message::Binary(data)) => ws.send_binary(data).await,
                    Event::Error(e) => {
                        warn!(%remote_addr, cause = %e, "session failed");
                        Ok(())
                    }
                    Event::Closed { code, reason, was_clean } => {
                        info!(%remote_addr, code, %reason, was_clean, "client disconnected");
                        Ok(())
                    }
                };
                if let Err(e) = result {
                    warn!(%remote_addr, cause = %e, "failed to echo");
                }
            }
        });
    }
}

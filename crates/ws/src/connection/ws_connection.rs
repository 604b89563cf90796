use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use http::{Method, Uri};
use micro_wire::connection::{MessageWriter, read_request, read_response, write_request_head, write_response};
use micro_wire::stream::PushbackStream;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, info, trace, warn};

use crate::close::{self, CloseReason};
use crate::codec::{FrameDecoder, FrameEncoder};
use crate::config::WsConfig;
use crate::connection::event::{Event, Message};
use crate::connection::fragment::FragmentAccumulator;
use crate::connection::state::{Role, State};
use crate::context::WsContext;
use crate::error::{HandshakeError, WsError};
use crate::frame::{Frame, MAX_CONTROL_PAYLOAD, OpCode};
use crate::handshake;

/// One WebSocket session over a [`PushbackStream`] and a writer.
///
/// The connection owns both halves for its whole life. Reading happens only inside
/// [`next_event`](Self::next_event), which answers pings, reassembles fragments and
/// runs the close exchange on the way.
#[derive(Debug)]
pub struct WsConnection<R, W> {
    stream: PushbackStream<R>,
    writer: MessageWriter<W>,
    read_buf: BytesMut,
    write_buf: BytesMut,
    decoder: FrameDecoder,
    role: Role,
    state: State,
    close_sent: bool,
    protocol: Option<String>,
    fragments: FragmentAccumulator,
    events: VecDeque<Event>,
    config: WsConfig,
    ctx: WsContext,
}

impl<R, W> WsConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Runs the client handshake for `uri` and returns the session.
    ///
    /// A failed handshake still returns a connection: it is `Closed` and its events are
    /// the error followed by an abnormal close.
    pub async fn connect(reader: R, writer: W, uri: &Uri, config: WsConfig, ctx: WsContext) -> Self {
        let stream = PushbackStream::with_capacity(reader, config.http().read_buffer_size());
        let mut connection = Self::new(stream, writer, Role::Client, config, ctx);
        let result = connection.client_handshake(uri).await;
        connection.on_handshake(result);
        connection
    }

    /// Answers the upgrade request waiting on `stream`.
    ///
    /// Invalid requests get a 400, or a 426 for an unsupported version, and yield a
    /// `Closed` connection like a failed [`connect`](Self::connect).
    pub async fn accept(stream: PushbackStream<R>, writer: W, config: WsConfig, ctx: WsContext) -> Self {
        let mut connection = Self::new(stream, writer, Role::Server, config, ctx);
        let result = connection.server_handshake().await;
        connection.on_handshake(result);
        connection
    }

    /// Wraps a stream whose handshake already happened; no `Opened` event is queued.
    pub fn from_upgraded(stream: PushbackStream<R>, writer: W, role: Role, config: WsConfig, ctx: WsContext) -> Self {
        let mut connection = Self::new(stream, writer, role, config, ctx);
        connection.state.advance(State::Open);
        connection
    }

    fn new(stream: PushbackStream<R>, writer: W, role: Role, config: WsConfig, ctx: WsContext) -> Self {
        Self {
            stream,
            writer: MessageWriter::new(writer),
            read_buf: BytesMut::new(),
            write_buf: BytesMut::new(),
            decoder: FrameDecoder::new(config.max_frame_size()),
            role,
            state: State::Connecting,
            close_sent: false,
            protocol: None,
            fragments: FragmentAccumulator::default(),
            events: VecDeque::new(),
            config,
            ctx,
        }
    }

    async fn client_handshake(&mut self, uri: &Uri) -> Result<Option<String>, HandshakeError> {
        let key = handshake::generate_key(&mut self.ctx);
        let request = handshake::client_request(uri, &key, self.config.protocols())?;
        write_request_head(&mut self.writer, request).await?;

        let response =
            read_response(&mut self.stream, self.config.http(), &Method::GET).await?.ok_or(HandshakeError::ConnectionClosed)?;
        let (parts, _body) = response.into_parts();
        handshake::validate_response(&parts, &key, self.config.protocols())
    }

    async fn server_handshake(&mut self) -> Result<Option<String>, HandshakeError> {
        let request = read_request(&mut self.stream, self.config.http()).await?.ok_or(HandshakeError::ConnectionClosed)?;
        let (parts, body) = request.into_parts();
        drop(body);

        let upgrade = match handshake::validate_request(&parts) {
            Ok(upgrade) => upgrade,
            Err(e) => {
                if let Err(send) = write_response(&mut self.writer, handshake::reject_response(&e), &parts.method).await {
                    debug!(cause = %send, "failed to send handshake rejection");
                }
                return Err(e);
            }
        };

        let protocol = handshake::select_protocol(&upgrade.protocols, self.config.protocols());
        write_response(&mut self.writer, handshake::accept_response(&upgrade.key, protocol.as_deref())?, &parts.method).await?;
        Ok(protocol)
    }

    fn on_handshake(&mut self, result: Result<Option<String>, HandshakeError>) {
        match result {
            Ok(protocol) => {
                info!(role = ?self.role, ?protocol, "websocket open");
                self.state.advance(State::Open);
                self.protocol.clone_from(&protocol);
                self.events.push_back(Event::Opened { protocol });
            }
            Err(e) => {
                warn!(role = ?self.role, cause = %e, "websocket handshake failed");
                self.fail(Some(e.into()));
            }
        }
    }

    /// Waits for the next event; `None` once `Closed` was delivered.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Some(event);
            }
            if self.state == State::Closed {
                return None;
            }

            let result = match self.read_frame().await {
                Ok(Some(frame)) => self.on_frame(frame).await,
                Ok(None) => {
                    debug!("stream ended without a close frame");
                    self.fail(None);
                    Ok(())
                }
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                self.fail(Some(e));
            }
        }
    }

    pub async fn send_text(&mut self, text: &str) -> Result<(), WsError> {
        self.send_data(OpCode::Text, Bytes::copy_from_slice(text.as_bytes())).await
    }

    pub async fn send_binary(&mut self, data: impl Into<Bytes>) -> Result<(), WsError> {
        self.send_data(OpCode::Binary, data.into()).await
    }

    pub async fn ping(&mut self, payload: impl Into<Bytes>) -> Result<(), WsError> {
        let payload = payload.into();
        if payload.len() as u64 > MAX_CONTROL_PAYLOAD {
            return Err(WsError::ControlFrameTooLarge(payload.len() as u64));
        }
        self.send_data(OpCode::Ping, payload).await
    }

    /// Starts the close exchange.
    ///
    /// `code` must be 1000 or within `3000..=4999`, and `reason` at most 123 bytes; both
    /// are checked before anything is sent. A reason without a code is sent with 1000.
    /// Does nothing unless the session is open.
    pub async fn close(&mut self, code: Option<u16>, reason: &str) -> Result<(), WsError> {
        close::validate_outgoing(code, reason)?;
        if self.state != State::Open {
            return Ok(());
        }

        let code = code.or_else(|| (!reason.is_empty()).then_some(close::NORMAL));
        self.send_or_fail(OpCode::Close, close::encode_close_payload(code, reason)).await?;
        self.close_sent = true;
        self.state.advance(State::Closing);
        debug!(?code, "sent close frame");
        Ok(())
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The negotiated subprotocol.
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    pub fn writer(&self) -> &W {
        self.writer.get_ref()
    }

    /// Gives back the stream, with bytes read but not yet decoded pushed back, and the writer.
    pub fn into_parts(mut self) -> (PushbackStream<R>, W) {
        self.stream.unshift(self.read_buf.split().freeze());
        (self.stream, self.writer.into_inner())
    }

    async fn read_frame(&mut self) -> Result<Option<Frame>, WsError> {
        loop {
            if let Some(frame) = self.decoder.decode(&mut self.read_buf)? {
                return Ok(Some(frame));
            }
            match self.stream.pull().await? {
                Some(bytes) => self.read_buf.extend_from_slice(&bytes),
                None => return self.decoder.decode_eof(&mut self.read_buf),
            }
        }
    }

    async fn on_frame(&mut self, frame: Frame) -> Result<(), WsError> {
        if self.role == Role::Server && frame.mask_key.is_none() {
            return Err(WsError::UnmaskedFrame);
        }
        trace!(opcode = ?frame.opcode, fin = frame.fin, len = frame.payload.len(), "receive frame");

        let max_message_size = self.config.max_message_size();
        match frame.opcode {
            OpCode::Ping => self.send_frame(OpCode::Pong, frame.payload).await?,
            OpCode::Pong => {}
            OpCode::Close => self.on_close(frame.payload).await?,
            OpCode::Text | OpCode::Binary => {
                if self.fragments.is_open() {
                    return Err(WsError::ExpectedContinuation);
                }
                if frame.fin {
                    if frame.payload.len() > max_message_size {
                        return Err(WsError::MessageTooLarge { size: frame.payload.len(), max_size: max_message_size });
                    }
                    self.dispatch(frame.opcode, frame.payload)?;
                } else {
                    self.fragments.start(frame.opcode, frame.payload, max_message_size)?;
                }
            }
            OpCode::Continuation => {
                self.fragments.push(frame.payload, max_message_size)?;
                if frame.fin {
                    let (opcode, payload) = self.fragments.finish()?;
                    self.dispatch(opcode, payload)?;
                }
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, opcode: OpCode, payload: Bytes) -> Result<(), WsError> {
        let message = if opcode == OpCode::Text {
            let text = std::str::from_utf8(&payload).map_err(|_e| WsError::InvalidUtf8)?;
            Message::Text(text.to_owned())
        } else {
            Message::Binary(payload)
        };
        self.events.push_back(Event::Message(message));
        Ok(())
    }

    async fn on_close(&mut self, payload: Bytes) -> Result<(), WsError> {
        let CloseReason { code, reason } = close::decode_close_payload(&payload)?;
        if !self.close_sent {
            self.send_frame(OpCode::Close, payload).await?;
            self.close_sent = true;
        }

        self.state.advance(State::Closed);
        self.fragments.clear();
        if let Err(e) = self.writer.shutdown().await {
            debug!(cause = %e, "shutdown after close exchange failed");
        }
        info!(code, reason = %reason, "websocket closed");
        self.events.push_back(Event::Closed { code, reason, was_clean: true });
        Ok(())
    }

    async fn send_data(&mut self, opcode: OpCode, payload: Bytes) -> Result<(), WsError> {
        if self.state != State::Open {
            return Err(WsError::NotOpen);
        }
        self.send_or_fail(opcode, payload).await
    }

    /// A failed write ends the session; the caller gets the error itself.
    async fn send_or_fail(&mut self, opcode: OpCode, payload: Bytes) -> Result<(), WsError> {
        let result = self.send_frame(opcode, payload).await;
        if result.is_err() {
            self.fail(None);
        }
        result
    }

    async fn send_frame(&mut self, opcode: OpCode, payload: Bytes) -> Result<(), WsError> {
        let mask_key = match self.role {
            Role::Client => Some(self.ctx.mask_key()),
            Role::Server => None,
        };
        FrameEncoder.encode(Frame::new(opcode, payload).with_mask(mask_key), &mut self.write_buf)?;
        self.writer.write_raw(&self.write_buf);
        self.write_buf.clear();
        self.writer.flush().await?;
        Ok(())
    }

    fn fail(&mut self, cause: Option<WsError>) {
        if self.state == State::Closed {
            return;
        }
        self.state.advance(State::Closed);
        self.fragments.clear();
        self.read_buf.clear();
        if let Some(e) = cause {
            warn!(cause = %e, "websocket failed");
            self.events.push_back(Event::Error(e));
        }
        self.events.push_back(Event::Closed { code: close::ABNORMAL, reason: String::new(), was_clean: false });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{build_frame, parse_header, write_frame};
    use crate::mask::apply_mask;
    use micro_wire::mock::ChunkedReader;
    use tokio::io::{duplex, split};

    const KEY: [u8; 4] = [0x11, 0x22, 0x33, 0x44];

    fn masked(fin: bool, opcode: OpCode, payload: &[u8]) -> Vec<u8> {
        let mut dst = BytesMut::new();
        write_frame(fin, opcode, payload, Some(KEY), &mut dst);
        dst.to_vec()
    }

    fn server_over(wire: Vec<u8>) -> WsConnection<ChunkedReader, Vec<u8>> {
        let stream = PushbackStream::new(ChunkedReader::new([wire]));
        WsConnection::from_upgraded(stream, Vec::new(), Role::Server, WsConfig::default(), WsContext::from_seed(0))
    }

    fn switching_protocols(key: &str) -> String {
        format!(
            "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
            handshake::compute_accept_key(key)
        )
    }

    async fn expect_abnormal_close<R, W>(connection: &mut WsConnection<R, W>)
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        assert!(matches!(
            connection.next_event().await,
            Some(Event::Closed { code: close::ABNORMAL, was_clean: false, .. })
        ));
        assert!(connection.next_event().await.is_none());
        assert_eq!(connection.state(), State::Closed);
    }

    #[tokio::test]
    async fn client_and_server_session() {
        let (client_io, server_io) = duplex(64 * 1024);
        let (client_reader, client_writer) = split(client_io);
        let (server_reader, server_writer) = split(server_io);
        let uri: Uri = "ws://localhost:9001/chat".parse().unwrap();
        let config = WsConfig::default().with_protocols(["chat"]);

        let (mut client, mut server) = tokio::join!(
            WsConnection::connect(client_reader, client_writer, &uri, config.clone(), WsContext::from_seed(1)),
            WsConnection::accept(PushbackStream::new(server_reader), server_writer, config, WsContext::from_seed(2)),
        );

        assert!(matches!(client.next_event().await, Some(Event::Opened { protocol: Some(p) }) if p == "chat"));
        assert!(matches!(server.next_event().await, Some(Event::Opened { protocol: Some(p) }) if p == "chat"));
        assert_eq!(client.protocol(), Some("chat"));

        client.send_text("hello").await.unwrap();
        assert!(matches!(server.next_event().await, Some(Event::Message(Message::Text(t))) if t == "hello"));

        server.send_binary(Bytes::from_static(b"\x00\x01")).await.unwrap();
        assert!(matches!(client.next_event().await, Some(Event::Message(Message::Binary(b))) if b == Bytes::from_static(b"\x00\x01")));

        client.close(Some(close::NORMAL), "done").await.unwrap();
        assert_eq!(client.state(), State::Closing);
        assert!(matches!(client.send_text("late").await, Err(WsError::NotOpen)));

        assert!(matches!(
            server.next_event().await,
            Some(Event::Closed { code: 1000, reason, was_clean: true }) if reason == "done"
        ));
        assert!(server.next_event().await.is_none());

        assert!(matches!(
            client.next_event().await,
            Some(Event::Closed { code: 1000, reason, was_clean: true }) if reason == "done"
        ));
        assert!(client.next_event().await.is_none());
    }

    #[tokio::test]
    async fn frame_behind_the_handshake_response_is_kept() {
        let key = handshake::generate_key(&mut WsContext::from_seed(9));
        let mut wire = switching_protocols(&key).into_bytes();
        wire.extend_from_slice(&build_frame(OpCode::Text, b"hi", None));

        let uri: Uri = "ws://example.com/chat".parse().unwrap();
        let mut client =
            WsConnection::connect(ChunkedReader::new([wire]), Vec::new(), &uri, WsConfig::default(), WsContext::from_seed(9)).await;

        let request = String::from_utf8(client.writer().clone()).unwrap();
        assert!(request.starts_with("GET /chat HTTP/1.1\r\n"));
        assert!(request.contains(&format!("sec-websocket-key: {key}\r\n")));
        assert!(request.contains("host: example.com\r\n"));

        assert!(matches!(client.next_event().await, Some(Event::Opened { protocol: None })));
        assert!(matches!(client.next_event().await, Some(Event::Message(Message::Text(t))) if t == "hi"));
        // plain end of stream, no error event
        expect_abnormal_close(&mut client).await;
    }

    #[tokio::test]
    async fn wrong_accept_fails_the_handshake() {
        let wire = switching_protocols("c29tZSBvdGhlciBrZXkgISE=");
        let uri: Uri = "ws://example.com/".parse().unwrap();
        let mut client =
            WsConnection::connect(ChunkedReader::new([wire]), Vec::new(), &uri, WsConfig::default(), WsContext::from_seed(4)).await;

        assert_eq!(client.state(), State::Closed);
        assert!(matches!(
            client.next_event().await,
            Some(Event::Error(WsError::Handshake(HandshakeError::AcceptMismatch { .. })))
        ));
        expect_abnormal_close(&mut client).await;
    }

    #[tokio::test]
    async fn non_101_fails_the_handshake() {
        let wire = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";
        let uri: Uri = "ws://example.com/".parse().unwrap();
        let mut client =
            WsConnection::connect(ChunkedReader::new([wire]), Vec::new(), &uri, WsConfig::default(), WsContext::from_seed(4)).await;

        assert!(matches!(
            client.next_event().await,
            Some(Event::Error(WsError::Handshake(HandshakeError::UnexpectedStatus(status)))) if status == 404
        ));
        expect_abnormal_close(&mut client).await;
    }

    #[tokio::test]
    async fn server_accepts_and_reads_pipelined_frame() {
        let mut wire = b"GET /chat HTTP/1.1\r\nHost: server.example.com\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\
            Sec-WebSocket-Protocol: chat, superchat\r\n\r\n"
            .to_vec();
        wire.extend_from_slice(&masked(true, OpCode::Text, b"first"));

        let config = WsConfig::default().with_protocols(["superchat"]);
        let stream = PushbackStream::new(ChunkedReader::split_every(&wire, 7));
        let mut server = WsConnection::accept(stream, Vec::new(), config, WsContext::from_seed(5)).await;

        let response = String::from_utf8(server.writer().clone()).unwrap();
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(response.contains("sec-websocket-accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(response.contains("sec-websocket-protocol: superchat\r\n"));

        assert!(matches!(server.next_event().await, Some(Event::Opened { protocol: Some(p) }) if p == "superchat"));
        assert!(matches!(server.next_event().await, Some(Event::Message(Message::Text(t))) if t == "first"));
    }

    #[tokio::test]
    async fn server_rejects_unsupported_version() {
        let wire = "GET /chat HTTP/1.1\r\nHost: x\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 8\r\n\r\n";
        let stream = PushbackStream::new(ChunkedReader::new([wire]));
        let mut server = WsConnection::accept(stream, Vec::new(), WsConfig::default(), WsContext::from_seed(5)).await;

        let response = String::from_utf8(server.writer().clone()).unwrap();
        assert!(response.starts_with("HTTP/1.1 426 Upgrade Required\r\n"));
        assert!(response.contains("sec-websocket-version: 13\r\n"));

        assert!(matches!(
            server.next_event().await,
            Some(Event::Error(WsError::Handshake(HandshakeError::UnsupportedVersion(_))))
        ));
        expect_abnormal_close(&mut server).await;
    }

    #[tokio::test]
    async fn fragments_pings_and_peer_close() {
        let mut wire = masked(false, OpCode::Text, b"Hel");
        wire.extend(masked(true, OpCode::Ping, b"p"));
        wire.extend(masked(true, OpCode::Continuation, b"lo"));
        wire.extend(masked(true, OpCode::Pong, b"ignored"));
        wire.extend(masked(true, OpCode::Binary, &[1, 2, 3]));
        wire.extend(masked(true, OpCode::Close, &close::encode_close_payload(Some(4000), "bye")));
        let mut server = server_over(wire);

        assert!(matches!(server.next_event().await, Some(Event::Message(Message::Text(t))) if t == "Hello"));
        assert!(matches!(server.next_event().await, Some(Event::Message(Message::Binary(b))) if b[..] == [1, 2, 3]));
        assert!(matches!(
            server.next_event().await,
            Some(Event::Closed { code: 4000, reason, was_clean: true }) if reason == "bye"
        ));
        assert!(server.next_event().await.is_none());

        // unmasked pong with the ping payload, then the echoed close
        let mut expected = build_frame(OpCode::Pong, b"p", None).to_vec();
        expected.extend_from_slice(&build_frame(OpCode::Close, b"\x0F\xA0bye", None));
        assert_eq!(server.writer(), &expected);
    }

    #[tokio::test]
    async fn ping_is_answered_while_closing() {
        let mut wire = masked(true, OpCode::Ping, b"p");
        wire.extend(masked(true, OpCode::Close, &close::encode_close_payload(Some(1000), "")));
        let mut server = server_over(wire);

        server.close(Some(1000), "").await.unwrap();
        assert_eq!(server.state(), State::Closing);
        assert!(matches!(server.next_event().await, Some(Event::Closed { code: 1000, was_clean: true, .. })));
        assert!(server.next_event().await.is_none());

        // our close, then the pong; the peer's close needs no echo
        let mut expected = build_frame(OpCode::Close, b"\x03\xE8", None).to_vec();
        expected.extend_from_slice(&build_frame(OpCode::Pong, b"p", None));
        assert_eq!(server.writer(), &expected);
    }

    #[tokio::test]
    async fn empty_close_reports_no_status() {
        let mut server = server_over(masked(true, OpCode::Close, b""));
        assert!(matches!(
            server.next_event().await,
            Some(Event::Closed { code: close::NO_STATUS, was_clean: true, .. })
        ));
        assert_eq!(server.writer(), &build_frame(OpCode::Close, b"", None).to_vec());
    }

    #[tokio::test]
    async fn protocol_violations_close_abnormally() {
        let cases: [(Vec<u8>, fn(&WsError) -> bool); 7] = [
            (build_frame(OpCode::Text, b"unmasked", None).to_vec(), |e| matches!(e, WsError::UnmaskedFrame)),
            (masked(true, OpCode::Text, &[0xFF, 0xFE]), |e| matches!(e, WsError::InvalidUtf8)),
            (masked(true, OpCode::Continuation, b"x"), |e| matches!(e, WsError::UnexpectedContinuation)),
            ([masked(false, OpCode::Text, b"a"), masked(true, OpCode::Text, b"b")].concat(), |e| {
                matches!(e, WsError::ExpectedContinuation)
            }),
            (vec![0x81, 0x05, b'h'], |e| matches!(e, WsError::UnexpectedEof)),
            (vec![0xF1, 0x80, 0, 0, 0, 0], |e| matches!(e, WsError::ReservedBitsNotZero)),
            (masked(true, OpCode::Close, &[0x03, 0xED]), |e| matches!(e, WsError::InvalidCloseCode(1005))),
        ];

        for (wire, is_expected) in cases {
            let mut server = server_over(wire);
            match server.next_event().await {
                Some(Event::Error(e)) => assert!(is_expected(&e), "unexpected error {e}"),
                other => panic!("expected an error event, got {other:?}"),
            }
            expect_abnormal_close(&mut server).await;
        }
    }

    #[tokio::test]
    async fn message_size_is_bounded() {
        let mut wire = masked(false, OpCode::Binary, &[0; 6]);
        wire.extend(masked(true, OpCode::Continuation, &[0; 6]));
        let stream = PushbackStream::new(ChunkedReader::new([wire]));
        let config = WsConfig::default().with_max_message_size(10);
        let mut server = WsConnection::from_upgraded(stream, Vec::new(), Role::Server, config, WsContext::from_seed(0));

        assert!(matches!(server.next_event().await, Some(Event::Error(WsError::MessageTooLarge { size: 12, max_size: 10 }))));
        expect_abnormal_close(&mut server).await;
    }

    #[tokio::test]
    async fn close_arguments_are_checked_before_sending() {
        let stream = PushbackStream::new(ChunkedReader::default());
        let mut client =
            WsConnection::from_upgraded(stream, Vec::new(), Role::Client, WsConfig::default(), WsContext::from_seed(6));

        assert!(matches!(client.close(Some(1001), "").await, Err(WsError::InvalidCloseCode(1001))));
        assert!(matches!(client.close(Some(1000), &"x".repeat(124)).await, Err(WsError::CloseReasonTooLong(124))));
        assert_eq!(client.state(), State::Open);
        assert!(client.writer().is_empty());

        client.close(Some(3000), "ok").await.unwrap();
        assert_eq!(client.state(), State::Closing);

        let written = client.writer().clone();
        let header = parse_header(&written, 125).unwrap().unwrap();
        assert_eq!(header.opcode, OpCode::Close);
        let mut payload = written[header.header_size..].to_vec();
        apply_mask(&mut payload, header.mask_key.unwrap());
        assert_eq!(payload, b"\x0B\xB8ok");

        // closing twice sends nothing more
        client.close(None, "").await.unwrap();
        assert_eq!(client.writer().len(), written.len());
    }

    #[tokio::test]
    async fn client_masks_with_fresh_keys() {
        let stream = PushbackStream::new(ChunkedReader::default());
        let mut client =
            WsConnection::from_upgraded(stream, Vec::new(), Role::Client, WsConfig::default(), WsContext::from_seed(8));
        client.send_text("one").await.unwrap();
        client.ping("two").await.unwrap();
        assert!(matches!(client.ping(vec![0u8; 126]).await, Err(WsError::ControlFrameTooLarge(126))));

        let written = client.writer().clone();
        let first = parse_header(&written, 125).unwrap().unwrap();
        let second = parse_header(&written[first.frame_len() as usize..], 125).unwrap().unwrap();
        assert_eq!(first.opcode, OpCode::Text);
        assert_eq!(second.opcode, OpCode::Ping);
        assert!(first.mask_key.is_some());
        assert_ne!(first.mask_key, second.mask_key);
    }

    #[tokio::test]
    async fn into_parts_keeps_undecoded_bytes() {
        let mut wire = masked(true, OpCode::Text, b"one");
        wire.extend_from_slice(b"\x81");
        let mut server = server_over(wire);

        assert!(matches!(server.next_event().await, Some(Event::Message(_))));
        let (mut stream, _writer) = server.into_parts();
        assert_eq!(stream.read().await.unwrap().unwrap(), Bytes::from_static(b"\x81"));
    }
}

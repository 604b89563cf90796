//! Opening handshake (RFC 6455 section 4)
//!
//! ```text
//! GET /chat HTTP/1.1
//! Host: server.example.com
//! Upgrade: websocket
//! Connection: Upgrade
//! Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==
//! Sec-WebSocket-Version: 13
//!
//! HTTP/1.1 101 Switching Protocols
//! Upgrade: websocket
//! Connection: Upgrade
//! Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=
//! ```
//!
//! Only header checks and header building live here; the connection does the I/O.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::header::{
    CONNECTION, HOST, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_PROTOCOL, SEC_WEBSOCKET_VERSION, UPGRADE,
};
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, Uri, request, response};
use http_body_util::Empty;
use micro_wire::codec::header::has_token;
use micro_wire::protocol::RequestHead;
use sha1::{Digest, Sha1};

use crate::context::WsContext;
use crate::error::HandshakeError;

const WS_GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
const WS_VERSION: HeaderValue = HeaderValue::from_static("13");
const WEBSOCKET: HeaderValue = HeaderValue::from_static("websocket");
const UPGRADE_TOKEN: HeaderValue = HeaderValue::from_static("Upgrade");

/// `base64(SHA-1(key + GUID))`
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID);
    STANDARD.encode(hasher.finalize())
}

/// A new `Sec-WebSocket-Key`: 16 random bytes, base64 encoded.
pub fn generate_key(ctx: &mut WsContext) -> String {
    STANDARD.encode(ctx.nonce())
}

/// Builds the client's upgrade request for `uri`, which must carry an authority.
pub fn client_request(uri: &Uri, key: &str, protocols: &[String]) -> Result<RequestHead, HandshakeError> {
    let authority = uri.authority().ok_or_else(|| HandshakeError::invalid_uri(format!("{uri} has no host")))?;

    let mut request = Request::new(());
    *request.uri_mut() = uri.clone();

    let headers = request.headers_mut();
    headers.insert(HOST, HeaderValue::from_str(authority.as_str())?);
    headers.insert(UPGRADE, WEBSOCKET);
    headers.insert(CONNECTION, UPGRADE_TOKEN);
    headers.insert(SEC_WEBSOCKET_KEY, HeaderValue::from_str(key)?);
    headers.insert(SEC_WEBSOCKET_VERSION, WS_VERSION);
    if !protocols.is_empty() {
        headers.insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_str(&protocols.join(", "))?);
    }
    Ok(request)
}

/// Checks the server's answer to a request sent with `key`.
///
/// Returns the subprotocol the server picked, which must be one of `offered`.
pub fn validate_response(parts: &response::Parts, key: &str, offered: &[String]) -> Result<Option<String>, HandshakeError> {
    if parts.status != StatusCode::SWITCHING_PROTOCOLS {
        return Err(HandshakeError::UnexpectedStatus(parts.status));
    }
    check_upgrade_headers(&parts.headers)?;

    let expected = compute_accept_key(key);
    let actual = parts.headers.get(SEC_WEBSOCKET_ACCEPT).and_then(|value| value.to_str().ok());
    if actual != Some(expected.as_str()) {
        return Err(HandshakeError::AcceptMismatch { expected, actual: actual.map(String::from) });
    }

    match parts.headers.get(SEC_WEBSOCKET_PROTOCOL) {
        None => Ok(None),
        Some(value) => {
            let picked = String::from_utf8_lossy(value.as_bytes()).trim().to_string();
            if offered.contains(&picked) { Ok(Some(picked)) } else { Err(HandshakeError::UnexpectedProtocol(picked)) }
        }
    }
}

/// What a valid upgrade request asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    pub key: String,
    pub protocols: Vec<String>,
}

/// Checks a client's upgrade request.
pub fn validate_request(parts: &request::Parts) -> Result<UpgradeRequest, HandshakeError> {
    if parts.method != Method::GET {
        return Err(HandshakeError::InvalidMethod(parts.method.clone()));
    }
    check_upgrade_headers(&parts.headers)?;

    let version = parts.headers.get(SEC_WEBSOCKET_VERSION);
    if version != Some(&WS_VERSION) {
        return Err(HandshakeError::UnsupportedVersion(version.map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())));
    }

    let key = parts.headers.get(SEC_WEBSOCKET_KEY).ok_or(HandshakeError::MissingKey)?;
    let key = key.to_str().map_err(|_e| HandshakeError::InvalidKey)?.trim();
    match STANDARD.decode(key) {
        Ok(nonce) if nonce.len() == 16 => {}
        _ => return Err(HandshakeError::InvalidKey),
    }

    let protocols = parts
        .headers
        .get_all(SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|protocol| !protocol.is_empty())
        .map(String::from)
        .collect();

    Ok(UpgradeRequest { key: key.to_string(), protocols })
}

/// The first protocol the client offered that the server supports.
pub fn select_protocol(offered: &[String], supported: &[String]) -> Option<String> {
    offered.iter().find(|protocol| supported.contains(protocol)).cloned()
}

/// The `101 Switching Protocols` answer to a request with `key`.
pub fn accept_response(key: &str, protocol: Option<&str>) -> Result<Response<Empty<Bytes>>, HandshakeError> {
    let mut response = Response::new(Empty::new());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;

    let headers = response.headers_mut();
    headers.insert(UPGRADE, WEBSOCKET);
    headers.insert(CONNECTION, UPGRADE_TOKEN);
    headers.insert(SEC_WEBSOCKET_ACCEPT, HeaderValue::from_str(&compute_accept_key(key))?);
    if let Some(protocol) = protocol {
        headers.insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_str(protocol)?);
    }
    Ok(response)
}

/// The error response for a rejected upgrade; it closes the connection.
pub fn reject_response(error: &HandshakeError) -> Response<Empty<Bytes>> {
    let mut response = Response::new(Empty::new());
    let headers = response.headers_mut();
    headers.insert(CONNECTION, HeaderValue::from_static("close"));

    if let HandshakeError::UnsupportedVersion(_) = error {
        *response.status_mut() = StatusCode::UPGRADE_REQUIRED;
        response.headers_mut().insert(SEC_WEBSOCKET_VERSION, WS_VERSION);
    } else {
        *response.status_mut() = StatusCode::BAD_REQUEST;
    }
    response
}

fn check_upgrade_headers(headers: &HeaderMap) -> Result<(), HandshakeError> {
    if !has_token(headers, UPGRADE, "websocket") {
        return Err(HandshakeError::InvalidUpgradeHeader);
    }
    if !has_token(headers, CONNECTION, "upgrade") {
        return Err(HandshakeError::InvalidConnectionHeader);
    }
    Ok(())
}

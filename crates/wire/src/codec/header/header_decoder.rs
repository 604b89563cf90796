//! Turns a [`RawHead`] into typed request and response heads
//!
//! `httparse` validates the start line and the header grammar over the re-terminated
//! head block. Repeated header names are folded into one value joined with `", "` in
//! arrival order, and the raw lines are kept as a [`RawHeaderLines`] extension.
//!
//! The decoder also picks the body framing:
//!
//! - requests: GET and HEAD never carry a body, otherwise `content-length`, then
//!   `transfer-encoding: chunked`, then read until close
//! - responses: 1xx, 204, 304 and answers to HEAD carry no body, otherwise the same
//!   order as requests

use bytes::BytesMut;
use http::header::{CONTENT_LENGTH, Entry, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode, Uri, Version};
use httparse::{Error, Status};
use tracing::trace;

use crate::codec::header::{RawHead, RawHeaderLines};
use crate::config::{DEFAULT_MAX_HEADERS, HttpConfig};
use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader, ResponseHeader};

/// Parses complete message heads read by [`read_head`](crate::codec::header::read_head).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderDecoder {
    max_headers: usize,
}

impl Default for HeaderDecoder {
    fn default() -> Self {
        Self { max_headers: DEFAULT_MAX_HEADERS }
    }
}

impl HeaderDecoder {
    pub fn new(config: &HttpConfig) -> Self {
        Self { max_headers: config.max_headers() }
    }

    pub fn decode_request(&self, head: &RawHead) -> Result<(RequestHeader, PayloadSize), ParseError> {
        let mut slots = vec![httparse::EMPTY_HEADER; self.slot_count(head)];
        let mut parsed = httparse::Request::new(&mut slots);
        let status = parsed.parse(head.as_bytes()).map_err(|e| self.map_error(e))?;
        ensure!(matches!(status, Status::Complete(_)), ParseError::invalid_header("incomplete request head"));

        let method = parsed.method.ok_or(ParseError::InvalidMethod)?;
        let method = Method::from_bytes(method.as_bytes()).map_err(|_| ParseError::InvalidMethod)?;
        let uri = parsed.path.ok_or(ParseError::InvalidUri)?;
        let uri = Uri::try_from(uri).map_err(|_| ParseError::InvalidUri)?;

        let mut request = Request::new(());
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        *request.version_mut() = parse_version(parsed.version)?;
        *request.headers_mut() = combine_headers(parsed.headers)?;
        request.extensions_mut().insert(RawHeaderLines(head.header_lines().to_vec()));

        let header = RequestHeader::from(request);
        let payload_size = request_payload_size(&header)?;
        trace!(method = %header.method(), uri = %header.uri(), ?payload_size, "decoded request head");
        Ok((header, payload_size))
    }

    /// `request_method` is the method of the request this response answers.
    pub fn decode_response(&self, head: &RawHead, request_method: &Method) -> Result<(ResponseHeader, PayloadSize), ParseError> {
        let mut slots = vec![httparse::EMPTY_HEADER; self.slot_count(head)];
        let mut parsed = httparse::Response::new(&mut slots);
        let status = parsed.parse(head.as_bytes()).map_err(|e| self.map_error(e))?;
        ensure!(matches!(status, Status::Complete(_)), ParseError::invalid_header("incomplete response head"));

        let code = parsed.code.ok_or(ParseError::InvalidStatus(None))?;
        let status = StatusCode::from_u16(code).map_err(|_| ParseError::InvalidStatus(Some(code)))?;

        let mut response = Response::new(());
        *response.status_mut() = status;
        *response.version_mut() = parse_version(parsed.version)?;
        *response.headers_mut() = combine_headers(parsed.headers)?;
        response.extensions_mut().insert(RawHeaderLines(head.header_lines().to_vec()));

        let header = ResponseHeader::from(response);
        let payload_size = response_payload_size(&header, request_method)?;
        trace!(status = %header.status(), ?payload_size, "decoded response head");
        Ok((header, payload_size))
    }

    fn slot_count(&self, head: &RawHead) -> usize {
        // one slot beyond the limit lets httparse report the overflow itself
        head.header_lines().len().min(self.max_headers + 1).max(1)
    }

    fn map_error(&self, e: Error) -> ParseError {
        match e {
            Error::TooManyHeaders => ParseError::too_many_headers(self.max_headers),
            Error::Version => ParseError::InvalidVersion(None),
            Error::Status => ParseError::InvalidStatus(None),
            e => ParseError::invalid_header(e),
        }
    }
}

fn parse_version(version: Option<u8>) -> Result<Version, ParseError> {
    match version {
        Some(0) => Ok(Version::HTTP_10),
        Some(1) => Ok(Version::HTTP_11),
        v => Err(ParseError::InvalidVersion(v)),
    }
}

fn combine_headers(parsed: &[httparse::Header<'_>]) -> Result<HeaderMap, ParseError> {
    let mut headers = HeaderMap::with_capacity(parsed.len());
    for header in parsed {
        let name = HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|_| ParseError::invalid_header(format!("invalid header name {:?}", header.name)))?;
        append_combined(&mut headers, name, header.value)?;
    }
    Ok(headers)
}

/// Inserts `value`, joining it onto an existing value for the same name with `", "`.
pub(crate) fn append_combined(headers: &mut HeaderMap, name: HeaderName, value: &[u8]) -> Result<(), ParseError> {
    let invalid = |_| ParseError::invalid_header(format!("invalid value for header {name}"));
    match headers.entry(name.clone()) {
        Entry::Occupied(mut entry) => {
            let existing = entry.get().as_bytes();
            let mut joined = BytesMut::with_capacity(existing.len() + 2 + value.len());
            joined.extend_from_slice(existing);
            joined.extend_from_slice(b", ");
            joined.extend_from_slice(value);
            *entry.get_mut() = HeaderValue::from_maybe_shared(joined.freeze()).map_err(invalid)?;
        }
        Entry::Vacant(entry) => {
            entry.insert(HeaderValue::from_bytes(value).map_err(invalid)?);
        }
    }
    Ok(())
}

fn request_payload_size(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    if !header.need_body() {
        return Ok(PayloadSize::new_empty());
    }
    framing_payload_size(header.headers())
}

fn response_payload_size(header: &ResponseHeader, request_method: &Method) -> Result<PayloadSize, ParseError> {
    let status = header.status();
    if status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
        || *request_method == Method::HEAD
    {
        return Ok(PayloadSize::new_empty());
    }
    framing_payload_size(header.headers())
}

// refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length
fn framing_payload_size(headers: &HeaderMap) -> Result<PayloadSize, ParseError> {
    if let Some(cl_value) = headers.get(CONTENT_LENGTH) {
        return parse_content_length(cl_value).map(PayloadSize::new_length);
    }

    if is_chunked(headers.get(TRANSFER_ENCODING)) {
        Ok(PayloadSize::new_chunked())
    } else {
        Ok(PayloadSize::new_identity())
    }
}

pub(crate) fn parse_content_length(value: &HeaderValue) -> Result<u64, ParseError> {
    let digits = value.as_bytes().trim_ascii();
    ensure!(
        !digits.is_empty() && digits.iter().all(u8::is_ascii_digit),
        ParseError::invalid_content_length(format!("value {value:?} is not a decimal length"))
    );
    let digits = std::str::from_utf8(digits).map_err(ParseError::invalid_content_length)?;
    digits.parse::<u64>().map_err(|_| ParseError::invalid_content_length(format!("value {digits} is not u64")))
}

/// True when any comma separated token of `transfer-encoding` is `chunked`, ignoring case.
pub(crate) fn is_chunked(header_value: Option<&HeaderValue>) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    header_value.is_some_and(|value| {
        value.as_bytes().split(|b| *b == b',').any(|token| token.trim_ascii().eq_ignore_ascii_case(CHUNKED))
    })
}

/// True when a comma separated value of `name` contains `token`, ignoring case.
pub fn has_token(headers: &HeaderMap, name: HeaderName, token: &str) -> bool {
    headers.get_all(name).iter().any(|value| {
        value.as_bytes().split(|b| *b == b',').any(|item| item.trim_ascii().eq_ignore_ascii_case(token.as_bytes()))
    })
}

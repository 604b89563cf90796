use bytes::{Bytes, BytesMut};
use tokio::io::AsyncRead;
use tracing::trace;

use crate::codec::line::{LineDecoder, read_line};
use crate::config::HttpConfig;
use crate::protocol::ParseError;
use crate::stream::PushbackStream;

/// The lines of one message head exactly as they arrived, terminator excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHead {
    block: Bytes,
    lines: Vec<Bytes>,
}

impl RawHead {
    /// The start line followed by the header lines, without their CRLF.
    pub fn lines(&self) -> &[Bytes] {
        &self.lines
    }

    pub fn start_line(&self) -> &Bytes {
        // a RawHead is never built without its start line
        &self.lines[0]
    }

    pub fn header_lines(&self) -> &[Bytes] {
        &self.lines[1..]
    }

    /// The whole head re-terminated with CRLFs, ready for `httparse`.
    pub fn as_bytes(&self) -> &Bytes {
        &self.block
    }
}

/// Header lines of a parsed message in arrival order, attached as a request or response extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawHeaderLines(pub Vec<Bytes>);

impl RawHeaderLines {
    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Reads lines up to the empty line that ends a message head.
///
/// Bytes after the empty line stay on the stream as the start of the body. Returns
/// `Ok(None)` when no line at all was read, i.e. the stream ended cleanly or the
/// first line was already empty.
pub async fn read_head<R>(stream: &mut PushbackStream<R>, config: &HttpConfig) -> Result<Option<RawHead>, ParseError>
where
    R: AsyncRead + Unpin,
{
    let max_bytes = config.max_header_bytes();
    // the start line does not count as a header
    let max_lines = config.max_headers() + 1;

    let mut decoder = LineDecoder::with_max_length(max_bytes);
    let mut lines = Vec::new();
    let mut total = 0;

    loop {
        let line = match read_line(stream, &mut decoder).await? {
            Some(line) => line,
            None if lines.is_empty() => return Ok(None),
            None => {
                stream.mark_unreusable();
                return Err(ParseError::UnexpectedEof);
            }
        };

        if line.is_empty() {
            if lines.is_empty() {
                return Ok(None);
            }
            break;
        }

        total += line.len() + 2;
        let exceeded = if total > max_bytes {
            Some(ParseError::too_large_header(total, max_bytes))
        } else if lines.len() >= max_lines {
            Some(ParseError::too_many_headers(config.max_headers()))
        } else {
            None
        };
        if let Some(e) = exceeded {
            stream.mark_unreusable();
            return Err(e);
        }

        lines.push(line);
    }

    trace!(lines = lines.len(), bytes = total, "read message head");

    let mut block = BytesMut::with_capacity(total + 2);
    for line in &lines {
        block.extend_from_slice(line);
        block.extend_from_slice(b"\r\n");
    }
    block.extend_from_slice(b"\r\n");

    Ok(Some(RawHead { block: block.freeze(), lines }))
}

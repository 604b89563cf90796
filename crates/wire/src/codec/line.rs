//! CRLF-delimited line reading on top of a [`PushbackStream`].

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::AsyncRead;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::config::DEFAULT_MAX_HEADER_BYTES;
use crate::protocol::ParseError;
use crate::stream::PushbackStream;

const CRLF: &[u8] = b"\r\n";

/// Splits a buffer at the first `\r\n`, yielding the bytes before it.
///
/// The scan resumes where the previous call stopped, so feeding a line byte by byte
/// stays linear. A line longer than `max_length` (delimiter excluded) is rejected as
/// an oversized header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDecoder {
    max_length: usize,
    next_index: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_HEADER_BYTES)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self { max_length, next_index: 0 }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineDecoder {
    type Item = Bytes;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // step back one byte, the CR may have arrived at the end of the last call
        let start = self.next_index.saturating_sub(1);
        let found = src[start..].windows(CRLF.len()).position(|window| window == CRLF).map(|offset| start + offset);

        match found {
            Some(index) => {
                self.next_index = 0;
                if index > self.max_length {
                    return Err(ParseError::too_large_header(index, self.max_length));
                }
                let line = src.split_to(index).freeze();
                src.advance(CRLF.len());
                Ok(Some(line))
            }
            None => {
                // a trailing CR may still be the start of the delimiter
                let pending = src.len().saturating_sub(usize::from(src.last() == Some(&b'\r')));
                if pending > self.max_length {
                    return Err(ParseError::too_large_header(src.len(), self.max_length));
                }
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() => {
                self.next_index = 0;
                Ok(None)
            }
            None => {
                self.next_index = 0;
                Err(ParseError::UnexpectedEof)
            }
        }
    }
}

/// Reads one line from `stream`, returning everything after the delimiter to it.
///
/// `Ok(None)` means the stream ended cleanly before any byte of a new line arrived.
pub async fn read_line<R>(stream: &mut PushbackStream<R>, decoder: &mut LineDecoder) -> Result<Option<Bytes>, ParseError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::new();

    loop {
        let result = match stream.pull().await? {
            Some(bytes) => {
                if buf.is_empty() {
                    buf = BytesMut::from(bytes);
                } else {
                    buf.extend_from_slice(&bytes);
                }
                decoder.decode(&mut buf)
            }
            None => match decoder.decode_eof(&mut buf) {
                Ok(None) => return Ok(None),
                other => other,
            },
        };

        match result {
            Ok(Some(line)) => {
                trace!(len = line.len(), rest = buf.len(), "read line");
                stream.unshift(buf.freeze());
                return Ok(Some(line));
            }
            Ok(None) => {}
            Err(e) => {
                stream.mark_unreusable();
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ChunkedReader;

    #[test]
    fn splits_at_first_crlf() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nHost: a\r\n"[..]);
        let mut decoder = LineDecoder::new();

        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap(), "GET / HTTP/1.1");
        assert_eq!(&buf[..], b"Host: a\r\n");
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap(), "Host: a");
        assert!(buf.is_empty());
    }

    #[test]
    fn delimiter_split_across_calls() {
        let mut decoder = LineDecoder::new();
        let mut buf = BytesMut::from(&b"abc\r"[..]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\ndef");
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap(), "abc");
        assert_eq!(&buf[..], b"def");
    }

    #[test]
    fn lone_lf_is_not_a_delimiter() {
        let mut decoder = LineDecoder::new();
        let mut buf = BytesMut::from(&b"a\nb\r\n"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap(), "a\nb");
    }

    #[test]
    fn overlong_line_is_rejected() {
        let mut decoder = LineDecoder::with_max_length(4);
        let mut buf = BytesMut::from(&b"12345"[..]);
        assert!(matches!(decoder.decode(&mut buf), Err(ParseError::TooLargeHeader { .. })));

        let mut decoder = LineDecoder::with_max_length(4);
        let mut buf = BytesMut::from(&b"1234\r"[..]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"\n");
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap(), "1234");
    }

    #[test]
    fn eof_inside_a_line() {
        let mut decoder = LineDecoder::new();
        let mut buf = BytesMut::from(&b"partial"[..]);
        assert!(matches!(decoder.decode_eof(&mut buf), Err(ParseError::UnexpectedEof)));

        let mut buf = BytesMut::new();
        assert!(decoder.decode_eof(&mut buf).unwrap().is_none());
    }

    #[tokio::test]
    async fn read_line_returns_the_remainder() {
        let mut stream = PushbackStream::new(ChunkedReader::new(["hello\r\nwor", "ld\r\n"]));
        let mut decoder = LineDecoder::new();

        assert_eq!(read_line(&mut stream, &mut decoder).await.unwrap().unwrap(), "hello");
        assert_eq!(stream.buffered_len(), 3);
        assert_eq!(read_line(&mut stream, &mut decoder).await.unwrap().unwrap(), "world");
        assert!(read_line(&mut stream, &mut decoder).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_line_on_every_split() {
        let data = b"first line\r\nsecond\r\n";
        for size in 1..=data.len() {
            let mut stream = PushbackStream::new(ChunkedReader::split_every(data, size));
            let mut decoder = LineDecoder::new();

            assert_eq!(read_line(&mut stream, &mut decoder).await.unwrap().unwrap(), "first line", "split {size}");
            assert_eq!(read_line(&mut stream, &mut decoder).await.unwrap().unwrap(), "second", "split {size}");
            assert!(read_line(&mut stream, &mut decoder).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn read_line_eof_mid_line() {
        let mut stream = PushbackStream::new(ChunkedReader::new(["no newline"]));
        let mut decoder = LineDecoder::new();

        let err = read_line(&mut stream, &mut decoder).await.unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof));
        assert!(!stream.is_reusable());
    }
}

//! Decoder for the chunked transfer coding, see
//! [RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112.html#section-7.1).
//!
//! ```text
//! chunk      = chunk-size [ chunk-ext ] CRLF chunk-data CRLF
//! last-chunk = 1*("0") [ chunk-ext ] CRLF
//! trailer    = *( field-line CRLF ) CRLF
//! ```
//!
//! Chunk data goes through a [`LengthDecoder`]; everything else is consumed one byte at
//! a time so the decoder can stop and resume at any split point.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use ChunkedState::*;

use crate::codec::body::LengthDecoder;
use crate::config::{DEFAULT_MAX_CHUNK_EXTENSION, DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MAX_HEADER_BYTES, HttpConfig};
use crate::protocol::{ParseError, PayloadItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    /// Size of the chunk whose size line is being read
    size: u64,
    has_digits: bool,
    extension_len: usize,
    trailer_len: usize,
    body: LengthDecoder,
    max_chunk_size: u64,
    max_extension: usize,
    max_trailer: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read the chunk size in hex
    Size,
    /// Whitespace after the size
    SizeLws,
    /// Skip chunk extensions
    Extension,
    /// LF ending the size line
    SizeLf,
    /// Chunk data
    Body,
    /// CR after chunk data
    BodyCr,
    /// LF after chunk data
    BodyLf,
    /// A trailer field line
    Trailer,
    /// LF after a trailer field
    TrailerLf,
    /// CR of the final empty line, or the first byte of a trailer
    EndCr,
    /// LF of the final empty line
    EndLf,
    /// The last chunk and its trailer have been consumed
    End,
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::with_limits(DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MAX_CHUNK_EXTENSION, DEFAULT_MAX_HEADER_BYTES)
    }
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &HttpConfig) -> Self {
        Self::with_limits(config.max_chunk_size(), config.max_chunk_extension(), config.max_header_bytes())
    }

    /// `max_trailer` bounds the bytes of all trailer lines together.
    pub fn with_limits(max_chunk_size: u64, max_extension: usize, max_trailer: usize) -> Self {
        Self {
            state: Size,
            size: 0,
            has_digits: false,
            extension_len: 0,
            trailer_len: 0,
            body: LengthDecoder::new(0),
            max_chunk_size,
            max_extension,
            max_trailer,
        }
    }

    #[inline]
    pub fn is_finish(&self) -> bool {
        self.state == End
    }

    fn step(&mut self, byte: u8) -> Result<ChunkedState, ParseError> {
        match self.state {
            Size => self.read_size(byte),
            SizeLws => match byte {
                // LWS can follow the chunk size, but no more digits can come
                b'\t' | b' ' => Ok(SizeLws),
                b';' => Ok(Extension),
                b'\r' => Ok(SizeLf),
                _ => Err(ParseError::invalid_chunk("invalid chunk size linear white space")),
            },
            Extension => match byte {
                b'\r' => Ok(SizeLf),
                // plain LF inside an extension is rejected instead of treated as a line end
                b'\n' => Err(ParseError::invalid_chunk("chunk extension contains newline")),
                _ => {
                    self.extension_len += 1;
                    if self.extension_len > self.max_extension {
                        return Err(ParseError::invalid_chunk(format!("chunk extension exceed the limit {}", self.max_extension)));
                    }
                    Ok(Extension)
                }
            },
            SizeLf => match byte {
                b'\n' => Ok(self.start_chunk()),
                _ => Err(ParseError::invalid_chunk("invalid chunk size LF")),
            },
            BodyCr => match byte {
                b'\r' => Ok(BodyLf),
                _ => Err(ParseError::invalid_chunk("missing CR after chunk data")),
            },
            BodyLf => match byte {
                b'\n' => Ok(Size),
                _ => Err(ParseError::invalid_chunk("missing LF after chunk data")),
            },
            EndCr => match byte {
                b'\r' => Ok(EndLf),
                _ => self.read_trailer(byte),
            },
            Trailer => self.read_trailer(byte),
            TrailerLf => match byte {
                b'\n' => Ok(EndCr),
                _ => Err(ParseError::invalid_chunk("invalid trailer end LF")),
            },
            EndLf => match byte {
                b'\n' => Ok(End),
                _ => Err(ParseError::invalid_chunk("invalid chunk end LF")),
            },
            // both are handled before a byte is taken
            Body | End => Ok(self.state),
        }
    }

    fn read_size(&mut self, byte: u8) -> Result<ChunkedState, ParseError> {
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte + 10 - b'a',
            b'A'..=b'F' => byte + 10 - b'A',
            b'\t' | b' ' | b';' | b'\r' if !self.has_digits => {
                return Err(ParseError::invalid_chunk("chunk size line has no size"));
            }
            b'\t' | b' ' => return Ok(SizeLws),
            b';' => return Ok(Extension),
            b'\r' => return Ok(SizeLf),
            _ => return Err(ParseError::invalid_chunk("invalid chunk size line: Invalid Size")),
        };

        self.size = self
            .size
            .checked_mul(16)
            .and_then(|size| size.checked_add(u64::from(digit)))
            .ok_or_else(|| ParseError::invalid_chunk("invalid overflow chunked length"))?;
        self.has_digits = true;

        if self.size > self.max_chunk_size {
            return Err(ParseError::too_large_chunk(self.size, self.max_chunk_size));
        }
        Ok(Size)
    }

    fn start_chunk(&mut self) -> ChunkedState {
        let size = self.size;
        self.size = 0;
        self.has_digits = false;
        self.extension_len = 0;

        if size == 0 {
            EndCr
        } else {
            trace!(size, "start reading chunk");
            self.body = LengthDecoder::new(size);
            Body
        }
    }

    fn read_trailer(&mut self, byte: u8) -> Result<ChunkedState, ParseError> {
        self.trailer_len += 1;
        if self.trailer_len > self.max_trailer {
            return Err(ParseError::invalid_chunk(format!("chunk trailer exceed the limit {}", self.max_trailer)));
        }
        match byte {
            b'\r' => Ok(TrailerLf),
            _ => Ok(Trailer),
        }
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                End => {
                    trace!("finished reading chunked data");
                    return Ok(Some(PayloadItem::Eof));
                }
                Body => match self.body.decode(src)? {
                    Some(PayloadItem::Chunk(bytes)) => {
                        if self.body.is_finish() {
                            self.state = BodyCr;
                        }
                        trace!(len = bytes.len(), "read chunked bytes");
                        return Ok(Some(PayloadItem::Chunk(bytes)));
                    }
                    Some(PayloadItem::Eof) => self.state = BodyCr,
                    None => return Ok(None),
                },
                _ => {
                    if !src.has_remaining() {
                        // need more data
                        return Ok(None);
                    }
                    self.state = self.step(src.get_u8())?;
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(ParseError::UnexpectedEof),
        }
    }
}

//! One decoder over the four ways a body can be framed.

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::config::HttpConfig;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// Decode payload with a fixed content length
    Length(LengthDecoder),

    /// Decode payload using chunked transfer encoding
    Chunked(ChunkedDecoder),

    /// Forward everything until the source ends
    Identity { eof: bool },

    /// Handle messages with no body
    NoBody,
}

impl PayloadDecoder {
    pub fn new(payload_size: PayloadSize, config: &HttpConfig) -> Self {
        match payload_size {
            PayloadSize::Length(length) => Self::fix_length(length),
            PayloadSize::Chunked => Self { kind: Kind::Chunked(ChunkedDecoder::from_config(config)) },
            PayloadSize::Identity => Self::identity(),
            PayloadSize::Empty => Self::empty(),
        }
    }

    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedDecoder::new()) }
    }

    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthDecoder::new(size)) }
    }

    pub fn identity() -> Self {
        Self { kind: Kind::Identity { eof: false } }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self.kind, Kind::Chunked(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, Kind::NoBody)
    }

    pub fn is_fix_length(&self) -> bool {
        matches!(self.kind, Kind::Length(_))
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.kind, Kind::Identity { .. })
    }

    /// True once the body has been read to its end and no more input is needed.
    pub fn is_finish(&self) -> bool {
        match &self.kind {
            Kind::Length(decoder) => decoder.is_finish(),
            Kind::Chunked(decoder) => decoder.is_finish(),
            Kind::Identity { eof } => *eof,
            Kind::NoBody => true,
        }
    }

    /// Bytes still expected, when the framing declares them.
    pub fn remaining(&self) -> Option<u64> {
        match &self.kind {
            Kind::Length(decoder) => Some(decoder.remaining()),
            Kind::NoBody => Some(0),
            Kind::Chunked(_) | Kind::Identity { .. } => None,
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode(src),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode(src),
            Kind::Identity { eof: true } | Kind::NoBody => Ok(Some(PayloadItem::Eof)),
            Kind::Identity { eof: false } => {
                if src.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(PayloadItem::Chunk(src.split().freeze())))
                }
            }
        }
    }

    /// End of stream finishes an identity body and truncates any other.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode_eof(src),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode_eof(src),
            Kind::Identity { eof } => {
                if src.is_empty() {
                    *eof = true;
                    Ok(Some(PayloadItem::Eof))
                } else {
                    Ok(Some(PayloadItem::Chunk(src.split().freeze())))
                }
            }
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_forwards_until_eof() {
        let mut decoder = PayloadDecoder::identity();
        let mut buffer = BytesMut::from(&b"anything \r\n0\r\n"[..]);

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(item.as_bytes().unwrap(), "anything \r\n0\r\n");
        assert!(decoder.decode(&mut buffer).unwrap().is_none());
        assert!(!decoder.is_finish());

        assert!(decoder.decode_eof(&mut buffer).unwrap().unwrap().is_eof());
        assert!(decoder.is_finish());
    }

    #[test]
    fn selects_by_payload_size() {
        let config = HttpConfig::default();
        assert!(PayloadDecoder::new(PayloadSize::Length(3), &config).is_fix_length());
        assert!(PayloadDecoder::new(PayloadSize::Chunked, &config).is_chunked());
        assert!(PayloadDecoder::new(PayloadSize::Identity, &config).is_identity());

        let mut empty = PayloadDecoder::new(PayloadSize::Empty, &config);
        assert!(empty.is_empty());
        assert!(empty.is_finish());
        assert!(empty.decode(&mut BytesMut::from(&b"untouched"[..])).unwrap().unwrap().is_eof());
    }

    #[test]
    fn truncated_length_body() {
        let mut decoder = PayloadDecoder::fix_length(10);
        let mut buffer = BytesMut::new();
        assert!(matches!(decoder.decode_eof(&mut buffer), Err(ParseError::UnexpectedEof)));
    }
}

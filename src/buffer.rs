//! Literal buffer
//!
//! Collects adjacent text and byte entries so that a run of them leaves the
//! stream as one chunk. Text is encoded only when the run is flushed.

use bytes::{Bytes, BytesMut};

use crate::codec::{Encoding, TextCodec};
use crate::error::TemplateError;

#[derive(Debug)]
enum Piece {
    Text(String),
    Bytes(Bytes),
}

/// Pending literal output. Never spans a sub-stream or unresolved future.
#[derive(Debug, Default)]
pub struct LiteralBuffer {
    pieces: Vec<Piece>,
}

impl LiteralBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, text: String) {
        if !text.is_empty() {
            self.pieces.push(Piece::Text(text));
        }
    }

    pub fn push_bytes(&mut self, bytes: Bytes) {
        if !bytes.is_empty() {
            self.pieces.push(Piece::Bytes(bytes));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Number of buffered pieces.
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    /// Concatenate everything buffered into one chunk and clear the buffer.
    ///
    /// Returns `Ok(None)` when nothing is buffered. The buffer is cleared even
    /// when encoding fails.
    pub fn flush(
        &mut self,
        codec: &dyn TextCodec,
        encoding: Encoding,
    ) -> Result<Option<Bytes>, TemplateError> {
        if self.pieces.is_empty() {
            return Ok(None);
        }

        let pieces = std::mem::take(&mut self.pieces);
        if let [Piece::Bytes(only)] = pieces.as_slice() {
            return Ok(Some(only.clone()));
        }

        let mut out = BytesMut::new();
        for piece in pieces {
            match piece {
                Piece::Text(text) => out.extend_from_slice(&codec.encode(&text, encoding)?),
                Piece::Bytes(bytes) => out.extend_from_slice(&bytes),
            }
        }
        Ok(Some(out.freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BuiltinCodec;

    #[test]
    fn flush_empty_is_none() {
        let mut buffer = LiteralBuffer::new();
        assert!(buffer.flush(&BuiltinCodec, Encoding::Utf8).unwrap().is_none());
    }

    #[test]
    fn flush_concatenates_in_order() {
        let mut buffer = LiteralBuffer::new();
        buffer.push_text("Hello ".into());
        buffer.push_bytes(Bytes::from_static(b"tom"));
        buffer.push_text(", hi".into());
        assert_eq!(buffer.len(), 3);

        let chunk = buffer.flush(&BuiltinCodec, Encoding::Utf8).unwrap().unwrap();
        assert_eq!(&chunk[..], b"Hello tom, hi");
        assert!(buffer.is_empty());
    }

    #[test]
    fn empty_pieces_are_not_buffered() {
        let mut buffer = LiteralBuffer::new();
        buffer.push_text(String::new());
        buffer.push_bytes(Bytes::new());
        assert!(buffer.is_empty());
    }

    #[test]
    fn text_uses_encoding_bytes_do_not() {
        let mut buffer = LiteralBuffer::new();
        buffer.push_text("a".into());
        buffer.push_bytes(Bytes::from_static(&[b'b', 0]));
        let chunk = buffer.flush(&BuiltinCodec, Encoding::Utf16Le).unwrap().unwrap();
        assert_eq!(&chunk[..], &[b'a', 0, b'b', 0]);
    }

    #[test]
    fn failed_flush_clears_buffer() {
        let mut buffer = LiteralBuffer::new();
        buffer.push_text("zz".into());
        assert!(buffer.flush(&BuiltinCodec, Encoding::Hex).is_err());
        assert!(buffer.is_empty());
    }
}

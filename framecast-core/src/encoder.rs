//! Chunked base64 encoder for text-only transports.
//!
//! Input is encoded [`ENCODE_CHUNK_SIZE`] bytes at a time and appended
//! to a reusable `String`. Because the chunk size is a multiple of 3, no
//! chunk but the last ever produces padding, so the output is identical
//! to encoding the whole buffer in one pass.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::ExportError;

/// Largest multiple of 3 that fits in 64 KiB.
pub const ENCODE_CHUNK_SIZE: usize = (64 * 1024 / 3) * 3;

const _: () = assert!(ENCODE_CHUNK_SIZE % 3 == 0);

/// Append the base64 text of `bytes` to `out`, chunk by chunk.
pub fn encode_chunked(bytes: &[u8], out: &mut String) {
    if let Some(len) = base64::encoded_len(bytes.len(), true) {
        out.reserve(len);
    }
    for chunk in bytes.chunks(ENCODE_CHUNK_SIZE) {
        STANDARD.encode_string(chunk, out);
    }
}

/// Decode text produced by [`encode_chunked`] or [`TextEncoder::encode`].
pub fn decode_text(text: &str) -> Result<Vec<u8>, ExportError> {
    Ok(STANDARD.decode(text)?)
}

// ── TextEncoder ──────────────────────────────────────────────────

/// Reusable encoder that keeps its output buffer between frames.
///
/// At a fixed frame size the accumulator reaches its final capacity on
/// the first call and is only cleared afterwards.
#[derive(Debug, Default)]
pub struct TextEncoder {
    text: String,
}

impl TextEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `bytes`, replacing the previous frame's text.
    pub fn encode(&mut self, bytes: &[u8]) -> &str {
        self.text.clear();
        encode_chunked(bytes, &mut self.text);
        &self.text
    }

    /// Text of the most recent [`encode`](Self::encode) call.
    pub fn last(&self) -> &str {
        &self.text
    }

    pub fn capacity(&self) -> usize {
        self.text.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 + 7) as u8).collect()
    }

    #[test]
    fn small_lengths_decode_back() {
        let mut enc = TextEncoder::new();
        for len in [0usize, 1, 2, 3, 4] {
            let bytes = pattern(len);
            let text = enc.encode(&bytes).to_owned();
            assert_eq!(decode_text(&text).unwrap(), bytes, "len = {len}");
        }
    }

    #[test]
    fn known_vectors() {
        let mut enc = TextEncoder::new();
        assert_eq!(enc.encode(b""), "");
        assert_eq!(enc.encode(b"f"), "Zg==");
        assert_eq!(enc.encode(b"fo"), "Zm8=");
        assert_eq!(enc.encode(b"foo"), "Zm9v");
        assert_eq!(enc.encode(b"foob"), "Zm9vYg==");
    }

    #[test]
    fn multi_chunk_matches_one_shot_encoding() {
        // Spans three chunks and ends on a partial group.
        let bytes = pattern(ENCODE_CHUNK_SIZE * 2 + 1_001);
        let mut enc = TextEncoder::new();
        let chunked = enc.encode(&bytes).to_owned();

        assert_eq!(chunked, STANDARD.encode(&bytes));
        assert!(!chunked[..chunked.len() - 4].contains('='));
        assert_eq!(decode_text(&chunked).unwrap(), bytes);
    }

    #[test]
    fn exact_chunk_boundary() {
        let bytes = pattern(ENCODE_CHUNK_SIZE);
        let mut out = String::new();
        encode_chunked(&bytes, &mut out);
        assert_eq!(out, STANDARD.encode(&bytes));
    }

    #[test]
    fn capacity_is_stable_across_frames() {
        let bytes = pattern(320 * 240 * 4);
        let mut enc = TextEncoder::new();
        enc.encode(&bytes);
        let cap = enc.capacity();
        for _ in 0..5 {
            enc.encode(&bytes);
            assert_eq!(enc.capacity(), cap);
        }
    }

    #[test]
    fn invalid_text_is_rejected() {
        assert!(matches!(
            decode_text("not base64!"),
            Err(ExportError::Decode(_))
        ));
    }
}

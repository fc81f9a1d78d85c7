//! Little-endian binary cursor, writer and field capture
//!
//! Every container format in this crate is decoded through [`BinaryReader`],
//! a seekable cursor whose reads never come up short: a truncated stream is
//! always reported as [`Error::EndOfStream`](crate::Error::EndOfStream).
//!
//! Structured headers are read with a [`Capture`], which names each field as
//! it is read, supports validation and re-interpretation of the value just
//! read, and anchors relative seeks at the start of the structure.

mod capture;
mod reader;
mod writer;

pub use capture::{Capture, Captured, FieldSpan};
pub use reader::BinaryReader;
pub use writer::BinaryWriter;

use encoding_rs::WINDOWS_1252;

/// Decode text that is usually UTF-8 but sometimes Windows-1252.
///
/// Game data mixes both encodings, so UTF-8 is attempted first and the
/// single-byte decoding is used only when that fails. A Windows-1252 string
/// that happens to be valid UTF-8 is decoded as UTF-8.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Returns true if `bytes` would need the Windows-1252 fallback
pub fn needs_fallback(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes).is_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text_utf8() {
        assert_eq!(decode_text("café".as_bytes()), "café");
        assert!(!needs_fallback(b"plain"));
    }

    #[test]
    fn test_decode_text_windows_1252_fallback() {
        // 0xE9 alone is not valid UTF-8, in Windows-1252 it is 'é'
        assert!(needs_fallback(b"caf\xE9"));
        assert_eq!(decode_text(b"caf\xE9"), "café");
        // 0x80 is the euro sign in Windows-1252
        assert_eq!(decode_text(b"\x80 5"), "€ 5");
    }
}

//! Decompression of the block formats embedded in game containers
//!
//! Package entries are either zlib streams or LZ4 data; world-data records
//! use zlib only. Every helper here decompresses to an exact, known size and
//! treats any other length as corruption.

use flate2::read::ZlibDecoder;
use std::io::Read;

use crate::error::{Error, Result};

/// LZ4 frame magic number: 0x184D2204
const LZ4_FRAME_MAGIC: [u8; 4] = [0x04, 0x22, 0x4D, 0x18];

/// Upper bound on how far one byte of an LZ4 block can expand
const LZ4_MAX_RATIO: usize = 255;

/// Check if data starts with a zlib header (deflate method, valid check bits)
pub fn is_zlib_stream(data: &[u8]) -> bool {
    if data.len() < 2 {
        return false;
    }
    let cmf = data[0] as u16;
    let flg = data[1] as u16;
    cmf & 0x0F == 8 && (cmf >> 4) <= 7 && ((cmf << 8) | flg) % 31 == 0
}

/// Check if data is an LZ4 frame rather than a raw LZ4 block
pub fn is_lz4_frame(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == LZ4_FRAME_MAGIC
}

/// Inflate a zlib stream that must produce exactly `expected` bytes
pub fn inflate_exact(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data).take(expected as u64 + 1);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| Error::Decompression(format!("zlib error: {}", e)))?;
    check_size(decompressed, expected)
}

/// Decompress LZ4 data (frame or raw block) to exactly `expected` bytes
pub fn lz4_exact(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let decompressed = if is_lz4_frame(data) {
        let mut decoder = lz4_flex::frame::FrameDecoder::new(data).take(expected as u64 + 1);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| Error::Decompression(format!("LZ4 frame error: {}", e)))?;
        out
    } else {
        if expected > data.len().saturating_mul(LZ4_MAX_RATIO) {
            return Err(Error::CorruptData(format!(
                "{} LZ4 bytes cannot expand to {} bytes",
                data.len(),
                expected
            )));
        }
        lz4_flex::block::decompress(data, expected)
            .map_err(|e| Error::Decompression(format!("LZ4 block error: {}", e)))?
    };
    check_size(decompressed, expected)
}

/// Decompress a package block, choosing zlib when its header is present and
/// falling back to LZ4 otherwise
pub fn decompress_block(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    if is_zlib_stream(data) {
        inflate_exact(data, expected)
    } else {
        lz4_exact(data, expected)
    }
}

fn check_size(data: Vec<u8>, expected: usize) -> Result<Vec<u8>> {
    if data.len() > expected {
        return Err(Error::CorruptData(format!(
            "decompressed data exceeds the expected {} bytes",
            expected
        )));
    }
    if data.len() < expected {
        return Err(Error::CorruptData(format!(
            "decompressed to {} bytes, expected {}",
            data.len(),
            expected
        )));
    }
    Ok(data)
}

#[cfg(test)]
pub(crate) fn zlib(data: &[u8]) -> Vec<u8> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_zlib_stream() {
        assert!(is_zlib_stream(&[0x78, 0x9C]));
        assert!(is_zlib_stream(&[0x78, 0xDA]));
        assert!(is_zlib_stream(&[0x78, 0x01]));
        assert!(!is_zlib_stream(&[0x04, 0x22, 0x4D, 0x18]));
        assert!(!is_zlib_stream(&[0x78]));
    }

    #[test]
    fn test_inflate_exact() {
        let packed = zlib(b"hello hello hello");
        assert_eq!(inflate_exact(&packed, 17).unwrap(), b"hello hello hello");
        assert!(matches!(inflate_exact(&packed, 16), Err(Error::CorruptData(_))));
        assert!(matches!(inflate_exact(&packed, 20), Err(Error::CorruptData(_))));
    }

    #[test]
    fn test_decompress_block_lz4_fallback() {
        let data = b"abcabcabcabcabcabcabc".to_vec();
        let block = lz4_flex::block::compress(&data);
        assert_eq!(decompress_block(&block, data.len()).unwrap(), data);

        let mut framed = Vec::new();
        {
            use std::io::Write;
            let mut encoder = lz4_flex::frame::FrameEncoder::new(&mut framed);
            encoder.write_all(&data).unwrap();
            encoder.finish().unwrap();
        }
        assert!(is_lz4_frame(&framed));
        assert_eq!(decompress_block(&framed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_decompress_block_size_mismatch() {
        let data = b"0123456789".to_vec();
        let block = lz4_flex::block::compress(&data);
        assert!(decompress_block(&block, 12).is_err());
    }

    #[test]
    fn test_implausible_expected_size_is_corrupt() {
        let block = lz4_flex::block::compress(b"0123456789");
        assert!(matches!(
            lz4_exact(&block, u32::MAX as usize),
            Err(Error::CorruptData(_))
        ));
        assert!(matches!(
            inflate_exact(&zlib(b"0123456789"), u32::MAX as usize),
            Err(Error::CorruptData(_))
        ));
    }
}

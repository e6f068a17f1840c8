//! Zlib compression for frames above the negotiated threshold.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::ProtoError;

/// Compress a frame payload.
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>, ProtoError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder
        .write_all(data)
        .map_err(|e| ProtoError::CompressError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| ProtoError::CompressError(e.to_string()))
}

/// Decompress a frame payload whose uncompressed size is announced up front.
pub fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>, ProtoError> {
    let mut output = Vec::with_capacity(expected_len);
    ZlibDecoder::new(data)
        .read_to_end(&mut output)
        .map_err(|e| ProtoError::DecompressError(e.to_string()))?;
    if output.len() != expected_len {
        return Err(ProtoError::DecompressError(format!(
            "announced {expected_len} bytes, inflated {}",
            output.len()
        )));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zlib_roundtrip() {
        let data = b"Hello, Overworld! This is a test of zlib compression.".repeat(8);
        let compressed = compress(&data, 6).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(decompress(&compressed, data.len()).unwrap(), data);
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let compressed = compress(b"abc", 6).unwrap();
        assert!(matches!(
            decompress(&compressed, 4),
            Err(ProtoError::DecompressError(_))
        ));
    }

    #[test]
    fn garbage_input_is_an_error() {
        assert!(decompress(&[0x01, 0x02, 0x03], 3).is_err());
    }
}

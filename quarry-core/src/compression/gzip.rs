//! Gzip block compression
//!
//! Compressed blocks store the uncompressed length up front, so the reader
//! sizes its buffer once and can tell a short stream from a complete one.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Compression level (0-9 for gzip)
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CompressionLevel(pub u32);

impl CompressionLevel {
    /// Fastest compression (level 1)
    pub const FAST: Self = Self(1);
    /// Default compression (level 6)
    pub const DEFAULT: Self = Self(6);
    /// Best compression (level 9)
    pub const BEST: Self = Self(9);
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Compress data into a gzip stream
pub fn compress(data: &[u8], level: CompressionLevel) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::new(level.0));
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decompress a gzip stream that is known to expand to `expected_len` bytes.
///
/// A stream that ends early yields `UnexpectedEof`.
pub fn decompress(data: &[u8], expected_len: usize) -> io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut output = vec![0u8; expected_len];
    decoder.read_exact(&mut output)?;
    Ok(output)
}

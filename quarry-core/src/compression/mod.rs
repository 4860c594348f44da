//! Integer and block codecs
//!
//! - [`vbyte`]: terminal-bit variable-byte integers, the base of every
//!   number in a posting list
//! - [`buffer`]: growable buffers of encoded values
//! - [`gzip`]: optional compression of block value regions
//!
//! # Usage
//!
//! ```rust
//! use quarry_core::compression::{CompressedByteBuffer, decode_vbyte};
//!
//! let mut buf = CompressedByteBuffer::new();
//! buf.add(300);
//! let mut pos = 0;
//! assert_eq!(decode_vbyte(buf.as_slice(), &mut pos).unwrap(), 300);
//! ```

mod buffer;
mod gzip;
mod vbyte;

pub use self::buffer::{CompressedByteBuffer, ThresholdWriter};
pub use self::gzip::{CompressionLevel, compress, decompress};
pub use self::vbyte::{
    MAX_VBYTE_LEN, decode_vbyte, encode_vbyte, read_vbyte, vbyte_len, write_vbyte,
};

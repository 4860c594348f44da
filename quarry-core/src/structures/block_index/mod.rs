//! Block index files: sorted byte keys mapped to byte values
//!
//! Keys are grouped into blocks of roughly `block_size` value bytes. Each
//! block front-codes its keys and stores its values either raw or as one
//! gzip stream. A vocabulary of block first-keys sits at the end of the file,
//! followed by a JSON [`Manifest`] and a fixed-size footer.
//!
//! Lookups binary-search the vocabulary and then scan one block header.
//! Values are only read (and decompressed) when asked for.

mod format;
mod manifest;
mod reader;
mod writer;

use serde::{Deserialize, Serialize};

use crate::compression::CompressionLevel;

pub use format::{
    BLOCK_INDEX_MAGIC, BlockHeader, DEFAULT_BLOCK_SIZE, DEFAULT_VOCAB_GROUP, FOOTER_BYTES, Footer,
    MAX_KEY_LEN, common_prefix_len,
};
pub use manifest::Manifest;
pub use reader::{BlockIndexReader, KeyIterator};
pub use writer::{BlockIndexWriter, GenericElement, IndexElement};

/// Block index writer configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockIndexConfig {
    /// Target accumulated value bytes per block
    pub block_size: usize,
    /// Keys per front-coding group
    pub vocab_group: usize,
    /// Gzip each block's value region
    pub compressed: bool,
    pub compression_level: CompressionLevel,
}

impl Default for BlockIndexConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            vocab_group: DEFAULT_VOCAB_GROUP,
            compressed: false,
            compression_level: CompressionLevel::default(),
        }
    }
}

impl BlockIndexConfig {
    /// Default layout with gzip-compressed value regions
    pub fn compressed() -> Self {
        Self {
            compressed: true,
            ..Self::default()
        }
    }
}

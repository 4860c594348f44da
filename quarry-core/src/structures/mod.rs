//! On-disk structures
//!
//! - [`block_index`]: sorted key/value files with front-coded key blocks
//! - [`postings`]: the per-term inverted list layout stored as block index values

pub mod block_index;
mod owned_bytes;
pub mod postings;

pub use block_index::{
    BlockIndexConfig, BlockIndexReader, BlockIndexWriter, GenericElement, IndexElement,
    KeyIterator, Manifest,
};
pub use owned_bytes::OwnedBytes;
pub use postings::{
    CountPostingIterator, Extent, ExtentArray, ExtentPostingIterator, PositionIndexReader,
    PositionIndexWriter, PostingHeader, PostingListBuffer, PostingRecordIterator,
    PostingWriterConfig, TERMINATED, TermPosting,
};

//! Quarry - block-structured inverted index storage and query evaluation
//!
//! This library provides:
//! - Variable-byte integer coding and gzip-compressed blocks
//! - A sorted key/value block index file with a prefix-compressed vocabulary
//! - Posting lists with counts, positions and a two-tier skip table
//! - A document-ordered iterator algebra: windows, containment, synonyms,
//!   weighted score combinations and boolean indicators
//! - Max-score top-k evaluation seeded from precomputed top documents
//! - An operator registry that builds iterator trees from parsed queries

pub mod compression;
pub mod error;
pub mod index;
pub mod query;
pub mod structures;

/// Document identifier
pub type DocId = u64;

/// Retrieval score
pub type Score = f64;

pub use error::{Error, Result};

// Re-exports from structures
pub use structures::{
    BlockIndexConfig, BlockIndexReader, BlockIndexWriter, ExtentArray, Manifest,
    PositionIndexReader, PositionIndexWriter, PostingWriterConfig, TERMINATED, TermPosting,
};

// Re-exports from index
pub use index::{CollectionStatistics, Index, IndexBuilder, IndexBuilderConfig, TermStatistics};

// Re-exports from query
pub use query::{
    IteratorFactory, MaxScoreCombination, Node, QueryNode, RetrievalConfig, ScoredDocument,
    SortPolicy, TopKAccumulator, search,
};

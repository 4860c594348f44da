//! Index directory
//!
//! An index is a directory of block index parts:
//! - `postings`: term → posting list
//! - `lengths`: document id → document length
//! - `topdocs` (optional): term → documents with the highest term frequency
//!
//! [`IndexBuilder`] writes the parts in one pass; [`Index`] opens them for
//! querying.

mod builder;
mod lengths;
mod topdocs;

#[cfg(test)]
mod tests;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub use builder::{IndexBuilder, IndexBuilderConfig};
pub use lengths::{LengthSource, LengthsReader, LengthsWriter};
pub use topdocs::{TopDocsReader, TopDocsWriter, select_top_documents};

use crate::structures::{
    CountPostingIterator, ExtentPostingIterator, Manifest, PositionIndexReader, PostingRecordIterator,
};
use crate::{DocId, Result};

pub const POSTINGS_PART: &str = "postings";
pub const LENGTHS_PART: &str = "lengths";
pub const TOPDOCS_PART: &str = "topdocs";

/// Per-term statistics used by scoring functions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TermStatistics {
    /// Documents containing the term
    pub document_frequency: u64,
    /// Occurrences across the collection
    pub collection_frequency: u64,
    /// Highest count in a single document
    pub max_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollectionStatistics {
    pub document_count: u64,
    pub collection_length: u64,
    pub max_length: u64,
    pub min_length: u64,
}

impl CollectionStatistics {
    pub fn average_length(&self) -> f64 {
        if self.document_count == 0 {
            0.0
        } else {
            self.collection_length as f64 / self.document_count as f64
        }
    }
}

/// Opened index directory.
///
/// Holds one file handle per part; not meant to be shared across threads.
/// Callers that need independent length lookups get their own handle
/// through [`open_lengths`](Self::open_lengths).
pub struct Index {
    directory: PathBuf,
    postings: PositionIndexReader<BufReader<File>>,
    topdocs: Option<TopDocsReader<BufReader<File>>>,
    collection: CollectionStatistics,
    lengths_manifest: Manifest,
}

impl Index {
    pub fn open(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        let postings = PositionIndexReader::open_path(directory.join(POSTINGS_PART))?;
        let lengths = LengthsReader::open_path(directory.join(LENGTHS_PART))?;
        let topdocs_path = directory.join(TOPDOCS_PART);
        let topdocs = if topdocs_path.exists() {
            Some(TopDocsReader::open_path(topdocs_path)?)
        } else {
            None
        };

        let manifest = lengths.manifest();
        let collection = CollectionStatistics {
            document_count: manifest.get_u64("documentCount").unwrap_or(0),
            collection_length: manifest.get_u64("collectionLength").unwrap_or(0),
            max_length: manifest.get_u64("maxLength").unwrap_or(0),
            min_length: manifest.get_u64("minLength").unwrap_or(0),
        };
        log::debug!(
            "opened index {:?}: {} terms, {} documents, topdocs {}",
            directory,
            postings.term_count(),
            collection.document_count,
            topdocs.is_some()
        );
        Ok(Self {
            directory,
            postings,
            topdocs,
            collection,
            lengths_manifest: manifest.clone(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn postings_manifest(&self) -> &Manifest {
        self.postings.manifest()
    }

    pub fn lengths_manifest(&self) -> &Manifest {
        &self.lengths_manifest
    }

    pub fn has_top_documents(&self) -> bool {
        self.topdocs.is_some()
    }

    pub fn extent_iterator(&mut self, term: &[u8]) -> Result<Option<ExtentPostingIterator>> {
        self.postings.extent_iterator(term)
    }

    pub fn count_iterator(&mut self, term: &[u8]) -> Result<Option<CountPostingIterator>> {
        self.postings.count_iterator(term)
    }

    /// Statistics of `term`; all zero when the term is absent
    pub fn term_statistics(&mut self, term: &[u8]) -> Result<TermStatistics> {
        Ok(match self.postings.term_header(term)? {
            Some(header) => TermStatistics {
                document_frequency: header.document_count,
                collection_frequency: header.total_position_count,
                max_count: header.max_count.unwrap_or(header.total_position_count),
            },
            None => TermStatistics::default(),
        })
    }

    pub fn collection_statistics(&self) -> CollectionStatistics {
        self.collection
    }

    pub fn top_documents(&mut self, term: &[u8]) -> Result<Option<Vec<DocId>>> {
        match self.topdocs.as_mut() {
            Some(topdocs) => topdocs.get(term),
            None => Ok(None),
        }
    }

    /// Fresh handle on the lengths part
    pub fn open_lengths(&self) -> Result<LengthsReader<BufReader<File>>> {
        LengthsReader::open_path(self.directory.join(LENGTHS_PART))
    }

    /// Walk every posting list in term order
    pub fn postings_scan(&mut self) -> Result<PostingRecordIterator<'_, BufReader<File>>> {
        self.postings.records()
    }
}

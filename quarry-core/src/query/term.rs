//! Leaf iterators over stored posting lists

use super::traits::{CountIterator, DocIterator, ExtentIterator, ScoringContext};
use crate::index::TermStatistics;
use crate::structures::{CountPostingIterator, ExtentArray, ExtentPostingIterator, PostingHeader};
use crate::{DocId, Result};

fn header_statistics(header: &PostingHeader) -> TermStatistics {
    TermStatistics {
        document_frequency: header.document_count,
        collection_frequency: header.total_position_count,
        max_count: header.max_count.unwrap_or(header.total_position_count),
    }
}

/// Term leaf with positions
pub struct TermExtentIterator {
    postings: ExtentPostingIterator,
    empty: ExtentArray,
}

impl TermExtentIterator {
    pub fn new(postings: ExtentPostingIterator) -> Self {
        Self {
            postings,
            empty: ExtentArray::new(),
        }
    }
}

impl DocIterator for TermExtentIterator {
    fn current_candidate(&self) -> DocId {
        self.postings.document()
    }

    fn move_to(&mut self, document: DocId) -> Result<()> {
        self.postings.skip_to(document)
    }

    fn reset(&mut self) -> Result<()> {
        self.postings.reset()
    }

    fn total_entries(&self) -> u64 {
        self.postings.total_entries()
    }
}

impl CountIterator for TermExtentIterator {
    fn count(&mut self, ctx: &ScoringContext) -> Result<u32> {
        Ok(if self.has_match(ctx.document) {
            self.postings.count()
        } else {
            0
        })
    }

    fn max_count(&self) -> u64 {
        self.postings.max_count()
    }

    fn statistics(&self) -> Option<TermStatistics> {
        Some(header_statistics(self.postings.header()))
    }

    fn term(&self) -> Option<&[u8]> {
        Some(self.postings.key())
    }
}

impl ExtentIterator for TermExtentIterator {
    fn extents(&mut self, ctx: &ScoringContext) -> Result<&ExtentArray> {
        if self.has_match(ctx.document) {
            self.postings.extents()
        } else {
            self.empty.reset(ctx.document);
            Ok(&self.empty)
        }
    }
}

/// Term leaf reading documents and counts only
pub struct TermCountIterator {
    postings: CountPostingIterator,
}

impl TermCountIterator {
    pub fn new(postings: CountPostingIterator) -> Self {
        Self { postings }
    }
}

impl DocIterator for TermCountIterator {
    fn current_candidate(&self) -> DocId {
        self.postings.document()
    }

    fn move_to(&mut self, document: DocId) -> Result<()> {
        self.postings.skip_to(document)
    }

    fn reset(&mut self) -> Result<()> {
        self.postings.reset()
    }

    fn total_entries(&self) -> u64 {
        self.postings.total_entries()
    }
}

impl CountIterator for TermCountIterator {
    fn count(&mut self, ctx: &ScoringContext) -> Result<u32> {
        Ok(if self.has_match(ctx.document) {
            self.postings.count()
        } else {
            0
        })
    }

    fn max_count(&self) -> u64 {
        self.postings.max_count()
    }

    fn statistics(&self) -> Option<TermStatistics> {
        Some(header_statistics(self.postings.header()))
    }

    fn term(&self) -> Option<&[u8]> {
        Some(self.postings.key())
    }
}

/// Stand-in for a term missing from the index
pub struct NullIterator {
    term: Vec<u8>,
    empty: ExtentArray,
}

impl NullIterator {
    pub fn new(term: impl Into<Vec<u8>>) -> Self {
        Self {
            term: term.into(),
            empty: ExtentArray::new(),
        }
    }
}

impl DocIterator for NullIterator {
    fn current_candidate(&self) -> DocId {
        crate::structures::TERMINATED
    }

    fn move_to(&mut self, _document: DocId) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn total_entries(&self) -> u64 {
        0
    }
}

impl CountIterator for NullIterator {
    fn count(&mut self, _ctx: &ScoringContext) -> Result<u32> {
        Ok(0)
    }

    fn max_count(&self) -> u64 {
        0
    }

    fn statistics(&self) -> Option<TermStatistics> {
        Some(TermStatistics::default())
    }

    fn term(&self) -> Option<&[u8]> {
        Some(&self.term)
    }
}

impl ExtentIterator for NullIterator {
    fn extents(&mut self, ctx: &ScoringContext) -> Result<&ExtentArray> {
        self.empty.reset(ctx.document);
        Ok(&self.empty)
    }
}

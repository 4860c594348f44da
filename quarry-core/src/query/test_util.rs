//! In-memory iterators for query tests

use std::cell::Cell;
use std::rc::Rc;

use super::traits::{
    CountIterator, DocIterator, ExtentIterator, ScoreIterator, ScoringContext,
};
use crate::structures::{ExtentArray, TERMINATED};
use crate::{DocId, Result, Score};

/// Extent iterator over `(document, positions)` pairs
pub struct ListIterator {
    entries: Vec<(DocId, Vec<u32>)>,
    index: usize,
    extents: ExtentArray,
}

impl ListIterator {
    pub fn new(entries: Vec<(DocId, Vec<u32>)>) -> Self {
        Self {
            entries,
            index: 0,
            extents: ExtentArray::new(),
        }
    }

    /// One position per document
    pub fn documents(documents: &[DocId]) -> Self {
        Self::new(documents.iter().map(|&d| (d, vec![0])).collect())
    }

    pub fn boxed(self) -> Box<dyn ExtentIterator> {
        Box::new(self)
    }
}

impl DocIterator for ListIterator {
    fn current_candidate(&self) -> DocId {
        self.entries.get(self.index).map_or(TERMINATED, |e| e.0)
    }

    fn move_to(&mut self, document: DocId) -> Result<()> {
        while self.index < self.entries.len() && self.entries[self.index].0 < document {
            self.index += 1;
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.index = 0;
        Ok(())
    }

    fn total_entries(&self) -> u64 {
        self.entries.len() as u64
    }
}

impl CountIterator for ListIterator {
    fn count(&mut self, ctx: &ScoringContext) -> Result<u32> {
        Ok(if self.has_match(ctx.document) {
            self.entries[self.index].1.len() as u32
        } else {
            0
        })
    }

    fn max_count(&self) -> u64 {
        self.entries.iter().map(|e| e.1.len() as u64).max().unwrap_or(0)
    }
}

impl ExtentIterator for ListIterator {
    fn extents(&mut self, ctx: &ScoringContext) -> Result<&ExtentArray> {
        self.extents.reset(ctx.document);
        if self.has_match(ctx.document) {
            for &p in &self.entries[self.index].1 {
                self.extents.push(p, p + 1);
            }
        }
        Ok(&self.extents)
    }
}

/// Score iterator with fixed per-document scores and a call counter
pub struct FixedScorer {
    entries: Vec<(DocId, Score)>,
    index: usize,
    max: Score,
    min: Score,
    top: Option<Vec<DocId>>,
    pub calls: Rc<Cell<usize>>,
}

impl FixedScorer {
    pub fn new(entries: Vec<(DocId, Score)>, max: Score, min: Score) -> Self {
        Self {
            entries,
            index: 0,
            max,
            min,
            top: None,
            calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn with_top_documents(mut self, top: Vec<DocId>) -> Self {
        self.top = Some(top);
        self
    }
}

impl DocIterator for FixedScorer {
    fn current_candidate(&self) -> DocId {
        self.entries.get(self.index).map_or(TERMINATED, |e| e.0)
    }

    fn move_to(&mut self, document: DocId) -> Result<()> {
        while self.index < self.entries.len() && self.entries[self.index].0 < document {
            self.index += 1;
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.index = 0;
        Ok(())
    }

    fn total_entries(&self) -> u64 {
        self.entries.len() as u64
    }
}

impl ScoreIterator for FixedScorer {
    fn score(&mut self, ctx: &ScoringContext) -> Result<Score> {
        self.calls.set(self.calls.get() + 1);
        Ok(if self.has_match(ctx.document) {
            self.entries[self.index].1
        } else {
            self.min
        })
    }

    fn max_score(&self) -> Score {
        self.max
    }

    fn min_score(&self) -> Score {
        self.min
    }

    fn top_documents(&self) -> Option<&[DocId]> {
        self.top.as_deref()
    }
}

/// Drain an iterator's candidates
pub fn candidates<I: DocIterator + ?Sized>(iterator: &mut I) -> Vec<DocId> {
    let mut out = Vec::new();
    while !iterator.is_done() {
        let document = iterator.current_candidate();
        out.push(document);
        iterator.move_past(document).unwrap();
    }
    out
}

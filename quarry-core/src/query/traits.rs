//! Iterator capabilities
//!
//! Every node of an evaluation tree is a [`DocIterator`]: a forward-only
//! cursor over candidate documents. Families add what they can compute at
//! a document: counts, extents, scores, or a boolean indicator. The
//! document being evaluated always arrives as a [`ScoringContext`]
//! argument; no node keeps a shared "current document".

use crate::index::TermStatistics;
use crate::structures::{ExtentArray, TERMINATED};
use crate::{DocId, Result, Score};

/// Document under evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringContext {
    pub document: DocId,
    pub length: u32,
}

impl ScoringContext {
    pub fn new(document: DocId, length: u32) -> Self {
        Self { document, length }
    }
}

/// Document-ordered cursor shared by every iterator family
pub trait DocIterator {
    /// Current candidate, or [`TERMINATED`] once exhausted
    fn current_candidate(&self) -> DocId;

    fn is_done(&self) -> bool {
        self.current_candidate() == TERMINATED
    }

    fn has_match(&self, document: DocId) -> bool {
        document != TERMINATED && self.current_candidate() == document
    }

    /// Advance to the first candidate `>= document`; never moves backwards
    fn move_to(&mut self, document: DocId) -> Result<()>;

    /// Advance to the first candidate `> document`
    fn move_past(&mut self, document: DocId) -> Result<()> {
        self.move_to(document.saturating_add(1))
    }

    fn reset(&mut self) -> Result<()>;

    /// Cost estimate: number of candidates over a full pass
    fn total_entries(&self) -> u64;
}

pub trait CountIterator: DocIterator {
    /// Occurrences at `ctx.document`; 0 when the iterator does not match it
    fn count(&mut self, ctx: &ScoringContext) -> Result<u32>;

    /// Upper bound of [`count`](Self::count)
    fn max_count(&self) -> u64;

    /// Stored statistics, when the iterator reads a single term
    fn statistics(&self) -> Option<TermStatistics> {
        None
    }

    /// Term key, when the iterator reads a single term
    fn term(&self) -> Option<&[u8]> {
        None
    }
}

pub trait ExtentIterator: CountIterator {
    /// Extents at `ctx.document`; empty when the iterator does not match it
    fn extents(&mut self, ctx: &ScoringContext) -> Result<&ExtentArray>;
}

pub trait ScoreIterator: DocIterator {
    fn score(&mut self, ctx: &ScoringContext) -> Result<Score>;

    /// Upper bound of [`score`](Self::score) over every document
    fn max_score(&self) -> Score;

    /// Score of a document this iterator does not match. Also an upper
    /// bound for every such document.
    fn min_score(&self) -> Score;

    /// Precomputed high-scoring documents, ascending
    fn top_documents(&self) -> Option<&[DocId]> {
        None
    }
}

pub trait IndicatorIterator: DocIterator {
    fn indicator(&mut self, ctx: &ScoringContext) -> Result<bool>;
}

impl<T: DocIterator + ?Sized> DocIterator for Box<T> {
    #[inline]
    fn current_candidate(&self) -> DocId {
        (**self).current_candidate()
    }
    #[inline]
    fn is_done(&self) -> bool {
        (**self).is_done()
    }
    #[inline]
    fn has_match(&self, document: DocId) -> bool {
        (**self).has_match(document)
    }
    #[inline]
    fn move_to(&mut self, document: DocId) -> Result<()> {
        (**self).move_to(document)
    }
    #[inline]
    fn move_past(&mut self, document: DocId) -> Result<()> {
        (**self).move_past(document)
    }
    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }
    fn total_entries(&self) -> u64 {
        (**self).total_entries()
    }
}

impl<T: CountIterator + ?Sized> CountIterator for Box<T> {
    #[inline]
    fn count(&mut self, ctx: &ScoringContext) -> Result<u32> {
        (**self).count(ctx)
    }
    fn max_count(&self) -> u64 {
        (**self).max_count()
    }
    fn statistics(&self) -> Option<TermStatistics> {
        (**self).statistics()
    }
    fn term(&self) -> Option<&[u8]> {
        (**self).term()
    }
}

impl<T: ExtentIterator + ?Sized> ExtentIterator for Box<T> {
    #[inline]
    fn extents(&mut self, ctx: &ScoringContext) -> Result<&ExtentArray> {
        (**self).extents(ctx)
    }
}

impl<T: ScoreIterator + ?Sized> ScoreIterator for Box<T> {
    #[inline]
    fn score(&mut self, ctx: &ScoringContext) -> Result<Score> {
        (**self).score(ctx)
    }
    fn max_score(&self) -> Score {
        (**self).max_score()
    }
    fn min_score(&self) -> Score {
        (**self).min_score()
    }
    fn top_documents(&self) -> Option<&[DocId]> {
        (**self).top_documents()
    }
}

impl<T: IndicatorIterator + ?Sized> IndicatorIterator for Box<T> {
    fn indicator(&mut self, ctx: &ScoringContext) -> Result<bool> {
        (**self).indicator(ctx)
    }
}

/// Candidate of the child furthest behind
pub(crate) fn min_candidate<C: DocIterator>(children: &[C]) -> DocId {
    children
        .iter()
        .map(|c| c.current_candidate())
        .min()
        .unwrap_or(TERMINATED)
}

/// Move every child to the first document `>= target` they all share.
/// Returns [`TERMINATED`] once any child runs out.
pub(crate) fn align<C: DocIterator>(children: &mut [C], target: DocId) -> Result<DocId> {
    if children.is_empty() {
        return Ok(TERMINATED);
    }
    let mut candidate = target;
    loop {
        let mut agreed = true;
        for child in children.iter_mut() {
            child.move_to(candidate)?;
            let current = child.current_candidate();
            if current == TERMINATED {
                return Ok(TERMINATED);
            }
            if current != candidate {
                candidate = current;
                agreed = false;
            }
        }
        if agreed {
            return Ok(candidate);
        }
    }
}

/// `Σ wᵢ·sᵢ` in child order.
///
/// Every combination sums through here so that scores computed along
/// different paths agree bit for bit.
#[inline]
pub(crate) fn weighted_sum(weights: &[f64], scores: &[f64]) -> f64 {
    let mut sum = 0.0;
    for (weight, score) in weights.iter().zip(scores) {
        sum += weight * score;
    }
    sum
}

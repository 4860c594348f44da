//! Top-k result accumulation

use std::cmp::Ordering;
use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{DocId, Score};

/// A document and its final score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: DocId,
    pub score: Score,
}

impl ScoredDocument {
    pub fn new(document: DocId, score: Score) -> Self {
        Self { document, score }
    }
}

/// Result order: score descending, then document ascending
#[derive(Debug, Clone, Copy)]
struct Ranked(ScoredDocument);

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .score
            .total_cmp(&self.0.score)
            .then_with(|| self.0.document.cmp(&other.0.document))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Bounded set of the best `requested` documents.
///
/// Offering a document that is already held replaces its score. Among
/// equal scores the lower document id ranks first, which under
/// document-ordered evaluation is the earliest inserted.
#[derive(Debug, Clone)]
pub struct TopKAccumulator {
    requested: usize,
    ranked: BTreeSet<Ranked>,
    scores: FxHashMap<DocId, Score>,
}

impl TopKAccumulator {
    pub fn new(requested: usize) -> Self {
        Self {
            requested,
            ranked: BTreeSet::new(),
            scores: FxHashMap::default(),
        }
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.requested > 0 && self.ranked.len() >= self.requested
    }

    /// Score of the current k-th best; `None` until `requested` are held
    pub fn threshold(&self) -> Option<Score> {
        if !self.is_full() {
            return None;
        }
        self.ranked.last().map(|r| r.0.score)
    }

    /// Insert or rescore `document`. Returns whether it is held afterwards.
    pub fn offer(&mut self, document: DocId, score: Score) -> bool {
        if self.requested == 0 {
            return false;
        }
        if let Some(previous) = self.scores.insert(document, score) {
            self.ranked
                .remove(&Ranked(ScoredDocument::new(document, previous)));
        }
        self.ranked.insert(Ranked(ScoredDocument::new(document, score)));
        if self.ranked.len() > self.requested {
            if let Some(evicted) = self.ranked.pop_last() {
                self.scores.remove(&evicted.0.document);
                return evicted.0.document != document;
            }
        }
        true
    }

    pub fn clear(&mut self) {
        self.ranked.clear();
        self.scores.clear();
    }

    /// Held documents, best first
    pub fn iter(&self) -> impl Iterator<Item = ScoredDocument> + '_ {
        self.ranked.iter().map(|r| r.0)
    }

    pub fn into_sorted_vec(self) -> Vec<ScoredDocument> {
        self.ranked.into_iter().map(|r| r.0).collect()
    }
}

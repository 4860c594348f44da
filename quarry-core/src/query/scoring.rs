//! Scoring functions and the count-to-score adapter
//!
//! A [`ScoringFunction`] turns a term count and a document length into a
//! score, and reports the bounds max-score pruning relies on:
//! - `max_score`: no document scores higher
//! - `min_score`: the score of a document without the term, which is also
//!   the highest such a document can get

use serde::{Deserialize, Serialize};

use super::maxscore::SortPolicy;
use super::traits::{CountIterator, DocIterator, ScoreIterator, ScoringContext};
use crate::index::{CollectionStatistics, TermStatistics};
use crate::{DocId, Result, Score};

/// BM25 k1 parameter - controls term frequency saturation
pub const BM25_K1: f64 = 1.2;

/// BM25 b parameter - controls length normalization
pub const BM25_B: f64 = 0.75;

/// Dirichlet smoothing parameter
pub const DIRICHLET_MU: f64 = 1500.0;

pub trait ScoringFunction {
    fn score(&self, count: u32, length: u32) -> Score;
    fn max_score(&self) -> Score;
    fn min_score(&self) -> Score;
}

/// BM25 IDF, always positive
#[inline]
pub fn bm25_idf(document_frequency: f64, document_count: f64) -> f64 {
    ((document_count - document_frequency + 0.5) / (document_frequency + 0.5) + 1.0).ln()
}

#[derive(Debug, Clone, Copy)]
pub struct Bm25Scorer {
    pub k1: f64,
    pub b: f64,
    pub idf: f64,
    pub average_length: f64,
    pub max_count: u64,
}

impl Bm25Scorer {
    pub fn new(k1: f64, b: f64, term: &TermStatistics, collection: &CollectionStatistics) -> Self {
        Self {
            k1,
            b,
            idf: bm25_idf(
                term.document_frequency as f64,
                collection.document_count as f64,
            ),
            average_length: collection.average_length(),
            max_count: term.max_count,
        }
    }

    #[inline]
    fn weigh(&self, tf: f64, length_norm: f64) -> f64 {
        self.idf * (tf * (self.k1 + 1.0)) / (tf + self.k1 * length_norm)
    }
}

impl ScoringFunction for Bm25Scorer {
    fn score(&self, count: u32, length: u32) -> Score {
        if count == 0 {
            return 0.0;
        }
        let length_norm =
            1.0 - self.b + self.b * (length as f64 / self.average_length.max(1.0));
        self.weigh(count as f64, length_norm)
    }

    /// Maximum count at the shortest possible length
    fn max_score(&self) -> Score {
        if self.max_count == 0 {
            return 0.0;
        }
        self.weigh(self.max_count as f64, 1.0 - self.b)
    }

    fn min_score(&self) -> Score {
        0.0
    }
}

/// Query likelihood with Dirichlet smoothing
#[derive(Debug, Clone, Copy)]
pub struct DirichletScorer {
    pub mu: f64,
    /// Collection probability of the term
    pub background: f64,
    pub max_count: u64,
}

impl DirichletScorer {
    pub fn new(mu: f64, term: &TermStatistics, collection: &CollectionStatistics) -> Self {
        let length = collection.collection_length.max(1) as f64;
        // unseen terms get half an occurrence
        let frequency = (term.collection_frequency as f64).max(0.5);
        Self {
            mu,
            background: frequency / length,
            max_count: term.max_count,
        }
    }
}

impl ScoringFunction for DirichletScorer {
    /// Lengths shorter than the count (a document missing from the lengths
    /// part reads as 0) are raised to the count
    fn score(&self, count: u32, length: u32) -> Score {
        let length = length.max(count);
        ((count as f64 + self.mu * self.background) / (length as f64 + self.mu)).ln()
    }

    /// Maximum count in a document no longer than that count
    fn max_score(&self) -> Score {
        let tf = self.max_count as f64;
        ((tf + self.mu * self.background) / (tf + self.mu)).ln()
    }

    /// A missing term scores highest in an empty document
    fn min_score(&self) -> Score {
        self.background.ln()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerKind {
    #[default]
    Bm25,
    Dirichlet,
}

impl ScorerKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bm25" => Some(Self::Bm25),
            "dirichlet" => Some(Self::Dirichlet),
            _ => None,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Results returned
    pub requested: usize,
    /// Scorer wrapped around bare term children of score combinations
    pub scorer: ScorerKind,
    pub bm25_k1: f64,
    pub bm25_b: f64,
    pub mu: f64,
    pub max_score_sort: SortPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            requested: 10,
            scorer: ScorerKind::Bm25,
            bm25_k1: BM25_K1,
            bm25_b: BM25_B,
            mu: DIRICHLET_MU,
            max_score_sort: SortPolicy::Cost,
        }
    }
}

/// Score iterator over a count child
pub struct ScoringFunctionIterator {
    child: Box<dyn CountIterator>,
    function: Box<dyn ScoringFunction>,
    top_documents: Option<Vec<DocId>>,
}

impl ScoringFunctionIterator {
    pub fn new(child: Box<dyn CountIterator>, function: Box<dyn ScoringFunction>) -> Self {
        Self {
            child,
            function,
            top_documents: None,
        }
    }

    pub fn with_top_documents(mut self, documents: Vec<DocId>) -> Self {
        self.top_documents = Some(documents);
        self
    }
}

impl DocIterator for ScoringFunctionIterator {
    fn current_candidate(&self) -> DocId {
        self.child.current_candidate()
    }

    fn move_to(&mut self, document: DocId) -> Result<()> {
        self.child.move_to(document)
    }

    fn reset(&mut self) -> Result<()> {
        self.child.reset()
    }

    fn total_entries(&self) -> u64 {
        self.child.total_entries()
    }
}

impl ScoreIterator for ScoringFunctionIterator {
    fn score(&mut self, ctx: &ScoringContext) -> Result<Score> {
        let count = self.child.count(ctx)?;
        Ok(self.function.score(count, ctx.length))
    }

    fn max_score(&self) -> Score {
        self.function.max_score()
    }

    fn min_score(&self) -> Score {
        self.function.min_score()
    }

    fn top_documents(&self) -> Option<&[DocId]> {
        self.top_documents.as_deref()
    }
}

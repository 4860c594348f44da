//! Weighted score combinations: `#combine` and `#and`

use super::traits::{
    DocIterator, ScoreIterator, ScoringContext, align, min_candidate, weighted_sum,
};
use crate::structures::TERMINATED;
use crate::{DocId, Error, Result, Score};

/// Check weights and return their sum
pub(crate) fn total_weight(weights: &[f64], children: usize) -> Result<f64> {
    if weights.len() != children {
        return Err(Error::Query(format!(
            "{} weights for {} children",
            weights.len(),
            children
        )));
    }
    if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(Error::Query(format!("invalid weight {}", w)));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(Error::Query("weights sum to zero".into()));
    }
    Ok(total)
}

/// `Σ wᵢ·scoreᵢ / Σ wᵢ` over score children.
///
/// Unfiltered: candidate is the smallest child candidate, so any matching
/// child is enough. Filtered: every child must match.
pub struct ScoreCombination {
    children: Vec<Box<dyn ScoreIterator>>,
    weights: Vec<f64>,
    total_weight: f64,
    filtered: bool,
    document: DocId,
    scores: Vec<Score>,
}

impl ScoreCombination {
    pub fn new(
        children: Vec<Box<dyn ScoreIterator>>,
        weights: Vec<f64>,
        filtered: bool,
    ) -> Result<Self> {
        let total_weight = total_weight(&weights, children.len())?;
        let mut combination = Self {
            scores: vec![0.0; children.len()],
            children,
            weights,
            total_weight,
            filtered,
            document: 0,
        };
        combination.position(0)?;
        Ok(combination)
    }

    pub fn unfiltered(children: Vec<Box<dyn ScoreIterator>>, weights: Vec<f64>) -> Result<Self> {
        Self::new(children, weights, false)
    }

    pub fn filtered(children: Vec<Box<dyn ScoreIterator>>, weights: Vec<f64>) -> Result<Self> {
        Self::new(children, weights, true)
    }

    fn position(&mut self, target: DocId) -> Result<()> {
        if self.filtered {
            self.document = align(&mut self.children, target)?;
        } else {
            for child in self.children.iter_mut() {
                child.move_to(target)?;
            }
            self.document = min_candidate(&self.children);
        }
        Ok(())
    }
}

impl DocIterator for ScoreCombination {
    fn current_candidate(&self) -> DocId {
        self.document
    }

    fn move_to(&mut self, document: DocId) -> Result<()> {
        if self.document != TERMINATED && document > self.document {
            self.position(document)?;
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        for child in self.children.iter_mut() {
            child.reset()?;
        }
        self.position(0)
    }

    fn total_entries(&self) -> u64 {
        let entries = self.children.iter().map(|c| c.total_entries());
        if self.filtered {
            entries.min().unwrap_or(0)
        } else {
            entries.sum()
        }
    }
}

impl ScoreIterator for ScoreCombination {
    fn score(&mut self, ctx: &ScoringContext) -> Result<Score> {
        for (child, score) in self.children.iter_mut().zip(self.scores.iter_mut()) {
            *score = child.score(ctx)?;
        }
        Ok(weighted_sum(&self.weights, &self.scores) / self.total_weight)
    }

    fn max_score(&self) -> Score {
        let maxima: Vec<Score> = self.children.iter().map(|c| c.max_score()).collect();
        weighted_sum(&self.weights, &maxima) / self.total_weight
    }

    /// A filtered combination may skip documents where some children
    /// still score high, so only the maximum bounds them.
    fn min_score(&self) -> Score {
        if self.filtered {
            return self.max_score();
        }
        let minima: Vec<Score> = self.children.iter().map(|c| c.min_score()).collect();
        weighted_sum(&self.weights, &minima) / self.total_weight
    }
}

//! Max-score top-k evaluation
//!
//! A weighted combination that knows the evaluation is top-k. Children are
//! ordered by a [`SortPolicy`]. Once the accumulator is full its threshold
//! decides two things:
//!
//! - **Quorum**: the shortest prefix of the sorted children such that a
//!   document matching none of them cannot reach the threshold. Only
//!   quorum children generate candidates.
//! - **Pruning**: a candidate's upper bound starts at `potential` (every
//!   child at its maximum) and is lowered child by child as real scores
//!   come in. Once it drops below the threshold the remaining children are
//!   never asked.
//!
//! Documents listed in the children's top documents are scored before the
//! scan starts, so the threshold is tight from the first candidate.
//! Results equal those of an exhaustive [`ScoreCombination`] over the same
//! children.
//!
//! [`ScoreCombination`]: super::combination::ScoreCombination

use serde::{Deserialize, Serialize};

use super::collector::{ScoredDocument, TopKAccumulator};
use super::combination::total_weight;
use super::traits::{DocIterator, ScoreIterator, ScoringContext, min_candidate, weighted_sum};
use crate::index::LengthSource;
use crate::structures::TERMINATED;
use crate::{DocId, Result, Score};

/// Slack on threshold comparisons, absorbing summation order differences
const EPSILON: f64 = 1e-10;

/// Order in which children join the quorum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortPolicy {
    /// Fewest candidates first
    #[default]
    Cost,
    /// Heaviest weight first
    Weight,
}

impl SortPolicy {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "cost" => Some(Self::Cost),
            "weight" => Some(Self::Weight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaxScoreStats {
    /// Top documents scored before the scan
    pub seeded: u64,
    pub candidates: u64,
    pub scored: u64,
    pub pruned: u64,
}

pub struct MaxScoreCombination {
    children: Vec<Box<dyn ScoreIterator>>,
    weights: Vec<f64>,
    total_weight: f64,
    /// Child indices in quorum order
    order: Vec<usize>,
    maxima: Vec<Score>,
    minima: Vec<Score>,
    /// `Σ wᵢ·maxᵢ`
    potential: Score,
    /// `Σ wᵢ·minᵢ`
    minimum: Score,
    top_documents: Vec<DocId>,

    requested: usize,
    quorum: usize,
    accumulator: TopKAccumulator,
    scores: Vec<Score>,
    document: DocId,
    stats: MaxScoreStats,
}

impl MaxScoreCombination {
    pub fn new(
        children: Vec<Box<dyn ScoreIterator>>,
        weights: Vec<f64>,
        requested: usize,
        sort: SortPolicy,
    ) -> Result<Self> {
        let total_weight = total_weight(&weights, children.len())?;
        let mut order: Vec<usize> = (0..children.len()).collect();
        match sort {
            SortPolicy::Cost => order.sort_by_key(|&i| children[i].total_entries()),
            SortPolicy::Weight => order.sort_by(|&a, &b| weights[b].total_cmp(&weights[a])),
        }
        let maxima: Vec<Score> = children.iter().map(|c| c.max_score()).collect();
        let minima: Vec<Score> = children.iter().map(|c| c.min_score()).collect();
        let potential = weighted_sum(&weights, &maxima);
        let minimum = weighted_sum(&weights, &minima);

        let mut top_documents: Vec<DocId> = children
            .iter()
            .filter_map(|c| c.top_documents())
            .flatten()
            .copied()
            .collect();
        top_documents.sort_unstable();
        top_documents.dedup();

        let document = min_candidate(&children);
        let quorum = children.len();
        Ok(Self {
            scores: vec![0.0; children.len()],
            children,
            weights,
            total_weight,
            order,
            maxima,
            minima,
            potential,
            minimum,
            top_documents,
            requested,
            quorum,
            accumulator: TopKAccumulator::new(requested),
            document,
            stats: MaxScoreStats::default(),
        })
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn stats(&self) -> MaxScoreStats {
        self.stats
    }

    /// Children currently generating candidates
    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Evaluate the whole combination, returning the best `requested`
    /// documents best first
    pub fn execute(&mut self, lengths: &mut dyn LengthSource) -> Result<Vec<ScoredDocument>> {
        self.reset()?;
        self.accumulator = TopKAccumulator::new(self.requested);
        self.quorum = self.children.len();
        self.stats = MaxScoreStats::default();
        if self.requested == 0 {
            return Ok(Vec::new());
        }

        self.seed_top_documents(lengths)?;

        let mut top = 0usize;
        let mut floor: DocId = 0;
        loop {
            let mut candidate = TERMINATED;
            for &i in &self.order[..self.quorum] {
                let child = &mut self.children[i];
                child.move_to(floor)?;
                candidate = candidate.min(child.current_candidate());
            }
            while top < self.top_documents.len() && self.top_documents[top] < floor {
                top += 1;
            }
            let is_top = top < self.top_documents.len() && self.top_documents[top] <= candidate;
            if is_top {
                candidate = self.top_documents[top];
                top += 1;
            }
            if candidate == TERMINATED {
                break;
            }

            self.stats.candidates += 1;
            let ctx = ScoringContext::new(candidate, lengths.length(candidate)?);
            if is_top || !self.accumulator.is_full() {
                self.score_fully(&ctx)?;
            } else {
                self.score_pruned(&ctx)?;
            }
            floor = candidate + 1;
        }

        log::debug!(
            "max-score: {} candidates, {} scored, {} pruned, {} seeded, threshold {:?}, quorum {}/{}",
            self.stats.candidates,
            self.stats.scored,
            self.stats.pruned,
            self.stats.seeded,
            self.accumulator.threshold(),
            self.quorum,
            self.children.len()
        );
        Ok(self.accumulator.iter().collect())
    }

    /// Score the union of the children's top documents, then rewind
    fn seed_top_documents(&mut self, lengths: &mut dyn LengthSource) -> Result<()> {
        if self.top_documents.is_empty() {
            return Ok(());
        }
        for index in 0..self.top_documents.len() {
            let document = self.top_documents[index];
            let ctx = ScoringContext::new(document, lengths.length(document)?);
            let score = self.exact_score(&ctx)?;
            self.accumulator.offer(document, score);
            self.stats.seeded += 1;
        }
        for child in self.children.iter_mut() {
            child.reset()?;
        }
        self.update_quorum();
        Ok(())
    }

    /// Every child's score, summed in child order
    fn exact_score(&mut self, ctx: &ScoringContext) -> Result<Score> {
        for (child, score) in self.children.iter_mut().zip(self.scores.iter_mut()) {
            child.move_to(ctx.document)?;
            *score = child.score(ctx)?;
        }
        Ok(weighted_sum(&self.weights, &self.scores) / self.total_weight)
    }

    fn score_fully(&mut self, ctx: &ScoringContext) -> Result<()> {
        let score = self.exact_score(ctx)?;
        self.accumulator.offer(ctx.document, score);
        self.stats.scored += 1;
        self.update_quorum();
        Ok(())
    }

    fn score_pruned(&mut self, ctx: &ScoringContext) -> Result<()> {
        let Some(threshold) = self.accumulator.threshold() else {
            return self.score_fully(ctx);
        };
        let limit = (threshold - EPSILON) * self.total_weight;
        let mut adjusted = self.potential;
        for rank in 0..self.order.len() {
            let i = self.order[rank];
            let child = &mut self.children[i];
            child.move_to(ctx.document)?;
            let score = child.score(ctx)?;
            self.scores[i] = score;
            adjusted += self.weights[i] * (score - self.maxima[i]);
            if rank + 1 >= self.quorum && adjusted < limit {
                self.stats.pruned += 1;
                return Ok(());
            }
        }

        let score = weighted_sum(&self.weights, &self.scores) / self.total_weight;
        self.accumulator.offer(ctx.document, score);
        self.stats.scored += 1;
        self.update_quorum();
        Ok(())
    }

    fn update_quorum(&mut self) {
        let Some(threshold) = self.accumulator.threshold() else {
            self.quorum = self.children.len();
            return;
        };
        let limit = (threshold - EPSILON) * self.total_weight;
        let mut bound = self.potential;
        let mut quorum = 0;
        while quorum < self.order.len() && bound >= limit {
            let i = self.order[quorum];
            bound += self.weights[i] * (self.minima[i] - self.maxima[i]);
            quorum += 1;
        }
        if quorum != self.quorum {
            log::trace!(
                "quorum {} -> {} at threshold {}",
                self.quorum,
                quorum,
                threshold
            );
            self.quorum = quorum;
        }
    }
}

impl DocIterator for MaxScoreCombination {
    fn current_candidate(&self) -> DocId {
        self.document
    }

    fn move_to(&mut self, document: DocId) -> Result<()> {
        for child in self.children.iter_mut() {
            child.move_to(document)?;
        }
        self.document = min_candidate(&self.children);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        for child in self.children.iter_mut() {
            child.reset()?;
        }
        self.document = min_candidate(&self.children);
        Ok(())
    }

    fn total_entries(&self) -> u64 {
        self.children.iter().map(|c| c.total_entries()).sum()
    }
}

/// Nested under another combination, every child is scored
impl ScoreIterator for MaxScoreCombination {
    fn score(&mut self, ctx: &ScoringContext) -> Result<Score> {
        for (child, score) in self.children.iter_mut().zip(self.scores.iter_mut()) {
            *score = child.score(ctx)?;
        }
        Ok(weighted_sum(&self.weights, &self.scores) / self.total_weight)
    }

    fn max_score(&self) -> Score {
        self.potential / self.total_weight
    }

    fn min_score(&self) -> Score {
        self.minimum / self.total_weight
    }

    fn top_documents(&self) -> Option<&[DocId]> {
        if self.top_documents.is_empty() {
            None
        } else {
            Some(&self.top_documents)
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::super::collector::TopKAccumulator;
    use super::super::combination::ScoreCombination;
    use super::super::test_util::FixedScorer;
    use super::*;

    struct NoLengths;

    impl LengthSource for NoLengths {
        fn length(&mut self, _document: DocId) -> Result<u32> {
            Ok(0)
        }
    }

    fn flat(documents: std::ops::RangeInclusive<DocId>, score: Score, max: Score) -> FixedScorer {
        FixedScorer::new(documents.map(|d| (d, score)).collect(), max, 0.0)
    }

    fn exhaustive(
        children: Vec<Box<dyn ScoreIterator>>,
        weights: Vec<f64>,
        requested: usize,
    ) -> Vec<ScoredDocument> {
        let mut combine = ScoreCombination::unfiltered(children, weights).unwrap();
        let mut accumulator = TopKAccumulator::new(requested);
        while !combine.is_done() {
            let document = combine.current_candidate();
            let score = combine.score(&ScoringContext::new(document, 0)).unwrap();
            accumulator.offer(document, score);
            combine.move_past(document).unwrap();
        }
        accumulator.into_sorted_vec()
    }

    #[test]
    fn test_low_scoring_children_stop_being_asked() {
        let a = FixedScorer::new(vec![(1, 0.4), (2, 0.1), (3, 0.05)], 0.9, 0.0);
        let b = flat(1..=5, 0.1, 0.1);
        let c = flat(1..=6, 0.05, 0.05);
        let (b_calls, c_calls) = (b.calls.clone(), c.calls.clone());

        let children: Vec<Box<dyn ScoreIterator>> = vec![Box::new(a), Box::new(b), Box::new(c)];
        let mut maxscore =
            MaxScoreCombination::new(children, vec![1.0; 3], 1, SortPolicy::Cost).unwrap();
        let results = maxscore.execute(&mut NoLengths).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document, 1);
        assert!((results[0].score - 0.55 / 3.0).abs() < 1e-12);
        assert_eq!(b_calls.get(), 1);
        assert_eq!(c_calls.get(), 1);
        assert_eq!(maxscore.quorum(), 1);
        assert_eq!(maxscore.stats().pruned, 2);
    }

    #[test]
    fn test_sort_policies() {
        let children = || -> Vec<Box<dyn ScoreIterator>> {
            vec![
                Box::new(flat(1..=10, 0.5, 0.5)),
                Box::new(flat(1..=2, 0.5, 0.5)),
            ]
        };
        let cost = MaxScoreCombination::new(children(), vec![3.0, 1.0], 1, SortPolicy::Cost).unwrap();
        assert_eq!(cost.order, vec![1, 0]);
        let weight =
            MaxScoreCombination::new(children(), vec![3.0, 1.0], 1, SortPolicy::Weight).unwrap();
        assert_eq!(weight.order, vec![0, 1]);
        assert_eq!(SortPolicy::parse("weight"), Some(SortPolicy::Weight));
        assert_eq!(SortPolicy::parse("size"), None);
    }

    #[test]
    fn test_top_documents_are_scored_first() {
        let a = FixedScorer::new(vec![(1, 0.1), (7, 1.0)], 1.0, 0.0).with_top_documents(vec![7]);
        let b = flat(1..=8, 0.2, 0.2);
        let children: Vec<Box<dyn ScoreIterator>> = vec![Box::new(a), Box::new(b)];
        let mut maxscore =
            MaxScoreCombination::new(children, vec![1.0, 1.0], 1, SortPolicy::Cost).unwrap();
        assert_eq!(maxscore.top_documents(), Some(&[7][..]));

        let results = maxscore.execute(&mut NoLengths).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document, 7);
        assert!((results[0].score - 0.6).abs() < 1e-12);
        assert_eq!(maxscore.stats().seeded, 1);
        // the seeded threshold drops b from the quorum before the scan
        assert_eq!(maxscore.quorum(), 1);
        assert_eq!(maxscore.stats().candidates, 2);
    }

    #[test]
    fn test_matches_exhaustive_combination() {
        let mut rng = StdRng::seed_from_u64(7);
        for round in 0..40 {
            let child_count = rng.random_range(1..5);
            let mut lists = Vec::new();
            for _ in 0..child_count {
                let mut entries = Vec::new();
                for document in 0..200u64 {
                    if rng.random_range(0..4) == 0 {
                        entries.push((document, rng.random_range(0.0..2.0)));
                    }
                }
                let max = entries.iter().map(|e| e.1).fold(0.0, f64::max);
                lists.push((entries, max));
            }
            let weights: Vec<f64> = (0..child_count).map(|_| rng.random_range(0.1..3.0)).collect();
            let build = || -> Vec<Box<dyn ScoreIterator>> {
                lists
                    .iter()
                    .map(|(entries, max)| {
                        Box::new(FixedScorer::new(entries.clone(), *max, 0.0)) as Box<dyn ScoreIterator>
                    })
                    .collect()
            };
            let requested = [1, 3, 10, 1000][round % 4];
            let sort = if round % 2 == 0 { SortPolicy::Cost } else { SortPolicy::Weight };

            let expected = exhaustive(build(), weights.clone(), requested);
            let mut maxscore =
                MaxScoreCombination::new(build(), weights.clone(), requested, sort).unwrap();
            let actual = maxscore.execute(&mut NoLengths).unwrap();
            assert_eq!(actual, expected, "round {}", round);
            // a second run starts over
            assert_eq!(maxscore.execute(&mut NoLengths).unwrap(), expected);
        }
    }

    #[test]
    fn test_nested_as_score_iterator() {
        let children: Vec<Box<dyn ScoreIterator>> =
            vec![Box::new(flat(2..=3, 1.0, 1.0)), Box::new(flat(3..=4, 3.0, 3.0))];
        let mut maxscore =
            MaxScoreCombination::new(children, vec![1.0, 1.0], 5, SortPolicy::Cost).unwrap();
        assert_eq!(maxscore.current_candidate(), 2);
        assert_eq!(maxscore.max_score(), 2.0);
        assert_eq!(maxscore.min_score(), 0.0);
        maxscore.move_to(3).unwrap();
        assert_eq!(maxscore.score(&ScoringContext::new(3, 0)).unwrap(), 2.0);
        maxscore.move_past(3).unwrap();
        assert_eq!(maxscore.current_candidate(), 4);
    }

    #[test]
    fn test_zero_requested_and_bad_weights() {
        let children: Vec<Box<dyn ScoreIterator>> = vec![Box::new(flat(1..=3, 1.0, 1.0))];
        let mut maxscore =
            MaxScoreCombination::new(children, vec![1.0], 0, SortPolicy::Cost).unwrap();
        assert!(maxscore.execute(&mut NoLengths).unwrap().is_empty());

        let children: Vec<Box<dyn ScoreIterator>> = vec![Box::new(flat(1..=3, 1.0, 1.0))];
        assert!(MaxScoreCombination::new(children, vec![-1.0], 1, SortPolicy::Cost).is_err());
    }
}

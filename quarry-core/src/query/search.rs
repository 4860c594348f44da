//! Search driver
//!
//! Builds a query tree against an index and walks the root in document
//! order. How a root is drained depends on its family:
//!
//! | Root        | Result score                         |
//! |-------------|--------------------------------------|
//! | `MaxScore`  | its own pruned top-k evaluation      |
//! | `Score`     | exhaustive scoring of every candidate |
//! | `Indicator` | 1.0 where the indicator holds        |
//! | `Extent`, `Count` | the count at the document      |

use super::collector::{ScoredDocument, TopKAccumulator};
use super::factory::IteratorFactory;
use super::node::{Node, QueryNode};
use super::traits::{DocIterator, ScoringContext};
use crate::Result;
use crate::index::{Index, LengthSource};

/// Best `requested` documents for `query`, best first. Ties are broken by
/// ascending document id.
pub fn search(
    index: &mut Index,
    factory: &IteratorFactory,
    query: &QueryNode,
    requested: usize,
) -> Result<Vec<ScoredDocument>> {
    let root = factory.build(index, query, requested)?;
    let mut lengths = index.open_lengths()?;
    let results = evaluate(root, &mut lengths, requested)?;
    log::debug!("{} -> {} results", query, results.len());
    Ok(results)
}

/// Drain a built root. A `MaxScore` root keeps the result count it was
/// built with; the factory gives it the caller's count unless the node sets
/// `requested` itself.
pub fn evaluate(
    root: Node,
    lengths: &mut dyn LengthSource,
    requested: usize,
) -> Result<Vec<ScoredDocument>> {
    let mut root = match root {
        Node::MaxScore(mut maxscore) => return maxscore.execute(lengths),
        other => other,
    };

    let mut accumulator = TopKAccumulator::new(requested);
    while !root.is_done() {
        let document = root.current_candidate();
        let ctx = ScoringContext::new(document, lengths.length(document)?);
        match &mut root {
            Node::Score(scorer) => {
                accumulator.offer(document, scorer.score(&ctx)?);
            }
            Node::Indicator(indicator) => {
                if indicator.indicator(&ctx)? {
                    accumulator.offer(document, 1.0);
                }
            }
            node => {
                let count = node.count(&ctx)?;
                if count > 0 {
                    accumulator.offer(document, count as f64);
                }
            }
        }
        root.move_past(document)?;
    }
    Ok(accumulator.into_sorted_vec())
}

#[cfg(test)]
mod tests {
    use super::super::maxscore::{MaxScoreCombination, SortPolicy};
    use super::super::test_util::{FixedScorer, ListIterator};
    use super::super::traits::ScoreIterator;
    use super::*;

    struct FixedLengths;

    impl LengthSource for FixedLengths {
        fn length(&mut self, _document: crate::DocId) -> Result<u32> {
            Ok(10)
        }
    }

    #[test]
    fn test_score_root() {
        let scorer = FixedScorer::new(vec![(1, 0.5), (2, 2.0), (4, 1.0)], 2.0, 0.0);
        let results = evaluate(Node::Score(Box::new(scorer)), &mut FixedLengths, 2).unwrap();
        assert_eq!(
            results,
            vec![ScoredDocument::new(2, 2.0), ScoredDocument::new(4, 1.0)]
        );
    }

    #[test]
    fn test_count_root() {
        let list = ListIterator::new(vec![(3, vec![1]), (6, vec![1, 5, 9])]);
        let results = evaluate(Node::Extent(list.boxed()), &mut FixedLengths, 10).unwrap();
        assert_eq!(
            results,
            vec![ScoredDocument::new(6, 3.0), ScoredDocument::new(3, 1.0)]
        );
    }

    #[test]
    fn test_maxscore_root_keeps_its_own_count() {
        let scorer = FixedScorer::new(vec![(1, 0.5), (2, 2.0), (4, 1.0)], 2.0, 0.0);
        let children: Vec<Box<dyn ScoreIterator>> = vec![Box::new(scorer)];
        let maxscore = MaxScoreCombination::new(children, vec![1.0], 1, SortPolicy::Cost).unwrap();
        let results = evaluate(Node::MaxScore(Box::new(maxscore)), &mut FixedLengths, 10).unwrap();
        assert_eq!(results, vec![ScoredDocument::new(2, 2.0)]);
    }
}

//! Randomized checks of query evaluation against a real on-disk index
//!
//! - `#maxscore` returns exactly what exhaustive `#combine` returns, for
//!   both scorers, both sort policies, with and without topdocs
//! - conjunctions and disjunctions match set intersection and union
//! - `#od` matches adjacency computed straight from the corpus

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::path::Path;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::DocId;
    use crate::index::{Index, IndexBuilder, IndexBuilderConfig};
    use crate::query::{
        DocIterator, IteratorFactory, Node, QueryNode, RetrievalConfig, ScoreIterator, ScorerKind,
        SortPolicy, search,
    };
    use crate::structures::{PostingWriterConfig, TermPosting};

    const VOCABULARY: &[&str] = &["ant", "bee", "cat", "dog", "eel", "fox", "gnu", "hen"];

    /// Token streams; `None` is a word outside the vocabulary
    fn generate_corpus(seed: u64, documents: usize) -> Vec<Vec<Option<usize>>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..documents)
            .map(|_| {
                let length = rng.random_range(1..80);
                (0..length)
                    .map(|_| {
                        // geometric: "ant" on half the draws, "bee" a quarter, ...
                        let roll: u32 = rng.random_range(1..1024);
                        let term = roll.trailing_zeros() as usize;
                        (term < VOCABULARY.len()).then_some(term)
                    })
                    .collect()
            })
            .collect()
    }

    fn document_id(index: usize) -> DocId {
        index as DocId + 1
    }

    fn build_index(dir: &Path, corpus: &[Vec<Option<usize>>], top_docs: usize) {
        let mut postings: BTreeMap<&str, Vec<TermPosting>> = BTreeMap::new();
        for (i, tokens) in corpus.iter().enumerate() {
            let mut positions: BTreeMap<usize, Vec<u32>> = BTreeMap::new();
            for (position, token) in tokens.iter().enumerate() {
                if let Some(term) = token {
                    positions.entry(*term).or_default().push(position as u32);
                }
            }
            for (term, positions) in positions {
                postings
                    .entry(VOCABULARY[term])
                    .or_default()
                    .push(TermPosting::with_positions(document_id(i), positions));
            }
        }

        let config = IndexBuilderConfig {
            writer: PostingWriterConfig {
                skip_distance: 16,
                skip_reset_distance: 4,
                store_positions: true,
            },
            top_docs,
            top_docs_min_postings: 20,
            ..Default::default()
        };
        let mut builder = IndexBuilder::create(dir, config).unwrap();
        for (term, list) in &postings {
            builder.add_term(term.as_bytes(), list).unwrap();
        }
        for (i, tokens) in corpus.iter().enumerate() {
            builder
                .add_document_length(document_id(i), tokens.len() as u32)
                .unwrap();
        }
        builder.finish().unwrap();
    }

    fn documents_with(corpus: &[Vec<Option<usize>>], term: usize) -> BTreeSet<DocId> {
        corpus
            .iter()
            .enumerate()
            .filter(|(_, tokens)| tokens.contains(&Some(term)))
            .map(|(i, _)| document_id(i))
            .collect()
    }

    fn drain(node: &mut Node) -> Vec<DocId> {
        let mut out = Vec::new();
        while !node.is_done() {
            let document = node.current_candidate();
            out.push(document);
            node.move_past(document).unwrap();
        }
        out
    }

    fn terms_query(operator: &str, terms: &[usize]) -> QueryNode {
        QueryNode::new(operator).with_children(terms.iter().map(|&t| QueryNode::term(VOCABULARY[t])))
    }

    #[test]
    fn test_maxscore_equals_exhaustive_combine() {
        let corpus = generate_corpus(42, 1500);
        let mut rng = StdRng::seed_from_u64(4242);

        for top_docs in [0, 8] {
            let dir = tempfile::tempdir().unwrap();
            build_index(dir.path(), &corpus, top_docs);
            let mut index = Index::open(dir.path()).unwrap();
            assert_eq!(index.has_top_documents(), top_docs > 0);

            for scorer in [ScorerKind::Bm25, ScorerKind::Dirichlet] {
                for sort in [SortPolicy::Cost, SortPolicy::Weight] {
                    let factory = IteratorFactory::new(RetrievalConfig {
                        scorer,
                        max_score_sort: sort,
                        ..Default::default()
                    });
                    for requested in [1, 5, 20, 200] {
                        let mut terms: Vec<usize> = (0..VOCABULARY.len()).collect();
                        let keep = rng.random_range(2..=4);
                        for _ in 0..VOCABULARY.len() - keep {
                            let drop = rng.random_range(0..terms.len());
                            terms.remove(drop);
                        }
                        let mut combine = terms_query("combine", &terms);
                        let mut maxscore = terms_query("maxscore", &terms);
                        for (i, _) in terms.iter().enumerate() {
                            let weight = rng.random_range(0.5..2.0);
                            combine.parameters.set(i.to_string(), weight);
                            maxscore.parameters.set(i.to_string(), weight);
                        }

                        let expected = search(&mut index, &factory, &combine, requested).unwrap();
                        let actual = search(&mut index, &factory, &maxscore, requested).unwrap();
                        assert_eq!(
                            actual, expected,
                            "{} scorer {:?} sort {:?} k {} topdocs {}",
                            maxscore, scorer, sort, requested, top_docs
                        );
                        assert_eq!(expected.len(), requested.min(union_size(&corpus, &terms)));
                    }
                }
            }
        }
    }

    fn union_size(corpus: &[Vec<Option<usize>>], terms: &[usize]) -> usize {
        terms
            .iter()
            .flat_map(|&t| documents_with(corpus, t))
            .collect::<BTreeSet<_>>()
            .len()
    }

    #[test]
    fn test_set_operators_match_corpus() {
        let corpus = generate_corpus(7, 800);
        let dir = tempfile::tempdir().unwrap();
        build_index(dir.path(), &corpus, 0);
        let mut index = Index::open(dir.path()).unwrap();
        let factory = IteratorFactory::default();

        for terms in [vec![0, 3], vec![2, 4, 5], vec![1, 6]] {
            let sets: Vec<BTreeSet<DocId>> =
                terms.iter().map(|&t| documents_with(&corpus, t)).collect();
            let intersection: Vec<DocId> = sets[0]
                .iter()
                .filter(|d| sets.iter().all(|s| s.contains(d)))
                .copied()
                .collect();
            let union: Vec<DocId> = sets.iter().flatten().copied().collect::<BTreeSet<_>>().into_iter().collect();

            let wide = terms_query("uw", &terms).with_param("width", 100_000);
            let mut node = factory.build(&mut index, &wide, 10).unwrap();
            assert_eq!(drain(&mut node), intersection, "uw {:?}", terms);

            let mut node = factory.build(&mut index, &terms_query("all", &terms), 10).unwrap();
            assert_eq!(drain(&mut node), intersection, "all {:?}", terms);

            let mut node = factory.build(&mut index, &terms_query("syn", &terms), 10).unwrap();
            assert_eq!(drain(&mut node), union, "syn {:?}", terms);

            let mut node = factory.build(&mut index, &terms_query("any", &terms), 10).unwrap();
            assert_eq!(drain(&mut node), union, "any {:?}", terms);

            let mut node = factory.build(&mut index, &terms_query("and", &terms), 10).unwrap();
            assert_eq!(drain(&mut node), intersection, "and {:?}", terms);

            let mut node = factory.build(&mut index, &terms_query("combine", &terms), 10).unwrap();
            assert_eq!(drain(&mut node), union, "combine {:?}", terms);
        }
    }

    #[test]
    fn test_ordered_window_matches_adjacent_terms() {
        let corpus = generate_corpus(99, 600);
        let dir = tempfile::tempdir().unwrap();
        build_index(dir.path(), &corpus, 0);
        let mut index = Index::open(dir.path()).unwrap();
        let factory = IteratorFactory::default();

        let (first, second) = (1, 0);
        let mut expected: BTreeMap<DocId, u64> = BTreeMap::new();
        for (i, tokens) in corpus.iter().enumerate() {
            let pairs = tokens
                .windows(2)
                .filter(|w| w[0] == Some(first) && w[1] == Some(second))
                .count() as u64;
            if pairs > 0 {
                expected.insert(document_id(i), pairs);
            }
        }
        assert!(!expected.is_empty());

        let query = terms_query("od", &[first, second]);
        let mut node = factory.build(&mut index, &query, 10).unwrap();
        assert_eq!(drain(&mut node), expected.keys().copied().collect::<Vec<_>>());

        // count roots score by the number of matching windows
        let results = search(&mut index, &factory, &query, usize::MAX).unwrap();
        assert_eq!(results.len(), expected.len());
        for result in results {
            assert_eq!(result.score, expected[&result.document] as f64);
        }
    }

    #[test]
    fn test_combine_is_idempotent_per_document() {
        use crate::query::ScoringContext;

        let corpus = generate_corpus(3, 300);
        let dir = tempfile::tempdir().unwrap();
        build_index(dir.path(), &corpus, 0);
        let mut index = Index::open(dir.path()).unwrap();
        let factory = IteratorFactory::default();

        let query = terms_query("combine", &[0, 2, 5]);
        let node = factory.build(&mut index, &query, 10).unwrap();
        let mut scorer = node.into_score().unwrap();
        while !scorer.is_done() {
            let document = scorer.current_candidate();
            let ctx = ScoringContext::new(document, 20);
            let first = scorer.score(&ctx).unwrap();
            assert_eq!(scorer.score(&ctx).unwrap(), first);
            assert!(first <= scorer.max_score());
            scorer.move_past(document).unwrap();
        }
    }
}

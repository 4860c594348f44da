use crate::index::{Index, IndexBuilder, IndexBuilderConfig};
use crate::query::{
    Arity, BuildContext, DocIterator, Family, IndexFeatures, IteratorFactory, Node, NodeParameters,
    QueryNode, RetrievalConfig, ScoreIterator, ScorerKind, ScoringContext, search,
};
use crate::structures::{PostingWriterConfig, TermPosting};
use crate::{DocId, Error, Result};

fn count_only_config() -> IndexBuilderConfig {
    IndexBuilderConfig {
        writer: PostingWriterConfig {
            store_positions: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn fruit_index(dir: &std::path::Path) -> Index {
    let mut builder = IndexBuilder::create(dir, count_only_config()).unwrap();
    let once = |documents: &[DocId]| -> Vec<TermPosting> {
        documents
            .iter()
            .map(|&d| TermPosting::count_only(d, 1))
            .collect()
    };
    builder.add_term(b"apple", &once(&[1, 5, 9])).unwrap();
    builder.add_term(b"banana", &once(&[2, 5])).unwrap();
    for document in [1, 2, 5, 9] {
        builder.add_document_length(document, 3).unwrap();
    }
    builder.finish().unwrap();
    Index::open(dir).unwrap()
}

fn fruit_query(operator: &str) -> QueryNode {
    QueryNode::new(operator)
        .with_child(QueryNode::leaf("counts", "apple"))
        .with_child(QueryNode::leaf("counts", "banana"))
}

#[test]
fn test_combine_over_two_terms() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = fruit_index(dir.path());
    let factory = IteratorFactory::default();

    let node = factory.build(&mut index, &fruit_query("combine"), 10).unwrap();
    let mut scorer = node.into_score().unwrap();
    let mut scored = Vec::new();
    while !scorer.is_done() {
        let document = scorer.current_candidate();
        let score = scorer.score(&ScoringContext::new(document, 3)).unwrap();
        scored.push((document, score));
        scorer.move_past(document).unwrap();
    }
    let documents: Vec<DocId> = scored.iter().map(|s| s.0).collect();
    assert_eq!(documents, vec![1, 2, 5, 9]);
    let both = scored[2].1;
    for &(document, score) in &scored {
        if document != 5 {
            assert!(both > score, "doc 5 ({}) vs doc {} ({})", both, document, score);
        }
    }

    let results = search(&mut index, &factory, &fruit_query("combine"), 10).unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].document, 5);
    assert_eq!(results[0].score, both);
    assert_eq!(
        search(&mut index, &factory, &fruit_query("maxscore"), 10).unwrap(),
        results
    );
}

#[test]
fn test_dirichlet_ranks_both_terms_first() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = fruit_index(dir.path());
    let factory = IteratorFactory::new(RetrievalConfig {
        scorer: ScorerKind::Dirichlet,
        ..Default::default()
    });
    let results = search(&mut index, &factory, &fruit_query("maxscore"), 1).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document, 5);

    let query = fruit_query("combine").with_param("scorer", "bm25");
    assert!(search(&mut index, &factory, &query, 1).is_ok());
}

#[test]
fn test_filtered_and_indicator_roots() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = fruit_index(dir.path());
    let factory = IteratorFactory::default();

    let results = search(&mut index, &factory, &fruit_query("and"), 10).unwrap();
    let documents: Vec<DocId> = results.iter().map(|r| r.document).collect();
    assert_eq!(documents, vec![5]);

    let results = search(&mut index, &factory, &fruit_query("any"), 10).unwrap();
    assert!(results.iter().all(|r| r.score == 1.0));
    let documents: Vec<DocId> = results.iter().map(|r| r.document).collect();
    assert_eq!(documents, vec![1, 2, 5, 9]);

    let results = search(&mut index, &factory, &fruit_query("all"), 10).unwrap();
    let documents: Vec<DocId> = results.iter().map(|r| r.document).collect();
    assert_eq!(documents, vec![5]);
}

#[test]
fn test_single_document_positions() {
    let dir = tempfile::tempdir().unwrap();
    let mut builder = IndexBuilder::create(dir.path(), IndexBuilderConfig::default()).unwrap();
    builder
        .add_term(b"zebra", &[TermPosting::with_positions(42, vec![10, 20, 30])])
        .unwrap();
    builder.add_document_length(42, 31).unwrap();
    builder.finish().unwrap();

    let mut index = Index::open(dir.path()).unwrap();
    let mut postings = index.extent_iterator(b"zebra").unwrap().unwrap();
    postings.skip_to(42).unwrap();
    assert_eq!(postings.document(), 42);
    let extents: Vec<(u32, u32)> = postings
        .extents()
        .unwrap()
        .iter()
        .map(|e| (e.begin, e.end))
        .collect();
    assert_eq!(extents, vec![(10, 11), (20, 21), (30, 31)]);

    let factory = IteratorFactory::default();
    let mut node = factory.build(&mut index, &QueryNode::term("zebra"), 10).unwrap();
    assert_eq!(node.current_candidate(), 42);
    let count = node.count(&ScoringContext::new(42, 31)).unwrap();
    assert_eq!(count, 3);
}

#[test]
fn test_construction_errors_fail_before_scanning() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = fruit_index(dir.path());
    let factory = IteratorFactory::default();

    let query = QueryNode::new("combine")
        .with_child(QueryNode::leaf("counts", "apple"))
        .with_child(QueryNode::new("proximity"));
    assert!(matches!(
        search(&mut index, &factory, &query, 10),
        Err(Error::UnknownOperator(op)) if op == "proximity"
    ));

    let query = QueryNode::new("feature")
        .with_child(QueryNode::leaf("counts", "apple"))
        .with_child(QueryNode::leaf("counts", "banana"));
    assert!(matches!(
        search(&mut index, &factory, &query, 10),
        Err(Error::Arity { got: 2, .. })
    ));

    // positions were not stored
    assert!(matches!(
        factory.build(&mut index, &QueryNode::term("apple"), 10),
        Err(Error::Contract(_))
    ));

    // scores cannot feed an extent operator
    let query = QueryNode::new("syn").with_child(fruit_query("combine"));
    assert!(matches!(
        factory.build(&mut index, &query, 10),
        Err(Error::Query(_))
    ));

    let query = QueryNode::new("counts");
    assert!(matches!(
        factory.build(&mut index, &query, 10),
        Err(Error::Query(_))
    ));
}

#[test]
fn test_missing_terms_match_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = fruit_index(dir.path());
    let factory = IteratorFactory::default();

    let node = factory
        .build(&mut index, &QueryNode::leaf("counts", "cherry"), 10)
        .unwrap();
    assert!(matches!(node, Node::Count(_)));
    assert!(node.is_done());

    let query = QueryNode::new("combine")
        .with_child(QueryNode::leaf("counts", "cherry"))
        .with_child(QueryNode::leaf("counts", "banana"));
    let results = search(&mut index, &factory, &query, 10).unwrap();
    let documents: Vec<DocId> = results.iter().map(|r| r.document).collect();
    assert_eq!(documents, vec![2, 5]);
}

fn check_as_extents(_: &NodeParameters, _: &[Family], _: IndexFeatures) -> Result<Family> {
    Ok(Family::Extent)
}

fn refuse_to_build(_: &NodeParameters, _: Vec<Node>, _: &mut BuildContext<'_>) -> Result<Node> {
    Err(Error::Contract("built".to_string()))
}

#[test]
fn test_bad_parameters_fail_before_children_are_built() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = fruit_index(dir.path());
    let mut factory = IteratorFactory::default();
    factory.register("unbuildable", Arity::Exactly(0), check_as_extents, refuse_to_build);
    let unbuildable = || QueryNode::new("unbuildable");

    let query = QueryNode::new("syn").with_child(unbuildable());
    assert!(matches!(
        factory.build(&mut index, &query, 10),
        Err(Error::Contract(message)) if message == "built"
    ));

    let rejected = [
        QueryNode::new("feature")
            .with_param("scorer", "bogus")
            .with_child(QueryNode::new("syn").with_child(unbuildable())),
        QueryNode::new("uw").with_param("width", "wide").with_child(unbuildable()),
        QueryNode::new("maxscore")
            .with_param("sort", "random")
            .with_child(unbuildable()),
        QueryNode::new("combine").with_param("0", -1.0).with_child(unbuildable()),
        QueryNode::new("od")
            .with_child(unbuildable())
            .with_child(QueryNode::leaf("counts", "apple")),
        QueryNode::new("combine").with_child(QueryNode::new("any").with_child(unbuildable())),
    ];
    for query in rejected {
        match factory.build(&mut index, &query, 10) {
            Err(Error::Query(message)) => assert!(message.starts_with('#'), "{}", message),
            other => panic!("{}: unexpected {:?}", query, other),
        }
    }
}

#[test]
fn test_maxscore_root_keeps_requested_parameter() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = fruit_index(dir.path());
    let factory = IteratorFactory::default();

    let query = fruit_query("maxscore").with_param("requested", 1);
    let results = search(&mut index, &factory, &query, 10).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document, 5);
    assert_eq!(search(&mut index, &factory, &fruit_query("maxscore"), 10).unwrap().len(), 4);
}

#[test]
fn test_dirichlet_maxscore_with_missing_lengths() {
    let dir = tempfile::tempdir().unwrap();
    let mut builder = IndexBuilder::create(dir.path(), count_only_config()).unwrap();
    let postings = |documents: &[(DocId, u32)]| -> Vec<TermPosting> {
        documents
            .iter()
            .map(|&(d, c)| TermPosting::count_only(d, c))
            .collect()
    };
    builder
        .add_term(b"apple", &postings(&[(1, 1), (3, 4), (6, 1), (8, 2)]))
        .unwrap();
    builder
        .add_term(b"banana", &postings(&[(2, 1), (3, 1), (7, 3), (8, 1)]))
        .unwrap();
    // documents 3 and 7 have no length
    for document in [1, 2, 6, 8] {
        builder.add_document_length(document, 40).unwrap();
    }
    builder.finish().unwrap();
    let mut index = Index::open(dir.path()).unwrap();

    let factory = IteratorFactory::new(RetrievalConfig {
        scorer: ScorerKind::Dirichlet,
        ..Default::default()
    });
    for requested in 1..=8 {
        assert_eq!(
            search(&mut index, &factory, &fruit_query("maxscore"), requested).unwrap(),
            search(&mut index, &factory, &fruit_query("combine"), requested).unwrap(),
            "requested {}",
            requested
        );
    }
}

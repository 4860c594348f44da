use crate::DocId;
use crate::index::{Index, IndexBuilder, IndexBuilderConfig, LengthSource};
use crate::structures::{PostingWriterConfig, TermPosting};

fn postings(documents: &[DocId]) -> Vec<TermPosting> {
    documents
        .iter()
        .map(|&d| TermPosting::with_positions(d, vec![0, (d % 5) as u32 + 1]))
        .collect()
}

fn build(dir: &std::path::Path, config: IndexBuilderConfig) {
    let mut builder = IndexBuilder::create(dir, config).unwrap();
    builder.add_term(b"alpha", &postings(&[1, 2, 3, 4])).unwrap();
    builder.add_term(b"beta", &postings(&[2, 4])).unwrap();
    builder.add_term(b"gamma", &postings(&[4])).unwrap();
    for document in 1..=4 {
        builder.add_document_length(document, 10 * document as u32).unwrap();
    }
    builder.finish().unwrap();
}

#[test]
fn test_index_create_and_open() {
    let dir = tempfile::tempdir().unwrap();
    build(dir.path(), IndexBuilderConfig::default());

    let mut index = Index::open(dir.path()).unwrap();
    assert!(!index.has_top_documents());

    let manifest = index.postings_manifest();
    assert_eq!(manifest.get_u64("keyCount"), Some(3));
    assert_eq!(manifest.get_u64("statistics/documentCount"), Some(4));
    assert_eq!(manifest.get_u64("statistics/collectionLength"), Some(14));
    assert_eq!(manifest.get_u64("statistics/highestDocumentCount"), Some(4));
    assert_eq!(manifest.get_bool("hasPositions"), Some(true));
    assert_eq!(manifest.get_bool("isCompressed"), Some(true));

    let collection = index.collection_statistics();
    assert_eq!(collection.document_count, 4);
    assert_eq!(collection.collection_length, 100);
    assert_eq!(collection.max_length, 40);
    assert_eq!(collection.min_length, 10);
    assert_eq!(collection.average_length(), 25.0);

    let beta = index.term_statistics(b"beta").unwrap();
    assert_eq!(beta.document_frequency, 2);
    assert_eq!(beta.collection_frequency, 4);
    assert_eq!(beta.max_count, 2);
    assert_eq!(index.term_statistics(b"delta").unwrap().document_frequency, 0);

    let mut lengths = index.open_lengths().unwrap();
    assert_eq!(lengths.length(3).unwrap(), 30);
    assert_eq!(lengths.length(99).unwrap(), 0);
}

#[test]
fn test_postings_scan_visits_every_term() {
    let dir = tempfile::tempdir().unwrap();
    build(dir.path(), IndexBuilderConfig::default());
    let mut index = Index::open(dir.path()).unwrap();

    let mut scan = index.postings_scan().unwrap();
    let mut seen = Vec::new();
    while !scan.is_done() {
        let header = scan.header().unwrap();
        seen.push((scan.key().to_vec(), header.document_count));
        scan.next_record().unwrap();
    }
    assert_eq!(
        seen,
        vec![
            (b"alpha".to_vec(), 4),
            (b"beta".to_vec(), 2),
            (b"gamma".to_vec(), 1)
        ]
    );
}

#[test]
fn test_top_documents_part() {
    let dir = tempfile::tempdir().unwrap();
    let config = IndexBuilderConfig {
        top_docs: 2,
        top_docs_min_postings: 2,
        ..Default::default()
    };
    let mut builder = IndexBuilder::create(dir.path(), config).unwrap();
    let counts = [(1, 1), (2, 3), (3, 1), (4, 3), (5, 2)];
    let list: Vec<TermPosting> = counts
        .iter()
        .map(|&(d, c)| TermPosting::with_positions(d, (0..c).collect()))
        .collect();
    builder.add_term(b"common", &list).unwrap();
    builder.add_term(b"rare", &list[..1]).unwrap();
    for document in 1..=5 {
        builder.add_document_length(document, 5).unwrap();
    }
    builder.finish().unwrap();

    let mut index = Index::open(dir.path()).unwrap();
    assert!(index.has_top_documents());
    assert_eq!(index.top_documents(b"common").unwrap(), Some(vec![2, 4]));
    assert_eq!(index.top_documents(b"rare").unwrap(), None);
    assert_eq!(index.top_documents(b"absent").unwrap(), None);
}

#[test]
fn test_count_only_index() {
    let dir = tempfile::tempdir().unwrap();
    let config = IndexBuilderConfig {
        writer: PostingWriterConfig {
            store_positions: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut builder = IndexBuilder::create(dir.path(), config).unwrap();
    builder
        .add_term(b"word", &[TermPosting::count_only(3, 2), TermPosting::count_only(8, 1)])
        .unwrap();
    builder.add_document_length(3, 4).unwrap();
    builder.add_document_length(8, 4).unwrap();
    builder.finish().unwrap();

    let mut index = Index::open(dir.path()).unwrap();
    assert_eq!(index.postings_manifest().get_bool("hasPositions"), Some(false));
    let mut counts = index.count_iterator(b"word").unwrap().unwrap();
    assert_eq!((counts.document(), counts.count()), (3, 2));
    counts.skip_to(4).unwrap();
    assert_eq!((counts.document(), counts.count()), (8, 1));
    assert!(index.extent_iterator(b"word").is_err());
}

//! Index operations: build, info, dump, lookup, search

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::info;

use quarry_core::query::{IndexFeatures, IteratorFactory, QueryNode, RetrievalConfig, search};
use quarry_core::{DocId, Index, IndexBuilder, IndexBuilderConfig, Manifest, TermPosting};

/// Log progress every this many input lines
const PROGRESS_INTERVAL: usize = 1_000_000;

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>, what: &str, line: usize) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let field = field.with_context(|| format!("line {}: missing {}", line, what))?;
    field
        .trim()
        .parse()
        .with_context(|| format!("line {}: bad {} '{}'", line, what, field))
}

/// Postings of the term being read
struct PendingTerm {
    term: String,
    postings: Vec<TermPosting>,
}

impl PendingTerm {
    fn add(&mut self, document: DocId, position: u32) {
        match self.postings.last_mut() {
            Some(last) if last.document == document => {
                last.positions.push(position);
                last.count += 1;
            }
            _ => self
                .postings
                .push(TermPosting::with_positions(document, vec![position])),
        }
    }
}

/// Build an index from sorted `term\tdoc\tposition` tuples and
/// `doc\tlength` pairs
pub fn build_index(
    tuples: PathBuf,
    lengths: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
) -> Result<()> {
    let config: IndexBuilderConfig = match config {
        Some(path) => load_json(&path)?,
        None => IndexBuilderConfig::default(),
    };
    info!("Building index at {:?} with {:?}", output, config);
    let start_time = std::time::Instant::now();

    let mut builder = IndexBuilder::create(&output, config)
        .with_context(|| format!("Failed to create index at {:?}", output))?;

    let reader = BufReader::new(
        File::open(&tuples).with_context(|| format!("Failed to open {:?}", tuples))?,
    );
    let mut pending: Option<PendingTerm> = None;
    let mut terms = 0usize;
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let term = fields
            .next()
            .with_context(|| format!("line {}: missing term", number + 1))?;
        let document: DocId = parse_field(fields.next(), "document", number + 1)?;
        let position: u32 = parse_field(fields.next(), "position", number + 1)?;

        if pending.as_ref().map(|p| p.term.as_str()) != Some(term) {
            if let Some(done) = pending.take() {
                builder
                    .add_term(done.term.as_bytes(), &done.postings)
                    .with_context(|| format!("Failed to add term '{}'", done.term))?;
                terms += 1;
            }
            pending = Some(PendingTerm {
                term: term.to_string(),
                postings: Vec::new(),
            });
        }
        if let Some(current) = pending.as_mut() {
            current.add(document, position);
        }

        if (number + 1) % PROGRESS_INTERVAL == 0 {
            info!("Progress: {} tuples, {} terms", number + 1, terms);
        }
    }
    if let Some(done) = pending.take() {
        builder
            .add_term(done.term.as_bytes(), &done.postings)
            .with_context(|| format!("Failed to add term '{}'", done.term))?;
        terms += 1;
    }

    let reader = BufReader::new(
        File::open(&lengths).with_context(|| format!("Failed to open {:?}", lengths))?,
    );
    let mut documents = 0usize;
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let document: DocId = parse_field(fields.next(), "document", number + 1)?;
        let length: u32 = parse_field(fields.next(), "length", number + 1)?;
        builder
            .add_document_length(document, length)
            .with_context(|| format!("line {}: failed to add length", number + 1))?;
        documents += 1;
    }

    builder.finish().context("Failed to finish index")?;
    info!(
        "Built {} terms over {} documents in {:.2}s",
        terms,
        documents,
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

fn print_manifest(name: &str, manifest: &Manifest) {
    println!("{}:", name);
    for (key, value) in manifest.iter() {
        println!("  {}: {}", key, value);
    }
}

pub fn show_info(index_path: PathBuf) -> Result<()> {
    let index =
        Index::open(&index_path).with_context(|| format!("Failed to open {:?}", index_path))?;
    let collection = index.collection_statistics();

    println!("Index: {:?}", index_path);
    println!("Documents: {}", collection.document_count);
    println!("Collection length: {}", collection.collection_length);
    println!("Average length: {:.2}", collection.average_length());
    println!("Top documents: {}", index.has_top_documents());
    println!();
    print_manifest("Postings", index.postings_manifest());
    println!();
    print_manifest("Lengths", index.lengths_manifest());
    Ok(())
}

/// Print every term with its document count and first documents
pub fn dump_index(index_path: PathBuf, limit: Option<usize>) -> Result<()> {
    let mut index =
        Index::open(&index_path).with_context(|| format!("Failed to open {:?}", index_path))?;
    let mut scan = index.postings_scan()?;
    let mut printed = 0usize;
    while !scan.is_done() && limit.is_none_or(|l| printed < l) {
        let term = String::from_utf8_lossy(scan.key()).into_owned();
        let mut counts = scan.counts()?;
        let mut first = Vec::new();
        while !counts.is_done() && first.len() < 5 {
            first.push(counts.document());
            counts.next()?;
        }
        println!(
            "{}\t{}\t{:?}",
            term,
            counts.header().document_count,
            first
        );
        printed += 1;
        scan.next_record()?;
    }
    Ok(())
}

/// Print the documents and positions of one term
pub fn lookup_term(index_path: PathBuf, term: String) -> Result<()> {
    let mut index =
        Index::open(&index_path).with_context(|| format!("Failed to open {:?}", index_path))?;
    let statistics = index.term_statistics(term.as_bytes())?;
    println!(
        "{}: {} documents, {} occurrences, max count {}",
        term,
        statistics.document_frequency,
        statistics.collection_frequency,
        statistics.max_count
    );

    if IndexFeatures::of(&index).positions {
        let Some(mut postings) = index.extent_iterator(term.as_bytes())? else {
            return Ok(());
        };
        while !postings.is_done() {
            let document = postings.document();
            let begins: Vec<u32> = postings.extents()?.iter().map(|e| e.begin).collect();
            println!("{}\t{:?}", document, begins);
            postings.next()?;
        }
    } else {
        let Some(mut postings) = index.count_iterator(term.as_bytes())? else {
            return Ok(());
        };
        while !postings.is_done() {
            println!("{}\t{}", postings.document(), postings.count());
            postings.next()?;
        }
    }
    Ok(())
}

pub struct SearchArgs {
    pub index: PathBuf,
    pub query: Option<PathBuf>,
    pub terms: Vec<String>,
    pub requested: Option<usize>,
    pub max_score: bool,
    pub config: Option<PathBuf>,
}

pub fn run_search(args: SearchArgs) -> Result<()> {
    let config: RetrievalConfig = match &args.config {
        Some(path) => load_json(path)?,
        None => RetrievalConfig::default(),
    };
    let requested = args.requested.unwrap_or(config.requested);
    let mut index =
        Index::open(&args.index).with_context(|| format!("Failed to open {:?}", args.index))?;

    let query = match &args.query {
        Some(path) => load_json::<QueryNode>(path)?,
        None => {
            anyhow::ensure!(!args.terms.is_empty(), "either --query or --term is required");
            let leaf = if IndexFeatures::of(&index).positions {
                "extents"
            } else {
                "counts"
            };
            let operator = if args.max_score { "maxscore" } else { "combine" };
            QueryNode::new(operator)
                .with_children(args.terms.iter().map(|t| QueryNode::leaf(leaf, t)))
        }
    };
    info!("Query: {}", query);

    let factory = IteratorFactory::new(config);
    let start_time = std::time::Instant::now();
    let results = search(&mut index, &factory, &query, requested)
        .with_context(|| format!("Failed to evaluate {}", query))?;
    info!(
        "{} results in {:.2}ms",
        results.len(),
        start_time.elapsed().as_secs_f64() * 1000.0
    );

    for (rank, result) in results.iter().enumerate() {
        println!("{}\t{}\t{:.6}", rank + 1, result.document, result.score);
    }
    Ok(())
}

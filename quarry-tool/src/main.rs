//! Quarry Tool - CLI for building, inspecting and querying indexes
//!
//! # Commands
//!
//! - `build` - Build an index from sorted `term\tdoc\tposition` tuples
//! - `info` - Display the manifests of an index
//! - `dump` - List every term with its document count
//! - `lookup` - Show the postings of one term
//! - `search` - Evaluate a query tree and print the top documents
//!
//! # Examples
//!
//! ## Build an index
//! ```bash
//! sort -t$'\t' -k1,1 -k2,2n -k3,3n tuples.tsv > sorted.tsv
//! quarry-tool build -i sorted.tsv -l lengths.tsv -o ./my_index
//! ```
//!
//! ## Search with max-score pruning
//! ```bash
//! quarry-tool search -i ./my_index -t apple -t banana -k 10 --max-score
//! ```

mod index_ops;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use index_ops::SearchArgs;

#[derive(Parser)]
#[command(name = "quarry-tool")]
#[command(version, about = "CLI for building, inspecting and querying quarry indexes")]
#[command(after_help = "Use 'quarry-tool <command> --help' for more information.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from sorted tuples
    Build {
        /// Tab separated `term doc position` tuples, sorted by term, doc, position
        #[arg(short, long)]
        input: PathBuf,

        /// Tab separated `doc length` pairs, sorted by doc
        #[arg(short, long)]
        lengths: PathBuf,

        /// Output index directory
        #[arg(short, long)]
        output: PathBuf,

        /// Builder configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show index info
    Info {
        /// Path to the index directory
        #[arg(short, long)]
        input: PathBuf,
    },

    /// List terms with their document counts
    Dump {
        /// Path to the index directory
        #[arg(short, long)]
        input: PathBuf,

        /// Stop after this many terms
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the postings of a term
    Lookup {
        /// Path to the index directory
        #[arg(short, long)]
        input: PathBuf,

        /// Term to look up
        #[arg(short, long)]
        term: String,
    },

    /// Search the index
    Search {
        /// Path to the index directory
        #[arg(short, long)]
        input: PathBuf,

        /// Query tree (JSON)
        #[arg(short, long, conflicts_with = "term")]
        query: Option<PathBuf>,

        /// Query terms, combined with #combine (or #maxscore)
        #[arg(short, long)]
        term: Vec<String>,

        /// Number of results (default: from the retrieval config)
        #[arg(short = 'k', long)]
        requested: Option<usize>,

        /// Combine terms with #maxscore instead of #combine
        #[arg(long, default_value = "false")]
        max_score: bool,

        /// Retrieval configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quarry_tool=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            lengths,
            output,
            config,
        } => {
            index_ops::build_index(input, lengths, output, config)?;
        }
        Commands::Info { input } => {
            index_ops::show_info(input)?;
        }
        Commands::Dump { input, limit } => {
            index_ops::dump_index(input, limit)?;
        }
        Commands::Lookup { input, term } => {
            index_ops::lookup_term(input, term)?;
        }
        Commands::Search {
            input,
            query,
            term,
            requested,
            max_score,
            config,
        } => {
            index_ops::run_search(SearchArgs {
                index: input,
                query,
                terms: term,
                requested,
                max_score,
                config,
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_search() {
        let cli = Cli::try_parse_from([
            "quarry-tool",
            "search",
            "-i",
            "idx",
            "-t",
            "apple",
            "-t",
            "banana",
            "-k",
            "5",
            "--max-score",
        ])
        .unwrap();
        match cli.command {
            Commands::Search {
                term,
                requested,
                max_score,
                query,
                ..
            } => {
                assert_eq!(term, vec!["apple", "banana"]);
                assert_eq!(requested, Some(5));
                assert!(max_score);
                assert!(query.is_none());
            }
            _ => panic!("expected search"),
        }
    }
}

//! Single-pass construction of an index directory

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::lengths::LengthsWriter;
use super::topdocs::TopDocsWriter;
use super::{LENGTHS_PART, POSTINGS_PART, TOPDOCS_PART};
use crate::structures::{BlockIndexConfig, PositionIndexWriter, PostingWriterConfig, TermPosting};
use crate::{DocId, Result};

/// Index builder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexBuilderConfig {
    pub postings: BlockIndexConfig,
    pub lengths: BlockIndexConfig,
    pub writer: PostingWriterConfig,
    /// Top documents kept per term; 0 disables the topdocs part
    pub top_docs: usize,
    /// Shortest posting list that gets a topdocs entry
    pub top_docs_min_postings: usize,
}

impl Default for IndexBuilderConfig {
    fn default() -> Self {
        Self {
            postings: BlockIndexConfig::compressed(),
            lengths: BlockIndexConfig::default(),
            writer: PostingWriterConfig::default(),
            top_docs: 0,
            top_docs_min_postings: 1000,
        }
    }
}

/// Writes the `postings`, `lengths` and optional `topdocs` parts.
///
/// Terms and documents must each be added in increasing order; nothing is
/// sorted here.
pub struct IndexBuilder {
    directory: PathBuf,
    postings: PositionIndexWriter<BufWriter<File>>,
    lengths: LengthsWriter<BufWriter<File>>,
    topdocs: Option<TopDocsWriter<BufWriter<File>>>,
    terms: u64,
}

impl IndexBuilder {
    pub fn create(directory: impl AsRef<Path>, config: IndexBuilderConfig) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;

        let create = |part: &str| -> Result<BufWriter<File>> {
            Ok(BufWriter::new(File::create(directory.join(part))?))
        };
        let postings = PositionIndexWriter::new(create(POSTINGS_PART)?, config.postings, config.writer);
        let lengths = LengthsWriter::new(create(LENGTHS_PART)?, config.lengths);
        let topdocs = if config.top_docs > 0 {
            Some(TopDocsWriter::new(
                create(TOPDOCS_PART)?,
                config.lengths,
                config.top_docs,
                config.top_docs_min_postings,
            ))
        } else {
            None
        };

        log::debug!("creating index at {:?}", directory);
        Ok(Self {
            directory,
            postings,
            lengths,
            topdocs,
            terms: 0,
        })
    }

    pub fn add_term(&mut self, term: &[u8], postings: &[TermPosting]) -> Result<()> {
        self.postings.add_posting_list(term, postings)?;
        if let Some(topdocs) = self.topdocs.as_mut() {
            topdocs.add(term, postings)?;
        }
        self.terms += 1;
        Ok(())
    }

    pub fn add_document_length(&mut self, document: DocId, length: u32) -> Result<()> {
        self.lengths.add(document, length)
    }

    pub fn finish(mut self) -> Result<PathBuf> {
        if self.lengths.document_count() > 0 {
            self.postings
                .manifest_mut()
                .set("statistics/documentCount", self.lengths.document_count());
        }
        self.postings.close()?.into_inner().map_err(|e| e.into_error())?;
        self.lengths.close()?.into_inner().map_err(|e| e.into_error())?;
        if let Some(topdocs) = self.topdocs {
            topdocs.close()?.into_inner().map_err(|e| e.into_error())?;
        }
        log::debug!("finished index at {:?}: {} terms", self.directory, self.terms);
        Ok(self.directory)
    }
}

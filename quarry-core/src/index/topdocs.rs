//! Per-term top documents part
//!
//! Value layout: vbyte document count, then ascending vbyte document deltas.

use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use crate::compression::{CompressedByteBuffer, decode_vbyte};
use crate::structures::{BlockIndexConfig, BlockIndexReader, BlockIndexWriter, GenericElement, TermPosting};
use crate::{DocId, Result};

/// Documents with the highest term frequency, ties to the lower id,
/// returned in ascending document order
pub fn select_top_documents(postings: &[TermPosting], limit: usize) -> Vec<DocId> {
    let mut ranked: Vec<&TermPosting> = postings.iter().collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then(a.document.cmp(&b.document)));
    let mut top: Vec<DocId> = ranked.iter().take(limit).map(|p| p.document).collect();
    top.sort_unstable();
    top
}

pub struct TopDocsWriter<W: Write> {
    writer: BlockIndexWriter<W>,
    limit: usize,
    min_postings: usize,
}

impl<W: Write> TopDocsWriter<W> {
    pub fn new(output: W, config: BlockIndexConfig, limit: usize, min_postings: usize) -> Self {
        let mut writer = BlockIndexWriter::new(output, config);
        let manifest = writer.manifest_mut();
        manifest.set("writerClass", "quarry::TopDocsWriter");
        manifest.set("readerClass", "quarry::TopDocsReader");
        manifest.set("topDocuments", limit as u64);
        manifest.set("minimumPostings", min_postings as u64);
        Self {
            writer,
            limit,
            min_postings,
        }
    }

    /// Record the top documents of `term` if its list is long enough
    pub fn add(&mut self, term: &[u8], postings: &[TermPosting]) -> Result<()> {
        if self.limit == 0 || postings.len() < self.min_postings {
            return Ok(());
        }
        let top = select_top_documents(postings, self.limit);
        let mut value = CompressedByteBuffer::new();
        value.add(top.len() as u64);
        let mut last = 0;
        for document in top {
            value.add(document - last);
            last = document;
        }
        self.writer
            .add(GenericElement::new(term.to_vec(), value.as_slice().to_vec()))
    }

    pub fn close(self) -> Result<W> {
        self.writer.close()
    }
}

pub struct TopDocsReader<R: Read + Seek> {
    reader: BlockIndexReader<R>,
}

impl TopDocsReader<BufReader<File>> {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            reader: BlockIndexReader::open_path(path)?,
        })
    }
}

impl<R: Read + Seek> TopDocsReader<R> {
    pub fn open(source: R) -> Result<Self> {
        Ok(Self {
            reader: BlockIndexReader::open(source)?,
        })
    }

    pub fn get(&mut self, term: &[u8]) -> Result<Option<Vec<DocId>>> {
        let Some(value) = self.reader.get(term)? else {
            return Ok(None);
        };
        let data = value.as_slice();
        let mut pos = 0;
        let count = decode_vbyte(data, &mut pos)?;
        let mut documents = Vec::with_capacity(count.min(1 << 16) as usize);
        let mut document = 0;
        for _ in 0..count {
            document += decode_vbyte(data, &mut pos)?;
            documents.push(document);
        }
        Ok(Some(documents))
    }
}

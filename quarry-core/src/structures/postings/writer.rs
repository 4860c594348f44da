//! Posting list construction

use std::io::{self, Write};

use super::{
    HAS_MAXTF, HAS_POSITIONS, HAS_SKIPS, PostingHeader, PostingWriterConfig, SkipParameters,
};
use crate::compression::CompressedByteBuffer;
use crate::structures::block_index::{BlockIndexConfig, BlockIndexWriter, IndexElement};
use crate::{DocId, Error, Result};

/// One document's occurrences of a term, as handed over by the producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermPosting {
    pub document: DocId,
    pub count: u32,
    pub positions: Vec<u32>,
}

impl TermPosting {
    pub fn with_positions(document: DocId, positions: Vec<u32>) -> Self {
        Self {
            document,
            count: positions.len() as u32,
            positions,
        }
    }

    pub fn count_only(document: DocId, count: u32) -> Self {
        Self {
            document,
            count,
            positions: Vec::new(),
        }
    }
}

/// Posting list of one term while it is being built.
///
/// Each segment grows in its own buffer; the header is computed by
/// [`finish`](Self::finish) once the byte lengths are known.
pub struct PostingListBuffer {
    key: Vec<u8>,
    config: PostingWriterConfig,
    header: CompressedByteBuffer,

    documents: CompressedByteBuffer,
    counts: CompressedByteBuffer,
    positions: CompressedByteBuffer,
    skips: CompressedByteBuffer,
    skip_positions: CompressedByteBuffer,

    document_count: u64,
    total_position_count: u64,
    max_count: u64,
    last_document: Option<DocId>,

    last_skip_document: DocId,
    skip_count: u64,
    floors: [u64; 3],
}

impl PostingListBuffer {
    pub fn new(key: impl Into<Vec<u8>>, config: PostingWriterConfig) -> Self {
        Self {
            key: key.into(),
            config,
            header: CompressedByteBuffer::new(),
            documents: CompressedByteBuffer::new(),
            counts: CompressedByteBuffer::new(),
            positions: CompressedByteBuffer::new(),
            skips: CompressedByteBuffer::new(),
            skip_positions: CompressedByteBuffer::new(),
            document_count: 0,
            total_position_count: 0,
            max_count: 0,
            last_document: None,
            last_skip_document: 0,
            skip_count: 0,
            floors: [0; 3],
        }
    }

    pub fn document_count(&self) -> u64 {
        self.document_count
    }

    pub fn total_position_count(&self) -> u64 {
        self.total_position_count
    }

    pub fn max_count(&self) -> u64 {
        self.max_count
    }

    /// Append one document. `positions` is ignored unless the writer
    /// stores positions, in which case its length must equal `count`.
    pub fn add_document(&mut self, document: DocId, count: u32, positions: &[u32]) -> Result<()> {
        if count == 0 {
            return Err(Error::Contract(format!(
                "document {} added with zero occurrences",
                document
            )));
        }
        if let Some(last) = self.last_document {
            if document <= last {
                return Err(Error::Contract(format!(
                    "document {} follows document {}",
                    document, last
                )));
            }
        }
        if self.config.store_positions {
            if positions.len() != count as usize {
                return Err(Error::Contract(format!(
                    "document {} has count {} but {} positions",
                    document,
                    count,
                    positions.len()
                )));
            }
            if let Some(pair) = positions.windows(2).find(|w| w[1] < w[0]) {
                return Err(Error::Contract(format!(
                    "position {} follows position {} in document {}",
                    pair[1], pair[0], document
                )));
            }
            let mut last_position = 0u32;
            for &position in positions {
                self.positions.add((position - last_position) as u64);
                last_position = position;
            }
        }

        self.documents
            .add(document - self.last_document.unwrap_or(0));
        self.counts.add(count as u64);
        self.last_document = Some(document);
        self.document_count += 1;
        self.total_position_count += count as u64;
        self.max_count = self.max_count.max(count as u64);

        let distance = self.config.skip_distance;
        if distance > 0 && self.document_count % distance == 0 {
            self.add_skip(document);
        }
        Ok(())
    }

    fn add_skip(&mut self, document: DocId) {
        self.skips.add(document - self.last_skip_document);
        let offsets = [
            self.documents.len() as u64,
            self.counts.len() as u64,
            self.positions.len() as u64,
        ];
        if self.skip_count % self.config.skip_reset_distance.max(1) == 0 {
            for offset in offsets {
                self.skip_positions.add(offset);
            }
            self.floors = offsets;
        } else {
            for (offset, floor) in offsets.iter().zip(self.floors) {
                self.skips.add(offset - floor);
            }
        }
        self.last_skip_document = document;
        self.skip_count += 1;
    }

    /// Compute the header; after this the buffer is a complete element
    pub fn finish(&mut self) {
        let mut options = HAS_MAXTF;
        if self.config.store_positions {
            options |= HAS_POSITIONS;
        }
        let skips = if self.skip_count > 0 {
            options |= HAS_SKIPS;
            Some(SkipParameters {
                distance: self.config.skip_distance,
                reset_distance: self.config.skip_reset_distance.max(1),
                count: self.skip_count,
            })
        } else {
            None
        };

        let header = PostingHeader {
            options,
            document_count: self.document_count,
            total_position_count: self.total_position_count,
            skips,
            max_count: Some(self.max_count),
            document_bytes: self.documents.len() as u64,
            count_bytes: self.counts.len() as u64,
            position_bytes: self.positions.len() as u64,
            skip_bytes: self.skips.len() as u64,
            skip_position_bytes: self.skip_positions.len() as u64,
        };
        self.header.clear();
        header.encode(&mut self.header);
    }
}

impl IndexElement for PostingListBuffer {
    fn key(&self) -> &[u8] {
        &self.key
    }

    fn data_length(&self) -> u64 {
        (self.header.len()
            + self.documents.len()
            + self.counts.len()
            + self.positions.len()
            + self.skips.len()
            + self.skip_positions.len()) as u64
    }

    fn write_data(&self, out: &mut dyn Write) -> io::Result<()> {
        self.header.write_to(out)?;
        self.documents.write_to(out)?;
        self.counts.write_to(out)?;
        self.positions.write_to(out)?;
        self.skips.write_to(out)?;
        self.skip_positions.write_to(out)
    }
}

/// Document whose positions are still arriving
struct OpenDocument {
    document: DocId,
    positions: Vec<u32>,
}

/// Writer for a position (or count) index.
///
/// Accepts either whole posting lists through
/// [`add_posting_list`](Self::add_posting_list), or the streaming form
/// `process_word`, `process_document`, `process_position`, `finish_word`
/// fed with tuples already sorted by term, then document, then position.
pub struct PositionIndexWriter<W: Write> {
    writer: BlockIndexWriter<W>,
    config: PostingWriterConfig,
    current: Option<PostingListBuffer>,
    document: Option<OpenDocument>,

    collection_length: u64,
    highest_document_count: u64,
    highest_frequency: u64,
    max_document: Option<DocId>,
}

impl<W: Write> PositionIndexWriter<W> {
    pub fn new(output: W, block_config: BlockIndexConfig, config: PostingWriterConfig) -> Self {
        let mut writer = BlockIndexWriter::new(output, block_config);
        let manifest = writer.manifest_mut();
        manifest.set("writerClass", "quarry::PositionIndexWriter");
        manifest.set("readerClass", "quarry::PositionIndexReader");
        manifest.set("skipDistance", config.skip_distance);
        manifest.set("skipResetDistance", config.skip_reset_distance);
        manifest.set("hasPositions", config.store_positions);
        Self {
            writer,
            config,
            current: None,
            document: None,
            collection_length: 0,
            highest_document_count: 0,
            highest_frequency: 0,
            max_document: None,
        }
    }

    pub fn config(&self) -> &PostingWriterConfig {
        &self.config
    }

    /// Start the posting list of `term`, closing the previous one
    pub fn process_word(&mut self, term: &[u8]) -> Result<()> {
        self.finish_word()?;
        self.current = Some(PostingListBuffer::new(term, self.config));
        Ok(())
    }

    pub fn process_document(&mut self, document: DocId) -> Result<()> {
        if self.current.is_none() {
            return Err(Error::Contract(
                "process_document called before process_word".into(),
            ));
        }
        self.flush_document()?;
        self.document = Some(OpenDocument {
            document,
            positions: Vec::new(),
        });
        Ok(())
    }

    pub fn process_position(&mut self, position: u32) -> Result<()> {
        match self.document.as_mut() {
            Some(open) => {
                open.positions.push(position);
                Ok(())
            }
            None => Err(Error::Contract(
                "process_position called before process_document".into(),
            )),
        }
    }

    fn flush_document(&mut self) -> Result<()> {
        let Some(open) = self.document.take() else {
            return Ok(());
        };
        let Some(list) = self.current.as_mut() else {
            return Ok(());
        };
        list.add_document(open.document, open.positions.len() as u32, &open.positions)
    }

    /// Close the current term, if any, and hand it to the block writer
    pub fn finish_word(&mut self) -> Result<()> {
        self.flush_document()?;
        match self.current.take() {
            Some(list) => self.add_list(list),
            None => Ok(()),
        }
    }

    /// Write a complete posting list for `term`
    pub fn add_posting_list(&mut self, term: &[u8], postings: &[TermPosting]) -> Result<()> {
        self.finish_word()?;
        let mut list = PostingListBuffer::new(term, self.config);
        for posting in postings {
            list.add_document(posting.document, posting.count, &posting.positions)?;
        }
        self.add_list(list)
    }

    fn add_list(&mut self, mut list: PostingListBuffer) -> Result<()> {
        if list.document_count() == 0 {
            log::trace!(
                "skipping empty posting list {:?}",
                String::from_utf8_lossy(&list.key)
            );
            return Ok(());
        }
        list.finish();
        self.collection_length += list.total_position_count();
        self.highest_document_count = self.highest_document_count.max(list.document_count());
        self.highest_frequency = self.highest_frequency.max(list.max_count());
        if let Some(last) = list.last_document {
            self.max_document = Some(self.max_document.map_or(last, |d| d.max(last)));
        }
        self.writer.add(list)
    }

    pub fn close(mut self) -> Result<W> {
        self.finish_word()?;
        let manifest = self.writer.manifest_mut();
        manifest.set("statistics/collectionLength", self.collection_length);
        manifest.set(
            "statistics/highestDocumentCount",
            self.highest_document_count,
        );
        manifest.set("statistics/highestFrequency", self.highest_frequency);
        if let Some(max_document) = self.max_document {
            manifest.set_default("statistics/documentCount", max_document + 1);
        }
        self.writer.close()
    }

    /// Metadata written on close
    pub fn manifest_mut(&mut self) -> &mut crate::structures::Manifest {
        self.writer.manifest_mut()
    }
}

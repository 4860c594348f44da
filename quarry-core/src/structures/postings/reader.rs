//! Posting list iteration
//!
//! A posting list is decoded lazily from the block value it lives in:
//! nothing beyond the header is touched until the cursor moves. Both
//! iterator flavours share [`PostingCursor`]; the count flavour never
//! opens the positions segment.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use super::{ExtentArray, PostingHeader, SkipParameters, TERMINATED};
use crate::compression::decode_vbyte;
use crate::structures::OwnedBytes;
use crate::structures::block_index::{BlockIndexReader, KeyIterator, Manifest};
use crate::{DocId, Error, Result};

/// Read window over one segment of a posting list
#[derive(Clone)]
struct Segment {
    data: OwnedBytes,
    start: usize,
    end: usize,
    pos: usize,
}

impl Segment {
    fn new(data: &OwnedBytes, start: usize, len: u64) -> Self {
        Self {
            data: data.clone(),
            start,
            end: start + len as usize,
            pos: start,
        }
    }

    #[inline]
    fn read(&mut self) -> Result<u64> {
        if self.pos >= self.end {
            return Err(Error::Corruption("posting segment ended early".into()));
        }
        decode_vbyte(&self.data.as_slice()[..self.end], &mut self.pos)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        let pos = self.start + offset as usize;
        if pos > self.end {
            return Err(Error::Corruption(format!(
                "skip offset {} beyond segment of {} bytes",
                offset,
                self.end - self.start
            )));
        }
        self.pos = pos;
        Ok(())
    }

    fn rewind(&mut self) {
        self.pos = self.start;
    }
}

/// Decoded skip entry
#[derive(Debug, Clone, Copy)]
struct SkipEntry {
    /// Last document covered by the entry
    document: DocId,
    /// Number of documents before the entry's offsets
    covered: u64,
    /// Absolute documents/counts/positions segment offsets
    offsets: [u64; 3],
}

/// Sequential reader over both skip tiers.
///
/// Entries must be parsed in order: a non-reset entry is only meaningful
/// relative to the floor of the most recent reset entry.
struct SkipReader {
    params: SkipParameters,
    skips: Segment,
    skip_positions: Segment,
    parsed: u64,
    last_document: DocId,
    floors: [u64; 3],
    pending: Option<SkipEntry>,
}

impl SkipReader {
    fn new(params: SkipParameters, skips: Segment, skip_positions: Segment) -> Self {
        Self {
            params,
            skips,
            skip_positions,
            parsed: 0,
            last_document: 0,
            floors: [0; 3],
            pending: None,
        }
    }

    fn reset(&mut self) {
        self.skips.rewind();
        self.skip_positions.rewind();
        self.parsed = 0;
        self.last_document = 0;
        self.floors = [0; 3];
        self.pending = None;
    }

    fn fill(&mut self) -> Result<()> {
        if self.pending.is_some() || self.parsed >= self.params.count {
            return Ok(());
        }
        let document = self.last_document + self.skips.read()?;
        let offsets = if self.parsed % self.params.reset_distance == 0 {
            for floor in self.floors.iter_mut() {
                *floor = self.skip_positions.read()?;
            }
            self.floors
        } else {
            let mut offsets = [0u64; 3];
            for (offset, floor) in offsets.iter_mut().zip(self.floors) {
                *offset = floor + self.skips.read()?;
            }
            offsets
        };
        self.parsed += 1;
        self.last_document = document;
        self.pending = Some(SkipEntry {
            document,
            covered: self.parsed * self.params.distance,
            offsets,
        });
        Ok(())
    }

    /// Consume every entry whose document is below `target`, returning the
    /// last one consumed
    fn consume_below(&mut self, target: DocId) -> Result<Option<SkipEntry>> {
        let mut last = None;
        loop {
            self.fill()?;
            match self.pending {
                Some(entry) if entry.document < target => {
                    last = Some(entry);
                    self.pending = None;
                }
                _ => return Ok(last),
            }
        }
    }
}

/// Shared decoding state of the posting iterators
struct PostingCursor {
    header: PostingHeader,
    documents: Segment,
    counts: Segment,
    positions: Option<Segment>,
    skips: Option<SkipReader>,

    read: u64,
    document: DocId,
    count: u32,
    positions_pending: bool,
    done: bool,
}

impl PostingCursor {
    fn open(data: OwnedBytes, with_positions: bool) -> Result<Self> {
        let mut pos = 0;
        let header = PostingHeader::decode(data.as_slice(), &mut pos)?;
        if pos as u64 + header.segments_len() != data.len() as u64 {
            return Err(Error::Corruption(format!(
                "posting list of {} bytes announces {} bytes of segments after a {} byte header",
                data.len(),
                header.segments_len(),
                pos
            )));
        }
        if with_positions && !header.has_positions() {
            return Err(Error::Contract(
                "extents requested from a posting list without positions".into(),
            ));
        }

        let documents = Segment::new(&data, pos, header.document_bytes);
        let counts = Segment::new(&data, documents.end, header.count_bytes);
        let positions = Segment::new(&data, counts.end, header.position_bytes);
        let skips = Segment::new(&data, positions.end, header.skip_bytes);
        let skip_positions = Segment::new(&data, skips.end, header.skip_position_bytes);

        let mut cursor = Self {
            skips: header
                .skips
                .map(|params| SkipReader::new(params, skips, skip_positions)),
            positions: with_positions.then_some(positions),
            header,
            documents,
            counts,
            read: 0,
            document: 0,
            count: 0,
            positions_pending: false,
            done: false,
        };
        cursor.reset()?;
        Ok(cursor)
    }

    fn reset(&mut self) -> Result<()> {
        self.documents.rewind();
        self.counts.rewind();
        if let Some(positions) = self.positions.as_mut() {
            positions.rewind();
        }
        if let Some(skips) = self.skips.as_mut() {
            skips.reset();
        }
        self.read = 0;
        self.document = 0;
        self.count = 0;
        self.positions_pending = false;
        self.done = false;
        self.next_entry()
    }

    fn next_entry(&mut self) -> Result<()> {
        if self.done {
            return Ok(());
        }
        self.discard_positions()?;
        if self.read >= self.header.document_count {
            self.done = true;
            self.document = TERMINATED;
            self.count = 0;
            return Ok(());
        }
        self.document += self.documents.read()?;
        self.count = self.counts.read()? as u32;
        self.read += 1;
        self.positions_pending = self.positions.is_some();
        Ok(())
    }

    fn discard_positions(&mut self) -> Result<()> {
        if !self.positions_pending {
            return Ok(());
        }
        if let Some(positions) = self.positions.as_mut() {
            for _ in 0..self.count {
                positions.read()?;
            }
        }
        self.positions_pending = false;
        Ok(())
    }

    /// Decode the positions of the current document into `out`. Only valid
    /// once per document.
    fn read_positions(&mut self, out: &mut Vec<u32>) -> Result<()> {
        out.clear();
        if !self.positions_pending {
            return Err(Error::Contract(
                "positions of the current document were already consumed".into(),
            ));
        }
        if let Some(positions) = self.positions.as_mut() {
            let mut position = 0u64;
            for _ in 0..self.count {
                position += positions.read()?;
                out.push(position as u32);
            }
        }
        self.positions_pending = false;
        Ok(())
    }

    /// Advance to the first document `>= target`
    fn skip_to(&mut self, target: DocId) -> Result<()> {
        if self.done || self.document >= target {
            return Ok(());
        }
        let entry = match self.skips.as_mut() {
            Some(skips) => skips.consume_below(target)?,
            None => None,
        };
        if let Some(entry) = entry {
            if entry.covered > self.read {
                self.documents.seek(entry.offsets[0])?;
                self.counts.seek(entry.offsets[1])?;
                if let Some(positions) = self.positions.as_mut() {
                    positions.seek(entry.offsets[2])?;
                }
                log::trace!(
                    "skipped from document {} to {} ({} of {} read)",
                    self.document,
                    entry.document,
                    entry.covered,
                    self.header.document_count
                );
                self.read = entry.covered;
                self.document = entry.document;
                self.positions_pending = false;
            }
        }
        while !self.done && self.document < target {
            self.next_entry()?;
        }
        Ok(())
    }
}

/// Posting iterator exposing documents, counts and single-token extents
pub struct ExtentPostingIterator {
    key: Vec<u8>,
    cursor: PostingCursor,
    extents: ExtentArray,
    /// `cursor.read` the extents were loaded at
    loaded_at: Option<u64>,
    scratch: Vec<u32>,
}

impl ExtentPostingIterator {
    pub fn new(key: impl Into<Vec<u8>>, data: OwnedBytes) -> Result<Self> {
        Ok(Self {
            key: key.into(),
            cursor: PostingCursor::open(data, true)?,
            extents: ExtentArray::new(),
            loaded_at: None,
            scratch: Vec::new(),
        })
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn header(&self) -> &PostingHeader {
        &self.cursor.header
    }

    pub fn is_done(&self) -> bool {
        self.cursor.done
    }

    pub fn document(&self) -> DocId {
        self.cursor.document
    }

    pub fn count(&self) -> u32 {
        self.cursor.count
    }

    pub fn total_entries(&self) -> u64 {
        self.cursor.header.document_count
    }

    pub fn max_count(&self) -> u64 {
        self.cursor.header.max_count.unwrap_or(u32::MAX as u64)
    }

    pub fn next(&mut self) -> Result<()> {
        self.cursor.next_entry()
    }

    /// Move to the first document `>= target`; never moves backwards
    pub fn skip_to(&mut self, target: DocId) -> Result<()> {
        self.cursor.skip_to(target)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.loaded_at = None;
        self.cursor.reset()
    }

    /// Positions of the current document as `[p, p + 1)` extents
    pub fn extents(&mut self) -> Result<&ExtentArray> {
        if self.cursor.done {
            self.extents.reset(TERMINATED);
            return Ok(&self.extents);
        }
        if self.loaded_at != Some(self.cursor.read) {
            self.cursor.read_positions(&mut self.scratch)?;
            self.extents.reset(self.cursor.document);
            for &position in &self.scratch {
                self.extents.push(position, position + 1);
            }
            self.loaded_at = Some(self.cursor.read);
        }
        Ok(&self.extents)
    }
}

/// Posting iterator over documents and counts only
pub struct CountPostingIterator {
    key: Vec<u8>,
    cursor: PostingCursor,
}

impl CountPostingIterator {
    pub fn new(key: impl Into<Vec<u8>>, data: OwnedBytes) -> Result<Self> {
        Ok(Self {
            key: key.into(),
            cursor: PostingCursor::open(data, false)?,
        })
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn header(&self) -> &PostingHeader {
        &self.cursor.header
    }

    pub fn is_done(&self) -> bool {
        self.cursor.done
    }

    pub fn document(&self) -> DocId {
        self.cursor.document
    }

    pub fn count(&self) -> u32 {
        self.cursor.count
    }

    pub fn total_entries(&self) -> u64 {
        self.cursor.header.document_count
    }

    pub fn max_count(&self) -> u64 {
        self.cursor.header.max_count.unwrap_or(u32::MAX as u64)
    }

    pub fn next(&mut self) -> Result<()> {
        self.cursor.next_entry()
    }

    pub fn skip_to(&mut self, target: DocId) -> Result<()> {
        self.cursor.skip_to(target)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.cursor.reset()
    }
}

/// Reader for files produced by
/// [`PositionIndexWriter`](super::PositionIndexWriter)
pub struct PositionIndexReader<R: Read + Seek> {
    reader: BlockIndexReader<R>,
}

impl PositionIndexReader<BufReader<File>> {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            reader: BlockIndexReader::open_path(path)?,
        })
    }
}

impl<R: Read + Seek> PositionIndexReader<R> {
    pub fn open(source: R) -> Result<Self> {
        Ok(Self {
            reader: BlockIndexReader::open(source)?,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        self.reader.manifest()
    }

    pub fn term_count(&self) -> u64 {
        self.reader.key_count()
    }

    pub fn extent_iterator(&mut self, term: &[u8]) -> Result<Option<ExtentPostingIterator>> {
        match self.reader.get(term)? {
            Some(data) => ExtentPostingIterator::new(term, data).map(Some),
            None => Ok(None),
        }
    }

    pub fn count_iterator(&mut self, term: &[u8]) -> Result<Option<CountPostingIterator>> {
        match self.reader.get(term)? {
            Some(data) => CountPostingIterator::new(term, data).map(Some),
            None => Ok(None),
        }
    }

    /// Header of `term`'s posting list, without touching its segments
    pub fn term_header(&mut self, term: &[u8]) -> Result<Option<PostingHeader>> {
        match self.reader.get(term)? {
            Some(data) => {
                let mut pos = 0;
                PostingHeader::decode(data.as_slice(), &mut pos).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Scan over every posting list in key order
    pub fn records(&mut self) -> Result<PostingRecordIterator<'_, R>> {
        Ok(PostingRecordIterator {
            keys: self.reader.iterator()?,
        })
    }
}

/// Full-index scan, one posting list per term
pub struct PostingRecordIterator<'a, R: Read + Seek> {
    keys: KeyIterator<'a, R>,
}

impl<R: Read + Seek> PostingRecordIterator<'_, R> {
    pub fn is_done(&self) -> bool {
        self.keys.is_done()
    }

    pub fn key(&self) -> &[u8] {
        self.keys.key()
    }

    pub fn header(&mut self) -> Result<PostingHeader> {
        let data = self.keys.value()?;
        let mut pos = 0;
        PostingHeader::decode(data.as_slice(), &mut pos)
    }

    pub fn counts(&mut self) -> Result<CountPostingIterator> {
        let data = self.keys.value()?;
        CountPostingIterator::new(self.keys.key(), data)
    }

    pub fn extents(&mut self) -> Result<ExtentPostingIterator> {
        let data = self.keys.value()?;
        ExtentPostingIterator::new(self.keys.key(), data)
    }

    /// Move to the next term's list; `false` once every list was visited
    pub fn next_record(&mut self) -> Result<bool> {
        self.keys.next_key()
    }
}

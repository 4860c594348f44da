//! Random-access reader for block index files

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use byteorder::{BigEndian, ReadBytesExt};

use super::format::{BlockHeader, BlockRef, Footer, read_vocabulary};
use super::manifest::Manifest;
use crate::compression::decompress;
use crate::structures::OwnedBytes;
use crate::{Error, Result};

/// One-slot cache for the block the reader last touched.
///
/// Entering a different block drops the previous header and its decoded
/// values, so a value handed out always belongs to the block it was read
/// from.
#[derive(Default)]
struct BlockCache {
    slot: Option<CachedBlock>,
}

struct CachedBlock {
    header: Arc<BlockHeader>,
    values: Option<OwnedBytes>,
}

impl BlockCache {
    fn header(&self, index: usize) -> Option<Arc<BlockHeader>> {
        self.slot
            .as_ref()
            .filter(|b| b.header.index == index)
            .map(|b| Arc::clone(&b.header))
    }

    fn enter(&mut self, header: Arc<BlockHeader>) {
        self.slot = Some(CachedBlock {
            header,
            values: None,
        });
    }

    fn values(&self, index: usize) -> Option<OwnedBytes> {
        self.slot
            .as_ref()
            .filter(|b| b.header.index == index)
            .and_then(|b| b.values.clone())
    }

    fn store_values(&mut self, index: usize, values: OwnedBytes) {
        if let Some(block) = self.slot.as_mut().filter(|b| b.header.index == index) {
            block.values = Some(values);
        }
    }

    fn invalidate(&mut self) {
        self.slot = None;
    }
}

/// Reader over one open block index file.
///
/// Holds one file handle and one block cache, so it is meant to be used
/// from a single thread; open another reader for parallel access.
pub struct BlockIndexReader<R: Read + Seek> {
    source: R,
    footer: Footer,
    vocabulary: Vec<BlockRef>,
    manifest: Manifest,
    cache: BlockCache,
}

impl BlockIndexReader<BufReader<File>> {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        log::debug!("opening block index {:?}", path);
        Self::open(BufReader::new(file))
    }
}

impl<R: Read + Seek> BlockIndexReader<R> {
    /// Validate the footer and load the vocabulary and manifest
    pub fn open(mut source: R) -> Result<Self> {
        let (footer, file_len) = Footer::read(&mut source)?;

        let vocabulary_len = footer.manifest_offset - footer.vocabulary_offset;
        let mut vocabulary_bytes = vec![0u8; vocabulary_len as usize];
        source.seek(SeekFrom::Start(footer.vocabulary_offset))?;
        source.read_exact(&mut vocabulary_bytes)?;
        let vocabulary = read_vocabulary(&vocabulary_bytes)?;
        if let Some(block) = vocabulary
            .iter()
            .find(|b| b.offset >= footer.vocabulary_offset)
        {
            return Err(Error::Corruption(format!(
                "block offset {} points past the data region",
                block.offset
            )));
        }

        let manifest_len = file_len - super::format::FOOTER_BYTES - footer.manifest_offset;
        let mut manifest_bytes = vec![0u8; manifest_len as usize];
        source.read_exact(&mut manifest_bytes)?;
        let manifest = Manifest::from_bytes(&manifest_bytes)?;

        log::debug!(
            "block index: {} blocks, compressed={}, block_size={}, vocab_group={}",
            vocabulary.len(),
            footer.compressed,
            footer.block_size,
            footer.vocab_group
        );

        Ok(Self {
            source,
            footer,
            vocabulary,
            manifest,
            cache: BlockCache::default(),
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn footer(&self) -> &Footer {
        &self.footer
    }

    pub fn block_count(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn key_count(&self) -> u64 {
        self.vocabulary.iter().map(|b| b.key_count).sum()
    }

    /// Iterator positioned at the first key
    pub fn iterator(&mut self) -> Result<KeyIterator<'_, R>> {
        if self.vocabulary.is_empty() {
            return Ok(KeyIterator::exhausted(self));
        }
        let header = self.load_header(0)?;
        Ok(KeyIterator::at(self, header, 0))
    }

    /// Iterator positioned at `key`, or `None` if the file does not hold it
    pub fn iterator_at(&mut self, key: &[u8]) -> Result<Option<KeyIterator<'_, R>>> {
        let Some(block) = self.find_block(key) else {
            return Ok(None);
        };
        let header = self.load_header(block)?;
        let position = header.keys.iter().position(|k| k.as_slice() == key);
        match position {
            Some(position) => Ok(Some(KeyIterator::at(self, header, position))),
            None => Ok(None),
        }
    }

    /// Value stored under `key`
    pub fn get(&mut self, key: &[u8]) -> Result<Option<OwnedBytes>> {
        match self.iterator_at(key)? {
            Some(mut it) => it.value().map(Some),
            None => Ok(None),
        }
    }

    /// Block whose key range would contain `key`
    fn find_block(&self, key: &[u8]) -> Option<usize> {
        let after = self
            .vocabulary
            .partition_point(|b| b.first_key.as_slice() <= key);
        after.checked_sub(1)
    }

    fn load_header(&mut self, index: usize) -> Result<Arc<BlockHeader>> {
        if let Some(header) = self.cache.header(index) {
            return Ok(header);
        }
        self.cache.invalidate();

        let block = &self.vocabulary[index];
        let header = BlockHeader::read(
            &mut self.source,
            index,
            block.offset,
            self.footer.vocabulary_offset,
            self.footer.vocab_group as usize,
        )?;
        if header.len() as u64 != block.key_count || header.keys[0] != block.first_key {
            return Err(Error::Corruption(format!(
                "block {} disagrees with the vocabulary",
                index
            )));
        }
        log::trace!("loaded block {} header ({} keys)", index, header.len());

        let header = Arc::new(header);
        self.cache.enter(Arc::clone(&header));
        Ok(header)
    }

    /// Decoded value region of a block, decompressing at most once per visit
    fn load_values(&mut self, header: &Arc<BlockHeader>) -> Result<OwnedBytes> {
        if let Some(values) = self.cache.values(header.index) {
            return Ok(values);
        }
        if self.cache.header(header.index).is_none() {
            self.cache.enter(Arc::clone(header));
        }

        let stored_len = header.end_offset - header.values_offset;
        self.source.seek(SeekFrom::Start(header.values_offset))?;
        let values = if self.footer.compressed {
            let expected = self.source.read_i32::<BigEndian>()?;
            if expected < 0 || expected as u64 != header.values_len() {
                return Err(Error::Corruption(format!(
                    "block {} announces {} uncompressed bytes, header says {}",
                    header.index,
                    expected,
                    header.values_len()
                )));
            }
            let mut packed = vec![0u8; stored_len.saturating_sub(4) as usize];
            self.source.read_exact(&mut packed)?;
            let data = decompress(&packed, expected as usize).map_err(|e| {
                Error::Corruption(format!(
                    "truncated compressed block {}: {}",
                    header.index, e
                ))
            })?;
            log::trace!(
                "decompressed block {}: {} -> {} bytes",
                header.index,
                packed.len(),
                data.len()
            );
            data
        } else {
            if stored_len != header.values_len() {
                return Err(Error::Corruption(format!(
                    "block {} holds {} value bytes, header says {}",
                    header.index,
                    stored_len,
                    header.values_len()
                )));
            }
            let mut data = vec![0u8; stored_len as usize];
            self.source.read_exact(&mut data)?;
            data
        };

        let values = OwnedBytes::new(values);
        self.cache.store_values(header.index, values.clone());
        Ok(values)
    }
}

/// Cursor over the keys of a [`BlockIndexReader`], in ascending order.
///
/// Borrows the reader mutably; only one iterator per reader is live at a
/// time.
pub struct KeyIterator<'a, R: Read + Seek> {
    reader: &'a mut BlockIndexReader<R>,
    header: Option<Arc<BlockHeader>>,
    position: usize,
}

impl<'a, R: Read + Seek> KeyIterator<'a, R> {
    fn at(reader: &'a mut BlockIndexReader<R>, header: Arc<BlockHeader>, position: usize) -> Self {
        Self {
            reader,
            header: Some(header),
            position,
        }
    }

    fn exhausted(reader: &'a mut BlockIndexReader<R>) -> Self {
        Self {
            reader,
            header: None,
            position: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.header.is_none()
    }

    /// Current key; empty once the iterator is done
    pub fn key(&self) -> &[u8] {
        match &self.header {
            Some(header) => &header.keys[self.position],
            None => &[],
        }
    }

    pub fn value_length(&self) -> u64 {
        match &self.header {
            Some(header) => {
                let (start, end) = header.value_range(self.position);
                end - start
            }
            None => 0,
        }
    }

    /// Bytes of the current value
    pub fn value(&mut self) -> Result<OwnedBytes> {
        let header = self
            .header
            .clone()
            .ok_or_else(|| Error::Contract("value read from an exhausted iterator".into()))?;
        let values = self.reader.load_values(&header)?;
        let (start, end) = header.value_range(self.position);
        values
            .get(start as usize..end as usize)
            .ok_or_else(|| Error::Corruption(format!("value of block {} out of range", header.index)))
    }

    /// Current value as a readable stream
    pub fn value_reader(&mut self) -> Result<Cursor<OwnedBytes>> {
        self.value().map(Cursor::new)
    }

    /// Advance to the next key, crossing into the next block if needed.
    /// Returns `false` once past the last key.
    pub fn next_key(&mut self) -> Result<bool> {
        let Some(header) = &self.header else {
            return Ok(false);
        };
        if self.position + 1 < header.len() {
            self.position += 1;
            return Ok(true);
        }
        let next = header.index + 1;
        self.enter_block(next)
    }

    /// Move forward to the first key `>= key`. Never moves backwards.
    /// Returns `true` if the iterator now sits exactly on `key`.
    pub fn skip_to(&mut self, key: &[u8]) -> Result<bool> {
        let Some(header) = self.header.clone() else {
            return Ok(false);
        };
        if key <= self.key() {
            return Ok(key == self.key());
        }

        if key > header.last_key() {
            let target = self.reader.find_block(key).unwrap_or(0).max(header.index + 1);
            if !self.enter_block(target)? {
                return Ok(false);
            }
        }

        loop {
            let Some(header) = &self.header else {
                return Ok(false);
            };
            let rest = &header.keys[self.position..];
            let offset = rest.partition_point(|k| k.as_slice() < key);
            if offset < rest.len() {
                self.position += offset;
                return Ok(self.key() == key);
            }
            // every key of this block is smaller; the answer is the next block's first key
            let next = header.index + 1;
            if !self.enter_block(next)? {
                return Ok(false);
            }
        }
    }

    fn enter_block(&mut self, index: usize) -> Result<bool> {
        if index >= self.reader.vocabulary.len() {
            self.header = None;
            self.position = 0;
            return Ok(false);
        }
        self.header = Some(self.reader.load_header(index)?);
        self.position = 0;
        Ok(true)
    }
}

//! Sequential writer for block index files

use std::io::{self, Write};

use byteorder::{BigEndian, WriteBytesExt};

use super::BlockIndexConfig;
use super::format::{
    BlockHeader, BlockRef, Footer, MAX_KEY_LEN, MAX_KEY_REGION, common_prefix_len,
    write_vocabulary,
};
use super::manifest::Manifest;
use crate::compression::{ThresholdWriter, compress};
use crate::{Error, Result};

/// A value headed for a block index file.
///
/// The writer decides block boundaries from [`data_length`](Self::data_length)
/// before asking for any bytes, so elements may produce their data lazily.
pub trait IndexElement {
    fn key(&self) -> &[u8];

    /// Exact number of bytes [`write_data`](Self::write_data) will produce
    fn data_length(&self) -> u64;

    fn write_data(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// Key with an in-memory value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericElement {
    key: Vec<u8>,
    value: Vec<u8>,
}

impl GenericElement {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl IndexElement for GenericElement {
    fn key(&self) -> &[u8] {
        &self.key
    }

    fn data_length(&self) -> u64 {
        self.value.len() as u64
    }

    fn write_data(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(&self.value)
    }
}

/// Writer that accepts elements in strictly increasing key order.
///
/// Elements are held until the block they belong to is complete. A block is
/// closed when the next value would push it past `block_size`, or when its
/// front-coded key table would outgrow 16-bit offsets.
pub struct BlockIndexWriter<W: Write> {
    output: ThresholdWriter<W>,
    config: BlockIndexConfig,
    manifest: Manifest,
    pending: Vec<Box<dyn IndexElement>>,
    pending_value_bytes: u64,
    pending_key_bytes: usize,
    last_key: Option<Vec<u8>>,
    vocabulary: Vec<BlockRef>,
    key_count: u64,
}

impl<W: Write> BlockIndexWriter<W> {
    pub fn new(output: W, mut config: BlockIndexConfig) -> Self {
        config.vocab_group = config.vocab_group.max(1);
        config.block_size = config.block_size.clamp(1, i32::MAX as usize);
        let threshold = config.block_size.max(4096);
        Self {
            output: ThresholdWriter::new(output, threshold),
            config,
            manifest: Manifest::new(),
            pending: Vec::new(),
            pending_value_bytes: 0,
            pending_key_bytes: 0,
            last_key: None,
            vocabulary: Vec::new(),
            key_count: 0,
        }
    }

    /// Metadata written on [`close`](Self::close)
    pub fn manifest_mut(&mut self) -> &mut Manifest {
        &mut self.manifest
    }

    pub fn key_count(&self) -> u64 {
        self.key_count
    }

    pub fn add<E: IndexElement + 'static>(&mut self, element: E) -> Result<()> {
        self.add_boxed(Box::new(element))
    }

    pub fn add_boxed(&mut self, element: Box<dyn IndexElement>) -> Result<()> {
        let key = element.key();
        if key.len() > MAX_KEY_LEN {
            return Err(Error::InvalidKey(format!(
                "key of {} bytes exceeds {} bytes",
                key.len(),
                MAX_KEY_LEN
            )));
        }
        if let Some(previous) = &self.last_key {
            if previous.as_slice() >= key {
                return Err(Error::KeyOrder {
                    previous: previous.clone(),
                    key: key.to_vec(),
                });
            }
        }

        let value_len = element.data_length();
        // worst case: common byte, length byte, whole key
        let key_cost = key.len() + 2;
        if !self.pending.is_empty()
            && (self.pending_value_bytes + value_len > self.config.block_size as u64
                || self.pending_key_bytes + key_cost > MAX_KEY_REGION)
        {
            self.flush_block()?;
        }

        self.last_key = Some(key.to_vec());
        self.pending_value_bytes += value_len;
        self.pending_key_bytes += key_cost;
        self.key_count += 1;
        self.pending.push(element);
        Ok(())
    }

    fn flush_block(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let start = self.output.position();

        let mut value_ends = Vec::with_capacity(self.pending.len());
        let mut end = 0u64;
        for element in &self.pending {
            end += element.data_length();
            value_ends.push(end);
        }

        let compressed = if self.config.compressed {
            let mut raw = Vec::with_capacity(end as usize);
            for element in &self.pending {
                write_element(element.as_ref(), &mut raw)?;
            }
            if raw.len() > i32::MAX as usize {
                return Err(Error::Contract(format!(
                    "block of {} bytes is too large to compress",
                    raw.len()
                )));
            }
            Some(compress(&raw, self.config.compression_level)?)
        } else {
            None
        };
        let region_len = match &compressed {
            Some(data) => 4 + data.len() as u64,
            None => end,
        };

        let keys: Vec<&[u8]> = self.pending.iter().map(|e| e.key()).collect();
        let mut header = BlockHeader::encode(&keys, &value_ends, self.config.vocab_group);
        let end_offset = start + header.len() as u64 + region_len;
        header[..8].copy_from_slice(&(end_offset as i64).to_be_bytes());
        self.output.write_all(&header)?;

        match compressed {
            Some(data) => {
                self.output.write_i32::<BigEndian>(end as i32)?;
                self.output.write_all(&data)?;
            }
            None => {
                for element in &self.pending {
                    write_element(element.as_ref(), &mut self.output)?;
                }
            }
        }
        debug_assert_eq!(self.output.position(), end_offset);

        log::trace!(
            "block {} at {}: {} keys, {} value bytes",
            self.vocabulary.len(),
            start,
            keys.len(),
            end
        );
        self.vocabulary.push(BlockRef {
            offset: start,
            key_count: keys.len() as u64,
            first_key: keys[0].to_vec(),
        });

        self.pending.clear();
        self.pending_value_bytes = 0;
        self.pending_key_bytes = 0;
        Ok(())
    }

    /// Flush the last block and write vocabulary, manifest and footer
    pub fn close(mut self) -> Result<W> {
        self.flush_block()?;

        let vocabulary_offset = self.output.position();
        write_vocabulary(&mut self.output, &self.vocabulary)?;

        let manifest_offset = self.output.position();
        self.manifest.set("keyCount", self.key_count);
        self.manifest.set("blockCount", self.vocabulary.len() as u64);
        self.manifest.set("blockSize", self.config.block_size as u64);
        self.manifest.set("vocabGroup", self.config.vocab_group as u64);
        self.manifest.set("isCompressed", self.config.compressed);
        self.manifest
            .set_default("writerClass", "quarry::BlockIndexWriter");
        self.manifest
            .set_default("readerClass", "quarry::BlockIndexReader");
        self.output.write_all(&self.manifest.to_bytes()?)?;

        Footer {
            vocabulary_offset,
            manifest_offset,
            block_size: self.config.block_size as u32,
            vocab_group: self.config.vocab_group as u32,
            compressed: self.config.compressed,
        }
        .write(&mut self.output)?;

        log::debug!(
            "closed block index: {} keys in {} blocks, {} bytes",
            self.key_count,
            self.vocabulary.len(),
            self.output.position()
        );
        Ok(self.output.into_inner()?)
    }
}

/// Write one element, checking it produced exactly the bytes it announced
fn write_element<W: Write + ?Sized>(element: &dyn IndexElement, out: &mut W) -> Result<()> {
    let mut counting = CountingWriter { inner: out, count: 0 };
    element.write_data(&mut counting)?;
    if counting.count != element.data_length() {
        return Err(Error::Contract(format!(
            "element {:?} announced {} bytes but wrote {}",
            String::from_utf8_lossy(element.key()),
            element.data_length(),
            counting.count
        )));
    }
    Ok(())
}

struct CountingWriter<'a, W: Write + ?Sized> {
    inner: &'a mut W,
    count: u64,
}

impl<W: Write + ?Sized> Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

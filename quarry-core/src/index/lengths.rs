//! Document lengths part
//!
//! Keys are 8-byte big-endian document ids so key order equals document
//! order; values are a single vbyte length.

use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use crate::compression::{decode_vbyte, encode_vbyte};
use crate::structures::{BlockIndexConfig, BlockIndexReader, BlockIndexWriter, GenericElement, Manifest};
use crate::{DocId, Result};

/// Source of document lengths for scoring
pub trait LengthSource {
    /// Length of `document`; 0 when the document is unknown
    fn length(&mut self, document: DocId) -> Result<u32>;
}

pub struct LengthsWriter<W: Write> {
    writer: BlockIndexWriter<W>,
    document_count: u64,
    collection_length: u64,
    max_length: u32,
    min_length: u32,
}

impl<W: Write> LengthsWriter<W> {
    pub fn new(output: W, config: BlockIndexConfig) -> Self {
        let mut writer = BlockIndexWriter::new(output, config);
        writer.manifest_mut().set("writerClass", "quarry::LengthsWriter");
        writer.manifest_mut().set("readerClass", "quarry::LengthsReader");
        Self {
            writer,
            document_count: 0,
            collection_length: 0,
            max_length: 0,
            min_length: u32::MAX,
        }
    }

    /// Documents must arrive in increasing order
    pub fn add(&mut self, document: DocId, length: u32) -> Result<()> {
        let mut value = Vec::with_capacity(5);
        encode_vbyte(length as u64, &mut value);
        self.writer
            .add(GenericElement::new(document.to_be_bytes().to_vec(), value))?;
        self.document_count += 1;
        self.collection_length += length as u64;
        self.max_length = self.max_length.max(length);
        self.min_length = self.min_length.min(length);
        Ok(())
    }

    pub fn document_count(&self) -> u64 {
        self.document_count
    }

    pub fn close(mut self) -> Result<W> {
        let min_length = if self.document_count == 0 { 0 } else { self.min_length };
        let manifest = self.writer.manifest_mut();
        manifest.set("documentCount", self.document_count);
        manifest.set("collectionLength", self.collection_length);
        manifest.set("maxLength", self.max_length);
        manifest.set("minLength", min_length);
        self.writer.close()
    }
}

pub struct LengthsReader<R: Read + Seek> {
    reader: BlockIndexReader<R>,
}

impl LengthsReader<BufReader<File>> {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            reader: BlockIndexReader::open_path(path)?,
        })
    }
}

impl<R: Read + Seek> LengthsReader<R> {
    pub fn open(source: R) -> Result<Self> {
        Ok(Self {
            reader: BlockIndexReader::open(source)?,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        self.reader.manifest()
    }

    pub fn document_count(&self) -> u64 {
        self.manifest().get_u64("documentCount").unwrap_or(0)
    }

    pub fn collection_length(&self) -> u64 {
        self.manifest().get_u64("collectionLength").unwrap_or(0)
    }
}

impl<R: Read + Seek> LengthSource for LengthsReader<R> {
    fn length(&mut self, document: DocId) -> Result<u32> {
        match self.reader.get(&document.to_be_bytes())? {
            Some(value) => {
                let mut pos = 0;
                Ok(decode_vbyte(value.as_slice(), &mut pos)? as u32)
            }
            None => Ok(0),
        }
    }
}

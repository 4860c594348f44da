//! Position index posting lists
//!
//! One posting list is the value stored under a term key. It holds a
//! header followed by independent segments, each a stream of vbytes:
//!
//! ```text
//! Header (vbytes):
//!   options, documentCount, totalPositionCount,
//!   [skipDistance, skipResetDistance, skipCount]      if HAS_SKIPS
//!   [maximumPositionCount]                            if HAS_MAXTF
//!   documentBytes, countBytes, positionBytes,
//!   [skipBytes, skipPositionBytes]                    if HAS_SKIPS
//! Segments:
//!   documents       doc deltas (first one absolute)
//!   counts          term frequency per document
//!   positions       per document: `count` position deltas, restarting at 0
//!   skips           per entry: docDelta, then three offsets relative to
//!                   the current floor (omitted on reset entries)
//!   skipPositions   per reset entry: absolute documents/counts/positions offsets
//! ```
//!
//! A skip entry is written after every `skipDistance` documents. Every
//! `skipResetDistance`-th entry, starting with the first, is a reset entry:
//! its offsets go to `skipPositions` in absolute form and become the floor
//! that the following entries are relative to.

mod extents;
mod reader;
mod writer;

use serde::{Deserialize, Serialize};

use crate::compression::{CompressedByteBuffer, decode_vbyte};
use crate::{DocId, Error, Result};

pub use extents::{Extent, ExtentArray};
pub use reader::{
    CountPostingIterator, ExtentPostingIterator, PositionIndexReader, PostingRecordIterator,
};
pub use writer::{PositionIndexWriter, PostingListBuffer, TermPosting};

/// Sentinel candidate of an exhausted iterator
pub const TERMINATED: DocId = DocId::MAX;

pub const HAS_SKIPS: u32 = 0b001;
pub const HAS_MAXTF: u32 = 0b010;
pub const HAS_POSITIONS: u32 = 0b100;

/// Posting list writer configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PostingWriterConfig {
    /// Documents between skip entries; 0 disables skips
    pub skip_distance: u64,
    /// Skip entries between absolute floors
    pub skip_reset_distance: u64,
    /// Write the positions segment
    pub store_positions: bool,
}

impl Default for PostingWriterConfig {
    fn default() -> Self {
        Self {
            skip_distance: 500,
            skip_reset_distance: 20,
            store_positions: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipParameters {
    pub distance: u64,
    pub reset_distance: u64,
    pub count: u64,
}

/// Decoded posting list header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingHeader {
    pub options: u32,
    pub document_count: u64,
    pub total_position_count: u64,
    pub skips: Option<SkipParameters>,
    pub max_count: Option<u64>,
    pub document_bytes: u64,
    pub count_bytes: u64,
    pub position_bytes: u64,
    pub skip_bytes: u64,
    pub skip_position_bytes: u64,
}

impl PostingHeader {
    pub fn has_positions(&self) -> bool {
        self.options & HAS_POSITIONS != 0
    }

    /// Total size of the segments that follow the header
    pub fn segments_len(&self) -> u64 {
        self.document_bytes
            + self.count_bytes
            + self.position_bytes
            + self.skip_bytes
            + self.skip_position_bytes
    }

    pub fn encode(&self, out: &mut CompressedByteBuffer) {
        out.add(self.options as u64);
        out.add(self.document_count);
        out.add(self.total_position_count);
        if let Some(skips) = &self.skips {
            out.add(skips.distance);
            out.add(skips.reset_distance);
            out.add(skips.count);
        }
        if let Some(max_count) = self.max_count {
            out.add(max_count);
        }
        out.add(self.document_bytes);
        out.add(self.count_bytes);
        out.add(self.position_bytes);
        if self.skips.is_some() {
            out.add(self.skip_bytes);
            out.add(self.skip_position_bytes);
        }
    }

    pub fn decode(data: &[u8], pos: &mut usize) -> Result<Self> {
        let options = decode_vbyte(data, pos)?;
        if options > (HAS_SKIPS | HAS_MAXTF | HAS_POSITIONS) as u64 {
            return Err(Error::Corruption(format!(
                "unknown posting list options 0x{:x}",
                options
            )));
        }
        let options = options as u32;
        let document_count = decode_vbyte(data, pos)?;
        let total_position_count = decode_vbyte(data, pos)?;

        let skips = if options & HAS_SKIPS != 0 {
            let distance = decode_vbyte(data, pos)?;
            let reset_distance = decode_vbyte(data, pos)?;
            let count = decode_vbyte(data, pos)?;
            if distance == 0 || reset_distance == 0 {
                return Err(Error::Corruption("zero skip distance".into()));
            }
            Some(SkipParameters {
                distance,
                reset_distance,
                count,
            })
        } else {
            None
        };
        let max_count = if options & HAS_MAXTF != 0 {
            Some(decode_vbyte(data, pos)?)
        } else {
            None
        };

        let document_bytes = decode_vbyte(data, pos)?;
        let count_bytes = decode_vbyte(data, pos)?;
        let position_bytes = decode_vbyte(data, pos)?;
        let (skip_bytes, skip_position_bytes) = if skips.is_some() {
            (decode_vbyte(data, pos)?, decode_vbyte(data, pos)?)
        } else {
            (0, 0)
        };

        Ok(Self {
            options,
            document_count,
            total_position_count,
            skips,
            max_count,
            document_bytes,
            count_bytes,
            position_bytes,
            skip_bytes,
            skip_position_bytes,
        })
    }
}

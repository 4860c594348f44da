//! On-disk layout of a block index file
//!
//! ```text
//! +---------+---------+-----+------------+----------+--------+
//! | block 0 | block 1 | ... | vocabulary | manifest | footer |
//! +---------+---------+-----+------------+----------+--------+
//! ```
//!
//! ## Block
//!
//! ```text
//! endBlockOffset:i64  keyCount:i64  prefixLen:u8  prefix[prefixLen]
//! groupEnds:u16[ceil(keyCount / vocabGroup)]      (relative to key region)
//! valueEnds:i64[keyCount]                         (relative to value region)
//! key region:
//!   per group:  keyLen:u8 key[prefixLen..]                first key
//!               (common:u8 keyLen:u8 key[common..])*      following keys
//! value region:
//!   uncompressed: concatenated values
//!   compressed:   uncompressedLen:i32 gzip(concatenated values)
//! ```
//!
//! ## Vocabulary
//!
//! ```text
//! blockCount:i64  (blockOffset:i64 keyCount:i64 firstKeyLen:u8 firstKey)*
//! ```
//!
//! ## Footer (fixed size)
//!
//! ```text
//! vocabularyOffset:i64 manifestOffset:i64 blockSize:i32 vocabGroup:i32
//! isCompressed:u8 magic:i64
//! ```
//!
//! Every fixed-width number is big-endian.
//!
//! Value ends are 64 bits wide rather than 16: a single posting list can
//! exceed 64 KiB, and a 16-bit end could not address it. Group ends stay
//! 16 bits, and a writer closes a block before its key region outgrows
//! them.

use std::io::{self, Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::{Error, Result};

/// Identifies a block index file
pub const BLOCK_INDEX_MAGIC: u64 = 0x1A2B_3C4D_5E6F_7A8D;

/// Size of the trailing footer in bytes
pub const FOOTER_BYTES: u64 = 8 + 8 + 4 + 4 + 1 + 8;

/// Target accumulated value length per block (32KB default)
pub const DEFAULT_BLOCK_SIZE: usize = 32 * 1024;

/// Keys per front-coding group
pub const DEFAULT_VOCAB_GROUP: usize = 16;

/// Keys are length-prefixed with a single byte
pub const MAX_KEY_LEN: usize = u8::MAX as usize;

/// Key region offsets are 16 bits wide
pub const MAX_KEY_REGION: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub vocabulary_offset: u64,
    pub manifest_offset: u64,
    pub block_size: u32,
    pub vocab_group: u32,
    pub compressed: bool,
}

impl Footer {
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_i64::<BigEndian>(self.vocabulary_offset as i64)?;
        writer.write_i64::<BigEndian>(self.manifest_offset as i64)?;
        writer.write_i32::<BigEndian>(self.block_size as i32)?;
        writer.write_i32::<BigEndian>(self.vocab_group as i32)?;
        writer.write_u8(self.compressed as u8)?;
        writer.write_u64::<BigEndian>(BLOCK_INDEX_MAGIC)?;
        Ok(())
    }

    /// Read and validate the footer; returns it with the total file length
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<(Self, u64)> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        if file_len < FOOTER_BYTES {
            return Err(Error::Corruption(format!(
                "not a valid index file: {} bytes is shorter than the footer",
                file_len
            )));
        }
        reader.seek(SeekFrom::Start(file_len - FOOTER_BYTES))?;

        let vocabulary_offset = reader.read_i64::<BigEndian>()?;
        let manifest_offset = reader.read_i64::<BigEndian>()?;
        let block_size = reader.read_i32::<BigEndian>()?;
        let vocab_group = reader.read_i32::<BigEndian>()?;
        let compressed = reader.read_u8()?;
        let magic = reader.read_u64::<BigEndian>()?;

        if magic != BLOCK_INDEX_MAGIC {
            return Err(Error::Corruption(format!(
                "not a valid index file: bad magic 0x{:016X}",
                magic
            )));
        }

        let body_end = (file_len - FOOTER_BYTES) as i64;
        if vocabulary_offset < 0
            || manifest_offset < vocabulary_offset
            || manifest_offset > body_end
            || vocab_group <= 0
            || block_size <= 0
            || compressed > 1
        {
            return Err(Error::Corruption(format!(
                "inconsistent footer: vocabulary={} manifest={} group={} block_size={}",
                vocabulary_offset, manifest_offset, vocab_group, block_size
            )));
        }

        Ok((
            Self {
                vocabulary_offset: vocabulary_offset as u64,
                manifest_offset: manifest_offset as u64,
                block_size: block_size as u32,
                vocab_group: vocab_group as u32,
                compressed: compressed == 1,
            },
            file_len,
        ))
    }
}

/// Vocabulary entry: where a block starts and the first key it holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRef {
    pub offset: u64,
    pub key_count: u64,
    pub first_key: Vec<u8>,
}

pub fn write_vocabulary<W: Write + ?Sized>(writer: &mut W, blocks: &[BlockRef]) -> io::Result<()> {
    writer.write_i64::<BigEndian>(blocks.len() as i64)?;
    for block in blocks {
        writer.write_i64::<BigEndian>(block.offset as i64)?;
        writer.write_i64::<BigEndian>(block.key_count as i64)?;
        writer.write_u8(block.first_key.len() as u8)?;
        writer.write_all(&block.first_key)?;
    }
    Ok(())
}

pub fn read_vocabulary(mut data: &[u8]) -> Result<Vec<BlockRef>> {
    let count = read_len(&mut data, "vocabulary block count")?;
    // each entry takes at least 17 bytes
    if count.saturating_mul(17) > data.len() as u64 {
        return Err(Error::Corruption(format!(
            "vocabulary claims {} blocks in {} bytes",
            count,
            data.len()
        )));
    }
    let mut blocks = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let offset = read_len(&mut data, "block offset")?;
        let key_count = read_len(&mut data, "block key count")?;
        let key_len = data.read_u8().map_err(truncated("vocabulary"))? as usize;
        if data.len() < key_len {
            return Err(Error::Corruption("vocabulary truncated".into()));
        }
        let (key, rest) = data.split_at(key_len);
        data = rest;
        if let Some(prev) = blocks.last().map(|b: &BlockRef| &b.first_key) {
            if prev.as_slice() >= key {
                return Err(Error::Corruption("vocabulary keys out of order".into()));
            }
        }
        blocks.push(BlockRef {
            offset,
            key_count,
            first_key: key.to_vec(),
        });
    }
    Ok(blocks)
}

fn read_len(data: &mut &[u8], what: &str) -> Result<u64> {
    let value = data.read_i64::<BigEndian>().map_err(truncated(what))?;
    u64::try_from(value).map_err(|_| Error::Corruption(format!("negative {}: {}", what, value)))
}

fn truncated(what: &str) -> impl FnOnce(io::Error) -> Error + '_ {
    move |_| Error::Corruption(format!("truncated {}", what))
}

/// Length of the prefix shared by `a` and `b`
pub fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// Decoded header of one block: its keys and where each value ends
#[derive(Debug)]
pub struct BlockHeader {
    pub index: usize,
    pub end_offset: u64,
    /// Absolute file offset of the value region
    pub values_offset: u64,
    pub keys: Vec<Vec<u8>>,
    /// Cumulative value ends, relative to the (uncompressed) value region;
    /// stored as `i64`
    pub value_ends: Vec<u64>,
}

impl BlockHeader {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn last_key(&self) -> &[u8] {
        self.keys.last().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn value_range(&self, position: usize) -> (u64, u64) {
        let start = if position == 0 {
            0
        } else {
            self.value_ends[position - 1]
        };
        (start, self.value_ends[position])
    }

    /// Uncompressed size of the value region
    pub fn values_len(&self) -> u64 {
        self.value_ends.last().copied().unwrap_or(0)
    }

    /// Encode a header. `endBlockOffset` is written as zero and patched by the
    /// caller once the value region size is known.
    pub fn encode(keys: &[&[u8]], value_ends: &[u64], vocab_group: usize) -> Vec<u8> {
        let prefix_len = match (keys.first(), keys.last()) {
            (Some(first), Some(last)) => common_prefix_len(first, last),
            _ => 0,
        };
        let prefix = keys.first().map(|k| &k[..prefix_len]).unwrap_or(&[]);

        let mut key_region = Vec::new();
        let mut group_ends = Vec::with_capacity(keys.len().div_ceil(vocab_group));
        for group in keys.chunks(vocab_group) {
            let first = group[0];
            key_region.push(first.len() as u8);
            key_region.extend_from_slice(&first[prefix_len..]);
            for pair in group.windows(2) {
                let common = common_prefix_len(pair[0], pair[1]);
                key_region.push(common as u8);
                key_region.push(pair[1].len() as u8);
                key_region.extend_from_slice(&pair[1][common..]);
            }
            group_ends.push(key_region.len() as u16);
        }

        let mut out = Vec::with_capacity(
            17 + prefix_len + group_ends.len() * 2 + value_ends.len() * 8 + key_region.len(),
        );
        // writes into a Vec cannot fail
        let _ = out.write_i64::<BigEndian>(0);
        let _ = out.write_i64::<BigEndian>(keys.len() as i64);
        out.push(prefix_len as u8);
        out.extend_from_slice(prefix);
        for &end in &group_ends {
            let _ = out.write_u16::<BigEndian>(end);
        }
        for &end in value_ends {
            let _ = out.write_i64::<BigEndian>(end as i64);
        }
        out.extend_from_slice(&key_region);
        out
    }

    /// Decode the header of the block starting at `start`.
    ///
    /// Only the header is read; the value region stays on disk.
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        index: usize,
        start: u64,
        limit: u64,
        vocab_group: usize,
    ) -> Result<Self> {
        reader.seek(SeekFrom::Start(start))?;
        let corrupt = |what: &str| Error::Corruption(format!("block {}: {}", index, what));

        let end_offset = reader.read_i64::<BigEndian>()?;
        let key_count = reader.read_i64::<BigEndian>()?;
        if end_offset < start as i64 || end_offset as u64 > limit {
            return Err(corrupt("end offset outside the data region"));
        }
        let block_len = end_offset as u64 - start;
        if key_count <= 0 || key_count as u64 > block_len {
            return Err(corrupt("implausible key count"));
        }
        let key_count = key_count as usize;

        let prefix_len = reader.read_u8()? as usize;
        let mut prefix = vec![0u8; prefix_len];
        reader.read_exact(&mut prefix)?;

        let group_count = key_count.div_ceil(vocab_group);
        let mut group_ends = Vec::with_capacity(group_count);
        for _ in 0..group_count {
            group_ends.push(reader.read_u16::<BigEndian>()? as usize);
        }

        let mut value_ends = Vec::with_capacity(key_count);
        let mut previous = 0u64;
        for _ in 0..key_count {
            let end = reader.read_i64::<BigEndian>()?;
            if end < previous as i64 {
                return Err(corrupt("value offsets decrease"));
            }
            previous = end as u64;
            value_ends.push(previous);
        }

        let region_len = group_ends.last().copied().unwrap_or(0);
        let mut region = vec![0u8; region_len];
        reader.read_exact(&mut region)?;

        let mut keys: Vec<Vec<u8>> = Vec::with_capacity(key_count);
        let mut group_start = 0usize;
        for (g, &group_end) in group_ends.iter().enumerate() {
            if group_end < group_start || group_end > region.len() {
                return Err(corrupt("key group offsets out of range"));
            }
            let group = &region[group_start..group_end];
            let in_group = vocab_group.min(key_count - g * vocab_group);
            let mut pos = 0usize;

            let len = *group.first().ok_or_else(|| corrupt("empty key group"))? as usize;
            pos += 1;
            if len < prefix_len || pos + len - prefix_len > group.len() {
                return Err(corrupt("first key of group is malformed"));
            }
            let mut key = prefix.clone();
            key.extend_from_slice(&group[pos..pos + len - prefix_len]);
            pos += len - prefix_len;
            keys.push(key);

            for _ in 1..in_group {
                if pos + 2 > group.len() {
                    return Err(corrupt("key group truncated"));
                }
                let common = group[pos] as usize;
                let len = group[pos + 1] as usize;
                pos += 2;
                let previous = keys.last().map(Vec::as_slice).unwrap_or(&[]);
                if common > len || common > previous.len() || pos + len - common > group.len() {
                    return Err(corrupt("front-coded key is malformed"));
                }
                let mut key = previous[..common].to_vec();
                key.extend_from_slice(&group[pos..pos + len - common]);
                pos += len - common;
                keys.push(key);
            }
            if pos != group.len() {
                return Err(corrupt("trailing bytes in key group"));
            }
            group_start = group_end;
        }

        let header_len =
            17 + prefix_len as u64 + group_count as u64 * 2 + key_count as u64 * 8 + region_len as u64;
        let values_offset = start + header_len;
        if values_offset > end_offset as u64 {
            return Err(corrupt("header overruns block"));
        }

        Ok(Self {
            index,
            end_offset: end_offset as u64,
            values_offset,
            keys,
            value_ends,
        })
    }
}

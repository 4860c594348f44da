//! Variable-byte integer codec
//!
//! Integers are split into 7-bit groups, lowest group first. The high bit is
//! set on the **terminal** byte of a value, not on the continuation bytes:
//!
//! ```text
//! 5       -> [0x85]
//! 300     -> [0x2C, 0x82]          (300 = 0b10_0101100)
//! ```
//!
//! Every number stored by the posting list codec goes through this module.

use std::io::{self, Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::{Error, Result};

const TERMINAL: u8 = 0x80;
const PAYLOAD: u8 = 0x7F;

/// Longest encoding of a `u64` (64 bits / 7 bits per byte, rounded up)
pub const MAX_VBYTE_LEN: usize = 10;

/// Number of bytes `value` occupies once encoded
#[inline]
pub fn vbyte_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Append the encoding of `value` to `out`
#[inline]
pub fn encode_vbyte(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value as u8) & PAYLOAD;
        value >>= 7;
        if value == 0 {
            out.push(byte | TERMINAL);
            return;
        }
        out.push(byte);
    }
}

/// Write the encoding of `value` to a stream
pub fn write_vbyte<W: Write + ?Sized>(writer: &mut W, mut value: u64) -> io::Result<()> {
    loop {
        let byte = (value as u8) & PAYLOAD;
        value >>= 7;
        if value == 0 {
            return writer.write_u8(byte | TERMINAL);
        }
        writer.write_u8(byte)?;
    }
}

/// Decode one value from `data` starting at `*pos`, advancing `*pos` past it
#[inline]
pub fn decode_vbyte(data: &[u8], pos: &mut usize) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;
    for i in 0..MAX_VBYTE_LEN {
        let Some(&byte) = data.get(*pos + i) else {
            return Err(Error::Corruption(format!(
                "truncated vbyte at offset {}",
                *pos
            )));
        };
        result |= accumulate(byte, shift)?;
        if byte & TERMINAL != 0 {
            *pos += i + 1;
            return Ok(result);
        }
        shift += 7;
    }
    Err(Error::Corruption(format!(
        "vbyte longer than {} bytes at offset {}",
        MAX_VBYTE_LEN, *pos
    )))
}

/// Decode one value from a stream
pub fn read_vbyte<R: Read + ?Sized>(reader: &mut R) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;
    for _ in 0..MAX_VBYTE_LEN {
        let byte = match reader.read_u8() {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(Error::Corruption("truncated vbyte".into()));
            }
            Err(e) => return Err(e.into()),
        };
        result |= accumulate(byte, shift)?;
        if byte & TERMINAL != 0 {
            return Ok(result);
        }
        shift += 7;
    }
    Err(Error::Corruption(format!(
        "vbyte longer than {} bytes",
        MAX_VBYTE_LEN
    )))
}

#[inline]
fn accumulate(byte: u8, shift: u32) -> Result<u64> {
    let payload = (byte & PAYLOAD) as u64;
    // the tenth group may only carry the top bit of a u64
    if shift == 63 && payload > 1 {
        return Err(Error::Corruption("vbyte overflows u64".into()));
    }
    Ok(payload << shift)
}

//! Growable byte accumulator built on the vbyte codec

use std::io::{self, Write};

use byteorder::{BigEndian, WriteBytesExt};

use super::vbyte::encode_vbyte;

/// Append-only buffer of encoded values.
///
/// Posting list segments are built in one of these before the list is
/// flushed into a block. Growth follows `Vec`'s amortized doubling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressedByteBuffer {
    data: Vec<u8>,
}

impl CompressedByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Append a vbyte-encoded integer
    #[inline]
    pub fn add(&mut self, value: u64) {
        encode_vbyte(value, &mut self.data);
    }

    /// Append one raw byte
    #[inline]
    pub fn add_raw(&mut self, byte: u8) {
        self.data.push(byte);
    }

    /// Append a big-endian `f32`
    pub fn add_float(&mut self, value: f32) {
        // writing into a Vec cannot fail
        let _ = self.data.write_f32::<BigEndian>(value);
    }

    /// Append a big-endian `f64`
    pub fn add_double(&mut self, value: f64) {
        let _ = self.data.write_f64::<BigEndian>(value);
    }

    /// Append the contents of another buffer
    pub fn add_buffer(&mut self, other: &CompressedByteBuffer) {
        self.data.extend_from_slice(&other.data);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.data)
    }
}

impl AsRef<[u8]> for CompressedByteBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Write buffer that hands its contents to `inner` once `threshold` bytes
/// have accumulated.
///
/// Nothing reaches `inner` on drop: callers must call [`flush`](Self::flush)
/// (or [`into_inner`](Self::into_inner)) when they are done.
pub struct ThresholdWriter<W: Write> {
    inner: W,
    buffer: CompressedByteBuffer,
    threshold: usize,
    written: u64,
}

impl<W: Write> ThresholdWriter<W> {
    pub fn new(inner: W, threshold: usize) -> Self {
        Self {
            inner,
            buffer: CompressedByteBuffer::with_capacity(threshold),
            threshold,
            written: 0,
        }
    }

    /// Append a vbyte-encoded integer
    pub fn add(&mut self, value: u64) -> io::Result<()> {
        self.buffer.add(value);
        self.maybe_flush()
    }

    pub fn add_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.buffer.data.extend_from_slice(bytes);
        self.maybe_flush()
    }

    /// Total bytes accepted so far, buffered or not
    pub fn position(&self) -> u64 {
        self.written + self.buffer.len() as u64
    }

    fn maybe_flush(&mut self) -> io::Result<()> {
        if self.buffer.len() >= self.threshold {
            self.drain()?;
        }
        Ok(())
    }

    fn drain(&mut self) -> io::Result<()> {
        self.buffer.write_to(&mut self.inner)?;
        self.written += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.drain()?;
        self.inner.flush()
    }

    pub fn into_inner(mut self) -> io::Result<W> {
        self.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for ThresholdWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.add_raw(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        ThresholdWriter::flush(self)
    }
}

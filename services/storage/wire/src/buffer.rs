//! Primitive codec: big-endian integers and length-prefixed blobs.
//!
//! Every multi-byte integer in the protocol is written in network order.
//! Strings and byte blobs carry a `u32` byte-length prefix and no terminator.

use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Upper bound for any length prefix (64 MiB)
pub const MAX_FIELD_LEN: usize = 64 * 1024 * 1024;

/// Width of a length prefix in bytes
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Sink for encoded fields.
///
/// Implemented by [`BytesMut`] for real encoding and by [`SizeCounter`] for
/// computing the exact encoded size without allocating.
pub trait WireWrite {
    /// Append raw bytes
    fn write_raw(&mut self, data: &[u8]);

    /// Write a single byte
    fn write_u8(&mut self, v: u8) {
        self.write_raw(&[v]);
    }

    /// Write a big-endian u16
    fn write_u16(&mut self, v: u16) {
        self.write_raw(&v.to_be_bytes());
    }

    /// Write a big-endian u32
    fn write_u32(&mut self, v: u32) {
        self.write_raw(&v.to_be_bytes());
    }

    /// Write a big-endian u64
    fn write_u64(&mut self, v: u64) {
        self.write_raw(&v.to_be_bytes());
    }

    /// Write a boolean as one byte (0 or 1)
    fn write_bool(&mut self, v: bool) {
        self.write_u8(v as u8);
    }

    /// Write a u32 length prefix followed by the bytes
    fn write_bytes(&mut self, data: &[u8]) {
        self.write_u32(data.len() as u32);
        self.write_raw(data);
    }

    /// Write a UTF-8 string with a u32 byte-length prefix
    fn write_string(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }
}

impl WireWrite for BytesMut {
    fn write_raw(&mut self, data: &[u8]) {
        self.put_slice(data);
    }

    fn write_u8(&mut self, v: u8) {
        self.put_u8(v);
    }

    fn write_u16(&mut self, v: u16) {
        self.put_u16(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.put_u32(v);
    }

    fn write_u64(&mut self, v: u64) {
        self.put_u64(v);
    }
}

/// Counts the bytes an encode pass would produce
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SizeCounter {
    len: usize,
}

impl SizeCounter {
    /// Create an empty counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes counted so far
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been counted
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl WireWrite for SizeCounter {
    fn write_raw(&mut self, data: &[u8]) {
        self.len += data.len();
    }

    fn write_u8(&mut self, _v: u8) {
        self.len += 1;
    }

    fn write_u16(&mut self, _v: u16) {
        self.len += 2;
    }

    fn write_u32(&mut self, _v: u32) {
        self.len += 4;
    }

    fn write_u64(&mut self, _v: u64) {
        self.len += 8;
    }
}

/// Reject a variable-length field above `max` before it reaches the wire
pub fn check_field_len(field: &'static str, size: usize, max: usize) -> EncodeResult<()> {
    if size > max {
        return Err(EncodeError::FieldTooLarge { field, size, max });
    }
    Ok(())
}

/// Cursor over one message's bytes that tracks the current offset
#[derive(Debug, Clone)]
pub struct WireReader {
    buf: Bytes,
    total: usize,
}

impl WireReader {
    /// Start reading at the beginning of `buf`
    pub fn new(buf: Bytes) -> Self {
        let total = buf.len();
        Self { buf, total }
    }

    /// Offset of the next byte to be read
    pub fn offset(&self) -> usize {
        self.total - self.buf.remaining()
    }

    /// Bytes not yet read
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Bytes consumed so far
    pub fn consumed(&self) -> usize {
        self.offset()
    }

    fn need(&self, needed: usize) -> DecodeResult<()> {
        if self.buf.remaining() < needed {
            return Err(DecodeError::Truncated {
                offset: self.offset(),
                needed,
                available: self.buf.remaining(),
            });
        }
        Ok(())
    }

    /// Look at the next `n` bytes without consuming them
    pub fn peek(&self, n: usize) -> DecodeResult<&[u8]> {
        self.need(n)?;
        Ok(&self.buf[..n])
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    /// Read a big-endian u16
    pub fn read_u16(&mut self) -> DecodeResult<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    /// Read a big-endian u32
    pub fn read_u32(&mut self) -> DecodeResult<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    /// Read a big-endian u64
    pub fn read_u64(&mut self) -> DecodeResult<u64> {
        self.need(8)?;
        Ok(self.buf.get_u64())
    }

    /// Read a boolean; anything but 0 or 1 is malformed
    pub fn read_bool(&mut self) -> DecodeResult<bool> {
        let offset = self.offset();
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecodeError::malformed(
                offset,
                format!("invalid boolean {}", other),
            )),
        }
    }

    /// Read exactly `n` bytes without a prefix
    pub fn read_raw(&mut self, n: usize) -> DecodeResult<Bytes> {
        self.need(n)?;
        Ok(self.buf.split_to(n))
    }

    /// Read a u32-length-prefixed blob
    pub fn read_bytes(&mut self) -> DecodeResult<Bytes> {
        self.read_bytes_bounded(MAX_FIELD_LEN)
    }

    /// Read a u32-length-prefixed blob whose length must not exceed `max`
    pub fn read_bytes_bounded(&mut self, max: usize) -> DecodeResult<Bytes> {
        let offset = self.offset();
        let len = self.read_u32()? as usize;
        if len > max {
            return Err(DecodeError::malformed(
                offset,
                format!("length prefix {} exceeds limit {}", len, max),
            ));
        }
        self.read_raw(len)
    }

    /// Read a u32-length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> DecodeResult<String> {
        self.read_string_bounded(MAX_FIELD_LEN)
    }

    /// Read a u32-length-prefixed UTF-8 string of at most `max` bytes
    pub fn read_string_bounded(&mut self, max: usize) -> DecodeResult<String> {
        let offset = self.offset();
        let raw = self.read_bytes_bounded(max)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| DecodeError::malformed(offset, "string is not valid UTF-8"))
    }

    /// Read a u32 element count and check that every element could still fit
    pub fn read_count(&mut self, min_element_size: usize) -> DecodeResult<usize> {
        let offset = self.offset();
        let count = self.read_u32()? as usize;
        self.check_count(offset, count, min_element_size)
    }

    /// Read a u16 element count and check that every element could still fit
    pub fn read_short_count(&mut self, min_element_size: usize) -> DecodeResult<usize> {
        let offset = self.offset();
        let count = self.read_u16()? as usize;
        self.check_count(offset, count, min_element_size)
    }

    fn check_count(&self, offset: usize, count: usize, min_element_size: usize) -> DecodeResult<usize> {
        let needed = count.saturating_mul(min_element_size.max(1));
        if needed > self.remaining() {
            return Err(DecodeError::malformed(
                offset,
                format!(
                    "element count {} cannot fit in {} remaining bytes",
                    count,
                    self.remaining()
                ),
            ));
        }
        Ok(count)
    }

    /// Require that the whole message has been consumed
    pub fn finish(&self) -> DecodeResult<()> {
        if self.remaining() != 0 {
            return Err(DecodeError::malformed(
                self.offset(),
                format!("{} trailing bytes after message", self.remaining()),
            ));
        }
        Ok(())
    }
}

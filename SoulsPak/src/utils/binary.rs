//! Endian-aware cursor helpers for binder and DCX headers
//!
//! FromSoftware containers switch byte order per file (console builds are
//! big-endian), so reads and writes take the order at runtime instead of as
//! a type parameter.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Read cursor over a byte slice.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Whether multi-byte values are big-endian.
    pub big_endian: bool,
}

impl<'a> ByteReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8], big_endian: bool) -> Self {
        Self {
            data,
            pos: 0,
            big_endian,
        }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow `len` bytes at an absolute offset without moving the cursor.
    pub fn slice_at(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(Error::UnexpectedEof {
                offset,
                wanted: len,
            })
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self.slice_at(self.pos, len)?;
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(if self.big_endian {
            BigEndian::read_u16(bytes)
        } else {
            LittleEndian::read_u16(bytes)
        })
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(if self.big_endian {
            BigEndian::read_u32(bytes)
        } else {
            LittleEndian::read_u32(bytes)
        })
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.read_bytes(8)?;
        Ok(if self.big_endian {
            BigEndian::read_u64(bytes)
        } else {
            LittleEndian::read_u64(bytes)
        })
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    /// Read a fixed-width ASCII field, trimming trailing NULs.
    pub fn read_fixed_str(&mut self, len: usize) -> Result<String> {
        let bytes = self.read_bytes(len)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(len);
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Check a magic tag at the current position.
    pub fn expect_magic(&mut self, magic: &[u8], format: &'static str) -> Result<()> {
        let found = self.read_bytes(magic.len())?;
        if found != magic {
            return Err(Error::InvalidMagic {
                format,
                found: found.to_vec(),
            });
        }
        Ok(())
    }

    /// NUL-terminated byte string at an absolute offset.
    pub fn cstr_at(&self, offset: usize) -> Result<&'a [u8]> {
        let tail = self.data.get(offset..).ok_or(Error::UnexpectedEof {
            offset,
            wanted: 1,
        })?;
        let end = tail.iter().position(|&b| b == 0).ok_or(Error::UnexpectedEof {
            offset,
            wanted: tail.len() + 1,
        })?;
        Ok(&tail[..end])
    }

    /// Double-NUL-terminated UTF-16 string at an absolute offset.
    pub fn utf16_at(&self, offset: usize) -> Result<String> {
        let mut units = Vec::new();
        let mut pos = offset;
        loop {
            let bytes = self.slice_at(pos, 2)?;
            let unit = if self.big_endian {
                BigEndian::read_u16(bytes)
            } else {
                LittleEndian::read_u16(bytes)
            };
            if unit == 0 {
                break;
            }
            units.push(unit);
            pos += 2;
        }
        Ok(String::from_utf16_lossy(&units))
    }
}

/// Growable write buffer with reserve/fill for offsets known only later.
pub struct ByteWriter {
    buf: Vec<u8>,
    /// Whether multi-byte values are big-endian.
    pub big_endian: bool,
}

impl ByteWriter {
    #[must_use]
    pub fn new(big_endian: bool) -> Self {
        Self {
            buf: Vec::new(),
            big_endian,
        }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        let mut bytes = [0u8; 2];
        if self.big_endian {
            BigEndian::write_u16(&mut bytes, value);
        } else {
            LittleEndian::write_u16(&mut bytes, value);
        }
        self.write_bytes(&bytes);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.write_u16(value as u16);
    }

    pub fn write_u32(&mut self, value: u32) {
        let mut bytes = [0u8; 4];
        if self.big_endian {
            BigEndian::write_u32(&mut bytes, value);
        } else {
            LittleEndian::write_u32(&mut bytes, value);
        }
        self.write_bytes(&bytes);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    pub fn write_u64(&mut self, value: u64) {
        let mut bytes = [0u8; 8];
        if self.big_endian {
            BigEndian::write_u64(&mut bytes, value);
        } else {
            LittleEndian::write_u64(&mut bytes, value);
        }
        self.write_bytes(&bytes);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.write_u64(value as u64);
    }

    /// Write `value` padded (or truncated) to `len` bytes with NULs.
    pub fn write_fixed_str(&mut self, value: &str, len: usize) {
        let mut bytes = value.as_bytes().to_vec();
        bytes.resize(len, 0);
        self.write_bytes(&bytes);
    }

    /// Reserve a u32 slot, returning its position for [`Self::fill_u32`].
    pub fn reserve_u32(&mut self) -> usize {
        let pos = self.position();
        self.write_u32(0);
        pos
    }

    /// Reserve a u64 slot, returning its position for [`Self::fill_u64`].
    pub fn reserve_u64(&mut self) -> usize {
        let pos = self.position();
        self.write_u64(0);
        pos
    }

    pub fn fill_u32(&mut self, pos: usize, value: u32) {
        let slot = &mut self.buf[pos..pos + 4];
        if self.big_endian {
            BigEndian::write_u32(slot, value);
        } else {
            LittleEndian::write_u32(slot, value);
        }
    }

    pub fn fill_u64(&mut self, pos: usize, value: u64) {
        let slot = &mut self.buf[pos..pos + 8];
        if self.big_endian {
            BigEndian::write_u64(slot, value);
        } else {
            LittleEndian::write_u64(slot, value);
        }
    }

    /// Zero-pad to a multiple of `align`.
    pub fn pad(&mut self, align: usize) {
        while self.buf.len() % align != 0 {
            self.buf.push(0);
        }
    }
}

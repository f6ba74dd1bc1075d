//! A cursor over a [`ByteSource`] with big-endian read helpers.
//!
//! Grounded on the teacher crate's `PsdCursor`: one read method per primitive the format needs,
//! so that section parsers read as a sequence of named field reads rather than raw slicing.

use crate::byte_source::{ByteSource, SliceSource};
use crate::error::{PsdError, PsdResult};

/// A cursor over a byte slice, with the big-endian primitives every section parser needs.
///
/// This crate reads the whole document into memory up front (the format assumes random access),
/// so `PsdCursor` is built directly on [`SliceSource`] rather than being generic over
/// [`ByteSource`] -- that genericity lives at the `Document::from_source` boundary instead.
pub struct PsdCursor<'a> {
    source: SliceSource<'a>,
}

impl<'a> PsdCursor<'a> {
    /// Create a new cursor over `bytes`, positioned at the start.
    pub fn new(bytes: &'a [u8]) -> Self {
        PsdCursor {
            source: SliceSource::new(bytes),
        }
    }

    /// The current absolute position.
    pub fn position(&self) -> u64 {
        self.source.tell()
    }

    /// Set the absolute position.
    pub fn set_position(&mut self, pos: u64) -> PsdResult<()> {
        self.source.seek(pos)
    }

    /// The total length of the underlying buffer.
    pub fn len(&self) -> u64 {
        self.source.len()
    }

    /// Borrow the entire underlying buffer, independent of position.
    pub fn all_bytes(&self) -> &'a [u8] {
        self.source.all()
    }

    /// Read `n` bytes and return them as a borrowed slice.
    pub fn read(&mut self, n: u32) -> PsdResult<&'a [u8]> {
        let start = self.position() as usize;
        let n = n as usize;
        let remaining = self.source.all().len().saturating_sub(start);
        if remaining < n {
            return Err(PsdError::StreamEof {
                wanted: n,
                available: remaining,
            });
        }
        self.source.seek((start + n) as u64)?;
        Ok(&self.source.all()[start..start + n])
    }

    /// Peek at the next 4 bytes without advancing the cursor. Fails at end of stream.
    pub fn peek_4(&mut self) -> PsdResult<&'a [u8]> {
        let start = self.position() as usize;
        let remaining = self.source.all().len().saturating_sub(start);
        if remaining < 4 {
            return Err(PsdError::StreamEof {
                wanted: 4,
                available: remaining,
            });
        }
        Ok(&self.source.all()[start..start + 4])
    }

    /// Skip `n` bytes by reading and discarding them.
    pub fn skip(&mut self, n: u32) -> PsdResult<()> {
        self.read(n)?;
        Ok(())
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> PsdResult<u8> {
        Ok(self.read(1)?[0])
    }

    /// Read one signed byte.
    pub fn read_i8(&mut self) -> PsdResult<i8> {
        Ok(self.read(1)?[0] as i8)
    }

    /// Read a big-endian `u16`.
    pub fn read_u16(&mut self) -> PsdResult<u16> {
        let bytes = self.read(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Read a big-endian `i16`.
    pub fn read_i16(&mut self) -> PsdResult<i16> {
        Ok(self.read_u16()? as i16)
    }

    /// Read a big-endian `u32`.
    pub fn read_u32(&mut self) -> PsdResult<u32> {
        let bytes = self.read(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a big-endian, signed 32-bit integer.
    pub fn read_i32(&mut self) -> PsdResult<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Read a big-endian `u64`.
    pub fn read_u64(&mut self) -> PsdResult<u64> {
        let bytes = self.read(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(arr))
    }

    /// Read a big-endian `i64`.
    pub fn read_i64(&mut self) -> PsdResult<i64> {
        Ok(self.read_u64()? as i64)
    }

    /// Read a big-endian IEEE-754 double.
    pub fn read_f64(&mut self) -> PsdResult<f64> {
        let bytes = self.read(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(f64::from_be_bytes(arr))
    }

    /// Read a length field whose width depends on the document format: 32 bits for the standard
    /// format, 64 bits for the large-document format. Fails with [`PsdError::OutOfRange`] if the
    /// value can't fit in a `usize` on this host.
    pub fn read_length(&mut self, is_large: bool) -> PsdResult<u64> {
        let value = if is_large { self.read_u64()? } else { self.read_u32()? as u64 };
        if usize::try_from(value).is_err() {
            return Err(PsdError::OutOfRange(format!("length {value} does not fit in a host usize")));
        }
        Ok(value)
    }

    /// Read a Pascal string: one length byte followed by that many bytes, interpreted as
    /// MacRoman and converted to UTF-8. Returns the string and the number of bytes consumed
    /// including the length byte, which callers use to compute padding.
    pub fn read_pascal_string(&mut self) -> PsdResult<(String, usize)> {
        let len = self.read_u8()? as usize;
        let bytes = self.read(len as u32)?;
        let s = crate::text::macroman_to_utf8(bytes);
        Ok((s, len + 1))
    }

    /// Read a Photoshop "Unicode string": a 32-bit character count followed by that many
    /// UTF-16BE code units.
    pub fn read_unicode_string(&mut self) -> PsdResult<String> {
        let char_count = self.read_u32()?;
        let byte_len = (char_count as usize)
            .checked_mul(2)
            .ok_or_else(|| PsdError::OutOfRange("unicode string length overflow".into()))?;
        let bytes = self.read(byte_len as u32)?;
        Ok(crate::text::utf16be_to_utf8(bytes))
    }
}

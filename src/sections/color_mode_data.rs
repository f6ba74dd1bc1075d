//! The color-mode data section: a length-prefixed raw buffer.
//!
//! For indexed-mode documents this conventionally holds a 768-byte RGB palette (three 256-byte
//! planes, red then green then blue), but this crate does not interpret the buffer -- it is
//! retained verbatim, as the specification requires.

use crate::cursor::PsdCursor;
use crate::error::PsdResult;

/// The color-mode data section, retained as an opaque byte buffer.
#[derive(Debug, Clone, Default)]
pub struct ColorModeDataSection {
    pub data: Vec<u8>,
}

impl ColorModeDataSection {
    /// Parse a 4-byte length followed by that many bytes.
    pub fn from_cursor(cursor: &mut PsdCursor) -> PsdResult<Self> {
        let len = cursor.read_u32()?;
        let data = cursor.read(len)?.to_vec();
        Ok(ColorModeDataSection { data })
    }

    /// The 768-byte indexed-color RGB palette (three 256-byte planes, R then G then B), read
    /// out of the front of this buffer when it holds at least that many bytes.
    pub fn indexed_palette(&self) -> Option<&[u8]> {
        if self.data.len() >= 768 {
            Some(&self.data[..768])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_empty_section() {
        let bytes = 0u32.to_be_bytes();
        let mut cursor = PsdCursor::new(&bytes);
        let section = ColorModeDataSection::from_cursor(&mut cursor).unwrap();
        assert!(section.data.is_empty());
    }

    #[test]
    fn parses_a_palette_buffer() {
        let mut bytes = 768u32.to_be_bytes().to_vec();
        bytes.extend(vec![0xAB; 768]);
        let mut cursor = PsdCursor::new(&bytes);
        let section = ColorModeDataSection::from_cursor(&mut cursor).unwrap();
        assert_eq!(section.data.len(), 768);
        assert!(section.indexed_palette().is_some());
    }

    #[test]
    fn palette_is_read_from_buffers_larger_than_768_bytes() {
        let mut bytes = 800u32.to_be_bytes().to_vec();
        bytes.extend(vec![0xCD; 800]);
        let mut cursor = PsdCursor::new(&bytes);
        let section = ColorModeDataSection::from_cursor(&mut cursor).unwrap();
        assert_eq!(section.indexed_palette().unwrap().len(), 768);
    }
}

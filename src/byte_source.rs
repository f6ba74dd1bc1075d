//! Abstract random-access byte source.
//!
//! Every section parser in this crate reads through a [`ByteSource`] rather than directly off of
//! a `&[u8]`. In practice the whole document lives in memory (the format assumes random access;
//! see the crate-level docs), so [`SliceSource`] -- a thin wrapper around a borrowed slice -- is
//! the only implementation this crate ships. Callers who want to plug in their own storage
//! (memory-mapped files, a custom cache) can implement [`ByteSource`] themselves and go through
//! [`Document::from_source`](crate::Document::from_source).

use crate::error::{PsdError, PsdResult};

/// A capability trait over a random-access, seekable source of bytes.
///
/// This is the dynamic-dispatch boundary: implement it for any storage you'd like to parse a PSD
/// out of. [`SliceSource`] is the in-process implementation used everywhere internally.
pub trait ByteSource {
    /// Read exactly `buf.len()` bytes starting at the current position, advancing the position.
    ///
    /// Fails with [`PsdError::StreamEof`] if fewer bytes are available.
    fn read_exact(&mut self, buf: &mut [u8]) -> PsdResult<()>;

    /// Read up to `buf.len()` bytes, returning the number actually read (which may be less than
    /// `buf.len()` only at the end of the source).
    fn read_up_to(&mut self, buf: &mut [u8]) -> PsdResult<usize>;

    /// Move the read position to an absolute byte offset.
    fn seek(&mut self, pos: u64) -> PsdResult<()>;

    /// The current absolute byte offset.
    fn tell(&self) -> u64;

    /// The total length of the source, in bytes.
    fn len(&self) -> u64;

    /// Release any resources held by the source. The default implementation does nothing, which
    /// is correct for in-memory sources.
    fn close(&mut self) {}
}

/// A [`ByteSource`] over a borrowed, in-memory byte slice.
///
/// This is the implementation every section parser in this crate is built against; it is `Copy`
/// and has no allocation of its own.
#[derive(Debug, Clone, Copy)]
pub struct SliceSource<'a> {
    bytes: &'a [u8],
    pos: u64,
}

impl<'a> SliceSource<'a> {
    /// Wrap a byte slice for random-access reading starting at position 0.
    pub fn new(bytes: &'a [u8]) -> Self {
        SliceSource { bytes, pos: 0 }
    }

    /// Borrow the remaining, unread portion of the underlying slice.
    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos as usize..]
    }

    /// Borrow the entire underlying slice, independent of the current position.
    pub fn all(&self) -> &'a [u8] {
        self.bytes
    }
}

impl<'a> ByteSource for SliceSource<'a> {
    fn read_exact(&mut self, buf: &mut [u8]) -> PsdResult<()> {
        let want = buf.len();
        let available = self.bytes.len().saturating_sub(self.pos as usize);
        if available < want {
            return Err(PsdError::StreamEof {
                wanted: want,
                available,
            });
        }
        let start = self.pos as usize;
        buf.copy_from_slice(&self.bytes[start..start + want]);
        self.pos += want as u64;
        Ok(())
    }

    fn read_up_to(&mut self, buf: &mut [u8]) -> PsdResult<usize> {
        let start = self.pos as usize;
        let available = self.bytes.len().saturating_sub(start);
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&self.bytes[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> PsdResult<()> {
        if pos > self.bytes.len() as u64 {
            return Err(PsdError::StreamSeek(pos));
        }
        self.pos = pos;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A [`ByteSource`] built from a caller-supplied trait object, for use at the public boundary
/// when the backing storage isn't a plain in-memory slice.
pub struct DynByteSource {
    inner: Box<dyn ByteSource>,
}

impl DynByteSource {
    /// Wrap a boxed, dynamically dispatched byte source.
    pub fn new(inner: Box<dyn ByteSource>) -> Self {
        DynByteSource { inner }
    }
}

impl ByteSource for DynByteSource {
    fn read_exact(&mut self, buf: &mut [u8]) -> PsdResult<()> {
        self.inner.read_exact(buf)
    }

    fn read_up_to(&mut self, buf: &mut [u8]) -> PsdResult<usize> {
        self.inner.read_up_to(buf)
    }

    fn seek(&mut self, pos: u64) -> PsdResult<()> {
        self.inner.seek(pos)
    }

    fn tell(&self) -> u64 {
        self.inner.tell()
    }

    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn close(&mut self) {
        self.inner.close()
    }
}

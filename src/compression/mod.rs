//! Compression codecs: PackBits RLE and DEFLATE/zlib with PNG-style prediction reversal.

pub mod deflate;
pub mod packbits;

use crate::error::{PsdError, PsdResult};

/// The compression kind tag that precedes every channel's and composite plane's payload.
///
/// Grounded on the teacher crate's `PsdChannelCompression`, extended with working ZIP and
/// ZIP+predict variants (the teacher leaves both `unimplemented!()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Uncompressed, planar bytes.
    Raw,
    /// PackBits (Apple byte-oriented RLE).
    Rle,
    /// Raw DEFLATE or zlib-wrapped DEFLATE, no prediction.
    Zip,
    /// DEFLATE with PNG-style per-scanline prediction.
    ZipWithPrediction,
}

impl Compression {
    /// Validate a 16-bit compression kind tag as read from the byte stream.
    pub fn new(value: u16) -> PsdResult<Self> {
        match value {
            0 => Ok(Compression::Raw),
            1 => Ok(Compression::Rle),
            2 => Ok(Compression::Zip),
            3 => Ok(Compression::ZipWithPrediction),
            other => Err(PsdError::UnsupportedCompression(other)),
        }
    }
}

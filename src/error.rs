//! The closed error taxonomy for this crate.
//!
//! Every fallible operation in this crate returns a [`PsdError`]. There is no panicking and no
//! catch-all variant: each row corresponds to a distinct, user-visible failure mode.

use thiserror::Error;

/// Every error that this crate can produce.
#[derive(Debug, Error)]
pub enum PsdError {
    /// Caller misuse: a null buffer where one was required, or an index out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Data does not conform to structural expectations (but isn't an out-and-out corruption).
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// A read ran past the end of the byte source.
    #[error("unexpected end of stream: wanted {wanted} bytes, {available} available")]
    StreamEof {
        /// Bytes the caller asked for.
        wanted: usize,
        /// Bytes actually remaining in the source.
        available: usize,
    },

    /// The byte source could not satisfy a read for a reason other than running out of bytes.
    #[error("stream read error: {0}")]
    StreamRead(String),

    /// A seek went out of the byte source's bounds.
    #[error("stream seek error: attempted to seek to {0}")]
    StreamSeek(u64),

    /// The byte source reported an unrecoverable internal error.
    #[error("stream is invalid: {0}")]
    StreamInvalid(String),

    /// The first four bytes of the file were not `8BPS`.
    #[error("not a Photoshop document: signature does not match '8BPS'")]
    InvalidFileFormat,

    /// A header field was outside of its legal range.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The version field was neither 1 (standard) nor 2 (large document).
    #[error("unsupported version: {0} (expected 1 or 2)")]
    UnsupportedVersion(u16),

    /// The data is structurally well-formed but internally inconsistent: length sums disagree,
    /// an RLE row overshot its budget, a reference token is unrecognized, a descriptor count
    /// exceeds the sanity cap, and so on.
    #[error("corrupt data: {0}")]
    CorruptData(String),

    /// The data parsed but is semantically unusable: a text descriptor missing its `Txt `
    /// property, engine data with no font name, and similar.
    #[error("invalid structure: {0}")]
    InvalidStructure(String),

    /// A feature was recognized in the byte stream but this crate does not interpret it: an
    /// unknown action-descriptor reference form, an unrecognized top-level layout.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// The channel or image data's compression kind cannot be decoded by this build.
    #[error("unsupported compression kind: {0}")]
    UnsupportedCompression(u16),

    /// Rendering was requested for a color mode the renderer does not know how to convert.
    #[error("unsupported color mode for rendering: {0:?}")]
    UnsupportedColorMode(crate::sections::file_header::ColorMode),

    /// The caller-provided output buffer was smaller than `required_size`.
    #[error("buffer too small: need {required_size} bytes, got {provided_size}")]
    BufferTooSmall {
        /// The number of bytes the operation actually needs.
        required_size: usize,
        /// The number of bytes the caller provided.
        provided_size: usize,
    },

    /// A 64-bit length could not fit the host's `usize`, or a coordinate exceeded the format's
    /// bounds.
    #[error("value out of range: {0}")]
    OutOfRange(String),
}

/// The result type used throughout this crate.
pub type PsdResult<T> = Result<T, PsdError>;

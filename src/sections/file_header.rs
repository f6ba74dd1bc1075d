//! The fixed-layout file header.
//!
//! Grounded on the teacher crate's `file_header_section.rs`, extended to accept the large-format
//! (PSB, version 2) header the teacher's snapshot rejects outright.

use crate::cursor::PsdCursor;
use crate::error::{PsdError, PsdResult};

const SIGNATURE: &[u8; 4] = b"8BPS";

/// Whether a document uses the standard (32-bit length fields, 30 000px max) or large-document
/// (64-bit length fields, 300 000px max) format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Standard,
    Large,
}

impl Format {
    /// The maximum legal width or height for this format.
    pub fn max_dimension(self) -> u32 {
        match self {
            Format::Standard => 30_000,
            Format::Large => 300_000,
        }
    }

    /// Whether length fields in this format are 64 bits wide.
    pub fn is_large(self) -> bool {
        matches!(self, Format::Large)
    }
}

/// The document's color mode, as stored in the header's 16-bit color-mode field.
///
/// Recognized values are named; unrecognized values are retained verbatim rather than rejected,
/// per the specification's "unknown values are not rejected" rule (the teacher crate rejects
/// any value outside its known set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Bitmap,
    Grayscale,
    Indexed,
    Rgb,
    Cmyk,
    Multichannel,
    Duotone,
    Lab,
    Unknown(u16),
}

impl ColorMode {
    /// The number of color channels this mode always carries before any extra (alpha, spot, or
    /// mask) channels: 3 for RGB/Lab, 4 for CMYK, 1 for Grayscale/Duotone/Bitmap/Indexed. Used by
    /// the background-layer predicate (§4.5) and by the renderer to locate the alpha plane.
    ///
    /// Multichannel has no fixed base: every channel is an independent spot channel with no
    /// privileged RGB-like subset, and the renderer treats it as unsupported, so this returns 0
    /// rather than a borrowed RGB count that would mislead both callers.
    pub fn base_channel_count(self) -> usize {
        match self {
            ColorMode::Rgb | ColorMode::Lab => 3,
            ColorMode::Cmyk => 4,
            ColorMode::Grayscale | ColorMode::Duotone | ColorMode::Bitmap | ColorMode::Indexed => 1,
            ColorMode::Multichannel | ColorMode::Unknown(_) => 0,
        }
    }

    fn from_u16(value: u16) -> Self {
        match value {
            0 => ColorMode::Bitmap,
            1 => ColorMode::Grayscale,
            2 => ColorMode::Indexed,
            3 => ColorMode::Rgb,
            4 => ColorMode::Cmyk,
            7 => ColorMode::Multichannel,
            8 => ColorMode::Duotone,
            9 => ColorMode::Lab,
            other => ColorMode::Unknown(other),
        }
    }
}

/// The parsed file header.
#[derive(Debug, Clone)]
pub struct FileHeaderSection {
    pub format: Format,
    pub channel_count: u16,
    pub height: u32,
    pub width: u32,
    pub depth: u16,
    pub color_mode: ColorMode,
}

impl FileHeaderSection {
    /// Parse the fixed-layout header at the start of the document.
    pub fn from_cursor(cursor: &mut PsdCursor) -> PsdResult<Self> {
        let signature = cursor.read(4)?;
        if signature != SIGNATURE {
            return Err(PsdError::InvalidFileFormat);
        }

        let version = cursor.read_u16()?;
        let format = match version {
            1 => Format::Standard,
            2 => Format::Large,
            other => return Err(PsdError::UnsupportedVersion(other)),
        };

        cursor.skip(6)?; // reserved, must be consumed but is not validated.

        let channel_count = cursor.read_u16()?;
        if !(1..=56).contains(&channel_count) {
            return Err(PsdError::InvalidHeader(format!(
                "channel count {channel_count} is outside of [1, 56]"
            )));
        }

        let height = cursor.read_u32()?;
        let width = cursor.read_u32()?;
        let max_dim = format.max_dimension();
        if height == 0 || height > max_dim {
            return Err(PsdError::InvalidHeader(format!(
                "height {height} is outside of [1, {max_dim}]"
            )));
        }
        if width == 0 || width > max_dim {
            return Err(PsdError::InvalidHeader(format!(
                "width {width} is outside of [1, {max_dim}]"
            )));
        }

        let depth = cursor.read_u16()?;
        if !matches!(depth, 1 | 8 | 16 | 32) {
            return Err(PsdError::InvalidHeader(format!(
                "depth {depth} is not one of 1, 8, 16, 32"
            )));
        }

        let color_mode = ColorMode::from_u16(cursor.read_u16()?);

        Ok(FileHeaderSection {
            format,
            channel_count,
            height,
            width,
            depth,
            color_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bytes(version: u16, channels: u16, height: u32, width: u32, depth: u16, mode: u16) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(SIGNATURE);
        bytes.extend(version.to_be_bytes());
        bytes.extend([0u8; 6]);
        bytes.extend(channels.to_be_bytes());
        bytes.extend(height.to_be_bytes());
        bytes.extend(width.to_be_bytes());
        bytes.extend(depth.to_be_bytes());
        bytes.extend(mode.to_be_bytes());
        bytes
    }

    #[test]
    fn parses_a_minimal_standard_rgb_header() {
        let bytes = make_bytes(1, 3, 256, 512, 8, 3);
        let mut cursor = PsdCursor::new(&bytes);
        let header = FileHeaderSection::from_cursor(&mut cursor).unwrap();

        assert_eq!(header.format, Format::Standard);
        assert_eq!(header.channel_count, 3);
        assert_eq!(header.height, 256);
        assert_eq!(header.width, 512);
        assert_eq!(header.depth, 8);
        assert_eq!(header.color_mode, ColorMode::Rgb);
    }

    #[test]
    fn parses_a_large_format_header_with_dimensions_above_standard_max() {
        let bytes = make_bytes(2, 4, 40_000, 50_000, 16, 4);
        let mut cursor = PsdCursor::new(&bytes);
        let header = FileHeaderSection::from_cursor(&mut cursor).unwrap();

        assert_eq!(header.format, Format::Large);
        assert_eq!(header.color_mode, ColorMode::Cmyk);
    }

    #[test]
    fn rejects_bad_signature() {
        let mut bytes = make_bytes(1, 3, 256, 512, 8, 3);
        bytes[0] = b'X';
        let mut cursor = PsdCursor::new(&bytes);
        let err = FileHeaderSection::from_cursor(&mut cursor).unwrap_err();
        assert!(matches!(err, PsdError::InvalidFileFormat));
    }

    #[test]
    fn rejects_unsupported_version() {
        let bytes = make_bytes(3, 3, 256, 512, 8, 3);
        let mut cursor = PsdCursor::new(&bytes);
        let err = FileHeaderSection::from_cursor(&mut cursor).unwrap_err();
        assert!(matches!(err, PsdError::UnsupportedVersion(3)));
    }

    #[test]
    fn unknown_color_mode_is_retained_not_rejected() {
        let bytes = make_bytes(1, 3, 256, 512, 8, 42);
        let mut cursor = PsdCursor::new(&bytes);
        let header = FileHeaderSection::from_cursor(&mut cursor).unwrap();
        assert_eq!(header.color_mode, ColorMode::Unknown(42));
    }

    #[test]
    fn standard_format_rejects_dimensions_above_30000() {
        let bytes = make_bytes(1, 3, 30_001, 512, 8, 3);
        let mut cursor = PsdCursor::new(&bytes);
        let err = FileHeaderSection::from_cursor(&mut cursor).unwrap_err();
        assert!(matches!(err, PsdError::InvalidHeader(_)));
    }

    #[test]
    fn depth_must_be_one_of_the_four_legal_values() {
        let bytes = make_bytes(1, 3, 256, 512, 12, 3);
        let mut cursor = PsdCursor::new(&bytes);
        let err = FileHeaderSection::from_cursor(&mut cursor).unwrap_err();
        assert!(matches!(err, PsdError::InvalidHeader(_)));
    }

    #[test]
    fn channel_count_above_56_is_rejected() {
        let bytes = make_bytes(1, 57, 256, 512, 8, 3);
        let mut cursor = PsdCursor::new(&bytes);
        let err = FileHeaderSection::from_cursor(&mut cursor).unwrap_err();
        assert!(matches!(err, PsdError::InvalidHeader(_)));
    }
}

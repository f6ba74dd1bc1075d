//! A single layer record: bounds, channel descriptors, blend mode, and the extra-data blob.
//!
//! Grounded on the teacher crate's `read_layer_record`, extended with the defensive bounds and
//! length validation the specification requires and the teacher's snapshot does not perform.

use crate::cursor::PsdCursor;
use crate::error::PsdResult;
use crate::layer::channel::ChannelId;
use crate::layer::extra_data::{self, ExtraData, LayerFeatures};
use crate::num_ext::SignedInteger;

/// One channel's id and declared length, as read from the fixed part of a layer record.
/// The length becomes payload-only once the ambiguity in step 7 of the section parser is
/// resolved; until then it may still include the 2-byte compression-kind prefix.
#[derive(Debug, Clone, Copy)]
pub struct ChannelDescriptor {
    pub id: ChannelId,
    pub length: u64,
}

/// The fixed-layout portion of a layer record, before its channel pixel data (read in the
/// section's second pass).
#[derive(Debug, Clone)]
pub struct LayerRecord {
    pub top: i32,
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
    pub channels: Vec<ChannelDescriptor>,
    pub blend_mode_key: [u8; 4],
    pub opacity: u8,
    pub clipping: u8,
    pub flags: u8,
    pub bounds_invalid: bool,
    pub name: String,
    pub features: LayerFeatures,
    pub extra: ExtraData,
}

impl LayerRecord {
    /// The layer's width in pixels (never negative; see `bounds_invalid`).
    ///
    /// Widens to `i64` before subtracting: a `bounds_invalid` layer's coordinates are retained
    /// verbatim rather than reset (§4.5 step 5), and `right - left` in raw `i32` can overflow
    /// when the stored bounds are far outside the sanity range this never rejects.
    pub fn width(&self) -> usize {
        (self.right as i64 - self.left as i64).to_usize_or_zero()
    }

    /// The layer's height in pixels (never negative; see `bounds_invalid`).
    pub fn height(&self) -> usize {
        (self.bottom as i64 - self.top as i64).to_usize_or_zero()
    }
}

const BOUNDS_SANITY_LIMIT: i32 = 1_000_000;
const MAX_EXTRA_LENGTH: u64 = 1_000_000;
const MAX_CHANNEL_COUNT: u16 = 56;

/// Read one layer record's fixed-layout fields, including its in-place extra-data blob.
///
/// `is_large` selects the channel-length field width (8 bytes in large-format documents, 4 in
/// standard documents, per step 4 of the section parser's disambiguation rules).
pub fn read(cursor: &mut PsdCursor, is_large: bool, subsection_end: u64) -> PsdResult<LayerRecord> {
    let top = cursor.read_i32()?;
    let left = cursor.read_i32()?;
    let bottom = cursor.read_i32()?;
    let right = cursor.read_i32()?;

    let bounds_invalid = bottom < top
        || right < left
        || top.abs() > BOUNDS_SANITY_LIMIT
        || left.abs() > BOUNDS_SANITY_LIMIT
        || bottom.abs() > BOUNDS_SANITY_LIMIT
        || right.abs() > BOUNDS_SANITY_LIMIT;

    let raw_channel_count = cursor.read_u16()?;

    // The wire format always carries `raw_channel_count` channel descriptors regardless of
    // whether that count is sane; reading (and then discarding) all of them keeps the cursor
    // aligned for every field that follows, even when the layer itself is treated as empty.
    let mut channels = Vec::with_capacity(raw_channel_count.min(MAX_CHANNEL_COUNT) as usize);
    for _ in 0..raw_channel_count {
        let id = ChannelId::new(cursor.read_i16()?);
        let length = if is_large {
            let candidate = cursor.read_u64()?;
            let remaining = subsection_end.saturating_sub(cursor.position());
            if candidate > remaining {
                cursor.set_position(cursor.position() - 8)?;
                cursor.read_u32()? as u64
            } else {
                candidate
            }
        } else {
            cursor.read_u32()? as u64
        };
        channels.push(ChannelDescriptor { id, length });
    }
    if raw_channel_count > MAX_CHANNEL_COUNT {
        channels.clear();
    }
    cursor.skip(4)?; // blend signature, e.g. "8BIM", not validated.
    let mut blend_mode_key = [0u8; 4];
    blend_mode_key.copy_from_slice(cursor.read(4)?);
    let opacity = cursor.read_u8()?;
    let clipping = cursor.read_u8()?;
    let flags = cursor.read_u8()?;
    cursor.skip(1)?; // filler, always 0.

    let raw_extra_length = cursor.read_u32()? as u64;
    let extra_end = cursor.position() + raw_extra_length;

    let (name, features, extra) = if raw_extra_length > MAX_EXTRA_LENGTH {
        let skip_to = extra_end.min(subsection_end);
        cursor.set_position(skip_to)?;
        (String::new(), LayerFeatures::default(), ExtraData::default())
    } else {
        let extra = extra_data::parse(cursor, extra_end)?;
        (extra.name.clone(), extra.features, extra)
    };

    Ok(LayerRecord {
        top,
        left,
        bottom,
        right,
        channels,
        blend_mode_key,
        opacity,
        clipping,
        flags,
        bounds_invalid,
        name,
        features,
        extra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_layer_record_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(0i32.to_be_bytes()); // top
        bytes.extend(0i32.to_be_bytes()); // left
        bytes.extend(4i32.to_be_bytes()); // bottom
        bytes.extend(4i32.to_be_bytes()); // right
        bytes.extend(0u16.to_be_bytes()); // channel count
        bytes.extend(b"8BIM");
        bytes.extend(b"norm"); // blend mode key
        bytes.push(255); // opacity
        bytes.push(0); // clipping
        bytes.push(0); // flags
        bytes.push(0); // filler

        let mut extra = Vec::new();
        extra.extend(0u32.to_be_bytes()); // mask data length
        extra.extend(0u32.to_be_bytes()); // blending ranges length
        extra.push(0); // pascal name length 0
        extra.extend(vec![0u8; 3]); // pad 1+0=1 to multiple of 4 -> pad 3
        bytes.extend((extra.len() as u32).to_be_bytes());
        bytes.extend(extra);
        bytes
    }

    #[test]
    fn parses_bounds_and_width_height() {
        let bytes = minimal_layer_record_bytes();
        let end = bytes.len() as u64;
        let mut cursor = PsdCursor::new(&bytes);
        let record = read(&mut cursor, false, end).unwrap();

        assert_eq!(record.width(), 4);
        assert_eq!(record.height(), 4);
        assert!(!record.bounds_invalid);
        assert_eq!(&record.blend_mode_key, b"norm");
    }

    #[test]
    fn inverted_bounds_are_flagged_but_not_rejected() {
        let mut bytes = minimal_layer_record_bytes();
        bytes[0..4].copy_from_slice(&10i32.to_be_bytes()); // top = 10, bottom = 4 -> inverted
        let end = bytes.len() as u64;
        let mut cursor = PsdCursor::new(&bytes);
        let record = read(&mut cursor, false, end).unwrap();

        assert!(record.bounds_invalid);
        assert_eq!(record.height(), 0); // negative delta clamps to zero, not underflow
    }

    #[test]
    fn extreme_bounds_are_flagged_and_do_not_overflow_width_or_height() {
        let mut bytes = minimal_layer_record_bytes();
        bytes[0..4].copy_from_slice(&i32::MIN.to_be_bytes()); // top
        bytes[4..8].copy_from_slice(&i32::MIN.to_be_bytes()); // left
        bytes[8..12].copy_from_slice(&i32::MAX.to_be_bytes()); // bottom
        bytes[12..16].copy_from_slice(&i32::MAX.to_be_bytes()); // right
        let end = bytes.len() as u64;
        let mut cursor = PsdCursor::new(&bytes);
        let record = read(&mut cursor, false, end).unwrap();

        assert!(record.bounds_invalid);
        assert_eq!(record.width(), (i32::MAX as i64 - i32::MIN as i64) as usize);
        assert_eq!(record.height(), (i32::MAX as i64 - i32::MIN as i64) as usize);
    }

    #[test]
    fn channel_count_above_limit_is_treated_as_empty_but_still_consumes_its_descriptors() {
        // 60 channel descriptors (above the 56 sanity limit) are still present on the wire and
        // must be read so the cursor stays aligned for the blend signature/key that follows,
        // even though the resulting layer is treated as having zero usable channels.
        let over_limit: u16 = 60;
        let mut bytes = Vec::new();
        bytes.extend(0i32.to_be_bytes());
        bytes.extend(0i32.to_be_bytes());
        bytes.extend(4i32.to_be_bytes());
        bytes.extend(4i32.to_be_bytes());
        bytes.extend(over_limit.to_be_bytes());
        for id in 0..over_limit {
            bytes.extend((id as i16).to_be_bytes());
            bytes.extend(0u32.to_be_bytes()); // channel length
        }
        bytes.extend(b"8BIM");
        bytes.extend(b"norm");
        bytes.push(255);
        bytes.push(0);
        bytes.push(0);
        bytes.push(0);
        let mut extra = Vec::new();
        extra.extend(0u32.to_be_bytes());
        extra.extend(0u32.to_be_bytes());
        extra.push(0);
        extra.extend(vec![0u8; 3]);
        bytes.extend((extra.len() as u32).to_be_bytes());
        bytes.extend(extra);

        let end = bytes.len() as u64;
        let mut cursor = PsdCursor::new(&bytes);
        let record = read(&mut cursor, false, end).unwrap();
        assert!(record.channels.is_empty());
        assert_eq!(&record.blend_mode_key, b"norm");
    }
}
